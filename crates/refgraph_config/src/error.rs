//! Error types for manifest loading and validation.

/// Errors that can occur when loading or validating a `refgraph.toml` manifest.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the manifest.
    #[error("failed to read manifest: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse manifest: {0}")]
    ParseError(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A compilation references a name that is neither an image nor a compilation.
    #[error("compilation '{compilation}' references unknown name '{reference}'")]
    UnknownReference {
        /// The referencing compilation.
        compilation: String,
        /// The unknown name.
        reference: String,
    },

    /// A compilation lists itself as a reference.
    #[error("compilation '{0}' references itself")]
    SelfReference(String),

    /// Compilations reference each other in a cycle.
    #[error("compilation reference cycle: {}", .0.join(" -> "))]
    ReferenceCycle(Vec<String>),

    /// An image and a compilation share a name.
    #[error("name '{0}' is used by both an image and a compilation")]
    DuplicateName(String),

    /// A type string could not be parsed.
    #[error("malformed type '{text}': {reason}")]
    InvalidType {
        /// The offending text.
        text: String,
        /// What went wrong.
        reason: String,
    },

    /// A version string could not be parsed.
    #[error(transparent)]
    InvalidVersion(#[from] refgraph_common::ParseVersionError),

    /// A public key token could not be parsed.
    #[error(transparent)]
    InvalidKeyToken(#[from] refgraph_common::ParseKeyTokenError),

    /// A manifest value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_reference() {
        let err = ConfigError::UnknownReference {
            compilation: "app".to_string(),
            reference: "nope".to_string(),
        };
        assert_eq!(format!("{err}"), "compilation 'app' references unknown name 'nope'");
    }

    #[test]
    fn display_cycle() {
        let err = ConfigError::ReferenceCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(format!("{err}"), "compilation reference cycle: a -> b -> a");
    }

    #[test]
    fn display_invalid_type() {
        let err = ConfigError::InvalidType {
            text: "Ns.<".to_string(),
            reason: "expected a name".to_string(),
        };
        assert_eq!(format!("{err}"), "malformed type 'Ns.<': expected a name");
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::IoError(io_err);
        assert!(format!("{err}").starts_with("failed to read manifest:"));
    }
}
