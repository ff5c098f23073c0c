//! Error types for loading metadata images.

use std::path::PathBuf;

/// Errors produced while reading or decoding a metadata image.
///
/// These never poison the [`MetadataCache`](crate::MetadataCache): a failed
/// load is reported to its caller and the next request tries again.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The image file does not exist.
    #[error("metadata file '{path}' could not be found")]
    NotFound {
        /// The requested path.
        path: PathBuf,
    },

    /// An I/O error occurred while reading the image.
    #[error("metadata I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The image contains no bytes.
    #[error("image is empty")]
    Empty,

    /// The image has an invalid or truncated header.
    #[error("invalid image header: {reason}")]
    InvalidHeader {
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the computed checksum of the payload.
    #[error("image checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The expected checksum from the header.
        expected: String,
        /// The actual checksum computed from the payload.
        actual: String,
    },

    /// The image format version is not supported.
    #[error("unsupported image format version: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The supported format version.
        expected: u32,
        /// The format version found in the image.
        actual: u32,
    },

    /// The payload could not be encoded or decoded.
    #[error("image serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl MetadataError {
    /// Returns `true` when the image could not be located at all, as
    /// opposed to being present but unreadable or malformed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetadataError::NotFound { .. })
    }

    /// Maps a filesystem error for `path`, folding `NotFound` into its own variant.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            MetadataError::NotFound { path }
        } else {
            MetadataError::Io { path, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = MetadataError::NotFound {
            path: PathBuf::from("/refs/lib.rgmd"),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("lib.rgmd"));
    }

    #[test]
    fn from_io_classifies_not_found() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(MetadataError::from_io("a", missing).is_not_found());
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        let err = MetadataError::from_io("a", denied);
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("metadata I/O error"));
    }

    #[test]
    fn checksum_mismatch_display() {
        let err = MetadataError::ChecksumMismatch {
            expected: "aabb".to_string(),
            actual: "ccdd".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("aabb"));
        assert!(msg.contains("ccdd"));
    }

    #[test]
    fn version_mismatch_display() {
        let err = MetadataError::VersionMismatch {
            expected: 2,
            actual: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 2"));
        assert!(msg.contains("got 1"));
    }
}
