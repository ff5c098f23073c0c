//! Manifest loading and validation.

use crate::error::ConfigError;
use crate::resolve::build_order;
use crate::types::ProjectConfig;
use std::path::Path;

/// File name of the manifest inside a project directory.
pub const MANIFEST_NAME: &str = "refgraph.toml";

/// Loads and validates `<project_dir>/refgraph.toml`.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    load_config_file(&project_dir.join(MANIFEST_NAME))
}

/// Loads and validates a manifest at an explicit path.
pub fn load_config_file(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a manifest from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks names and references, then that compilations form no cycle.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    for (name, image) in &config.images {
        if name.is_empty() {
            return Err(ConfigError::ValidationError("image with an empty name".to_string()));
        }
        if image.path.is_empty() {
            return Err(ConfigError::MissingField(format!("images.{name}.path")));
        }
        if config.compilations.contains_key(name) {
            return Err(ConfigError::DuplicateName(name.clone()));
        }
    }
    for (name, compilation) in &config.compilations {
        if name.is_empty() {
            return Err(ConfigError::ValidationError(
                "compilation with an empty name".to_string(),
            ));
        }
        if compilation.assembly_name.as_deref() == Some("") {
            return Err(ConfigError::MissingField(format!(
                "compilations.{name}.assembly_name"
            )));
        }
        for reference in &compilation.references {
            if reference == name {
                return Err(ConfigError::SelfReference(name.clone()));
            }
            if !config.images.contains_key(reference) && !config.compilations.contains_key(reference) {
                return Err(ConfigError::UnknownReference {
                    compilation: name.clone(),
                    reference: reference.clone(),
                });
            }
        }
    }
    build_order(config)?;
    Ok(())
}
