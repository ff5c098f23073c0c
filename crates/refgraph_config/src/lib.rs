//! Parsing and validation of `refgraph.toml` project manifests.
//!
//! A manifest names metadata images on disk and compilations that reference
//! them (and each other). Loading produces a [`ProjectConfig`];
//! [`resolve_project`] checks it and yields compilations in build order with
//! versions, key tokens and declared types parsed.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, MANIFEST_NAME};
pub use resolve::{
    build_order, parse_type, resolve_project, ResolvedCompilation, ResolvedProject,
    ResolvedReference,
};
pub use types::*;
