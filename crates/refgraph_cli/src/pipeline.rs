//! Shared pipeline helpers: locating the manifest and turning it into
//! compilations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use refgraph_binder::{Compilation, CompilationOptions, Reference, SymbolCache};
use refgraph_config::{ImportLevel, ProjectConfig, ResolvedCompilation, ResolvedReference, MANIFEST_NAME};
use refgraph_metadata::ImageKind;
use refgraph_symbols::{ImportOptions, SourceUnit};
use tracing::debug;

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `refgraph.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(MANIFEST_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {MANIFEST_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Locates the manifest from global CLI args.
///
/// `--config` may name the manifest file or its directory. Otherwise walks
/// up from the current directory. Returns the manifest path and the
/// directory image paths are relative to.
pub fn locate_manifest(global: &GlobalArgs) -> Result<(PathBuf, PathBuf), Box<dyn std::error::Error>> {
    let dir = match &global.config {
        Some(config_path) => {
            let path = PathBuf::from(config_path);
            if path.is_file() {
                let dir = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                return Ok((path, dir));
            }
            path
        }
        None => find_project_root(&std::env::current_dir()?)?,
    };
    Ok((dir.join(MANIFEST_NAME), dir))
}

/// Loads the manifest the global args point at.
pub fn load_manifest(global: &GlobalArgs) -> Result<(ProjectConfig, PathBuf), Box<dyn std::error::Error>> {
    let (path, dir) = locate_manifest(global)?;
    let config = refgraph_config::load_config_file(&path)?;
    Ok((config, dir))
}

/// Maps the manifest's import level onto symbol import options.
pub fn import_options(level: ImportLevel) -> ImportOptions {
    match level {
        ImportLevel::Public => ImportOptions::Public,
        ImportLevel::Internal => ImportOptions::Internal,
        ImportLevel::All => ImportOptions::All,
    }
}

/// Creates compilations in build order, each referencing the ones built
/// before it. Nothing is resolved yet.
pub fn build_compilations(
    compilations: &[ResolvedCompilation],
    cache: &Arc<SymbolCache>,
) -> Result<Vec<(String, Compilation)>, Box<dyn std::error::Error>> {
    let mut built: BTreeMap<String, Compilation> = BTreeMap::new();
    let mut ordered = Vec::with_capacity(compilations.len());
    for resolved in compilations {
        let references = resolved
            .references
            .iter()
            .map(|reference| match reference {
                ResolvedReference::Image {
                    path,
                    kind,
                    aliases,
                    embed_interop_types,
                    ..
                } => {
                    let base = match kind {
                        ImageKind::Assembly => Reference::from_file(path),
                        ImageKind::Module => Reference::module_from_file(path),
                    };
                    let base = if aliases.is_empty() {
                        base
                    } else {
                        base.with_aliases(aliases.iter().cloned())
                    };
                    Ok(if *embed_interop_types {
                        base.with_embed_interop_types(true)
                    } else {
                        base
                    })
                }
                ResolvedReference::Compilation { name } => built
                    .get(name)
                    .map(Compilation::to_reference)
                    .ok_or_else(|| format!("compilation '{name}' referenced before it was built")),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut options = CompilationOptions::new()
            .with_version(resolved.version)
            .with_culture(resolved.culture.clone())
            .with_import(import_options(resolved.import))
            .with_cache(Arc::clone(cache));
        if let Some(token) = resolved.public_key_token {
            options = options.with_public_key_token(token);
        }

        let mut unit = SourceUnit::new(&format!("{}.src", resolved.name));
        unit.types = resolved.types.clone();
        debug!(
            compilation = %resolved.name,
            references = references.len(),
            types = unit.types.len(),
            "created compilation"
        );
        let compilation = Compilation::create(&resolved.assembly_name, [unit], references, options);
        built.insert(resolved.name.clone(), compilation.clone());
        ordered.push((resolved.name.clone(), compilation));
    }
    Ok(ordered)
}
