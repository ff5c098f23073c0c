//! Loading reference content and collapsing duplicates into definitions.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use rayon::prelude::*;
use refgraph_common::{AssemblyIdentity, ContentKey, Version};
use refgraph_diagnostics::{DiagnosticSink, Location};
use refgraph_metadata::{decode_image, read_image, ImageKind, MetadataError, MetadataImage};
use refgraph_symbols::CompilationId;
use tracing::{debug, trace};

use crate::compilation::Compilation;
use crate::errors;
use crate::options::SymbolCache;
use crate::reference::{ImageSource, Reference, ReferenceTarget};

/// Content obtained for one reference.
#[derive(Clone)]
pub(crate) enum Loaded {
    Image {
        key: ContentKey,
        image: Arc<MetadataImage>,
    },
    Compilation(Compilation),
}

impl Loaded {
    fn source_key(&self) -> SourceKey {
        match self {
            Loaded::Image { key, .. } => SourceKey::Image(key.clone()),
            Loaded::Compilation(compilation) => SourceKey::Compilation(compilation.id()),
        }
    }

    fn identity(&self) -> AssemblyIdentity {
        match self {
            Loaded::Image { image, .. } => image
                .identity()
                .cloned()
                .unwrap_or_else(|| AssemblyIdentity::new(image.display_name(), Version::ZERO)),
            Loaded::Compilation(compilation) => compilation.identity(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum SourceKey {
    Image(ContentKey),
    Compilation(CompilationId),
}

/// Where a reference stands after loading and de-duplication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Status {
    /// Bound as definition `n`.
    Definition(usize),
    /// Linked as module `n` of the own assembly (0 is the manifest).
    Module(u32),
    /// Same definition as the reference at this index.
    Duplicate(usize),
    /// Lost its simple name to this identity.
    Conflicting(AssemblyIdentity),
    Failed,
}

/// One distinct assembly supplied by the reference list.
pub(crate) struct Definition {
    pub(crate) reference: usize,
    pub(crate) loaded: Loaded,
    pub(crate) identity: AssemblyIdentity,
}

pub(crate) struct Definitions {
    pub(crate) statuses: Vec<Status>,
    pub(crate) aliases: Vec<Vec<String>>,
    pub(crate) definitions: Vec<Definition>,
    pub(crate) modules: Vec<Arc<MetadataImage>>,
}

enum LoadFailure {
    NotFound,
    Bad(String),
}

impl From<MetadataError> for LoadFailure {
    fn from(err: MetadataError) -> Self {
        if err.is_not_found() {
            LoadFailure::NotFound
        } else {
            LoadFailure::Bad(err.to_string())
        }
    }
}

impl From<io::Error> for LoadFailure {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            LoadFailure::NotFound
        } else {
            LoadFailure::Bad(err.to_string())
        }
    }
}

fn load_image(
    source: &ImageSource,
    kind: ImageKind,
    cache: &SymbolCache,
) -> Result<Loaded, LoadFailure> {
    let (key, image) = match source {
        ImageSource::File(path) => {
            let key = ContentKey::from_path(path)?;
            let image = cache.get_or_load(&key, || read_image(path))?;
            (key, image)
        }
        ImageSource::Memory { key, bytes } => {
            let image = cache.get_or_load(key, || decode_image(bytes))?;
            (key.clone(), image)
        }
    };
    if image.kind() != kind {
        return Err(LoadFailure::Bad(format!(
            "expected {kind} image, found {}",
            image.kind()
        )));
    }
    Ok(Loaded::Image { key, image })
}

/// Where diagnostics about the reference at `index` point.
pub(crate) fn location(index: usize, explicit: usize) -> Location {
    if index < explicit {
        Location::Reference(index)
    } else {
        Location::None
    }
}

/// Loads every reference: images in parallel through the cache, then
/// referenced compilations, each resolved in turn.
pub(crate) fn load_all(
    references: &[Reference],
    explicit: usize,
    cache: &SymbolCache,
    sink: &DiagnosticSink,
) -> Vec<Option<Loaded>> {
    let mut loaded: Vec<Option<Loaded>> = references
        .par_iter()
        .enumerate()
        .map(|(index, reference)| match reference.target() {
            ReferenceTarget::Image(source) => match load_image(source, reference.kind(), cache) {
                Ok(loaded) => Some(loaded),
                Err(failure) => {
                    let at = location(index, explicit);
                    let display = reference.display();
                    sink.emit(match failure {
                        LoadFailure::NotFound => errors::error_file_not_found(&display, at),
                        LoadFailure::Bad(reason) => errors::error_bad_image(&display, &reason, at),
                    });
                    None
                }
            },
            ReferenceTarget::Compilation(_) => None,
        })
        .collect();

    for (slot, reference) in loaded.iter_mut().zip(references) {
        if let Some(compilation) = reference.as_compilation() {
            trace!(assembly = compilation.assembly_name(), "forcing referenced compilation");
            compilation.bound_graph();
            *slot = Some(Loaded::Compilation(compilation.clone()));
        }
    }
    loaded
}

/// Collapses loaded references into distinct definitions.
///
/// Module references become linked modules in order. Assembly references
/// with the same content key, or to the same compilation, are one
/// definition bound at the *last* occurrence; distinct content carrying an
/// identical identity is one definition bound at the *first*. Aliases of
/// duplicates merge onto the bound reference.
pub(crate) fn collect(
    references: &[Reference],
    loaded: Vec<Option<Loaded>>,
    explicit: usize,
    own_module: &str,
    sink: &DiagnosticSink,
) -> Definitions {
    let count = references.len();
    let mut statuses = vec![Status::Failed; count];
    let mut aliases: Vec<Vec<String>> = references.iter().map(|r| r.aliases().to_vec()).collect();
    let mut modules = Vec::new();
    let mut module_names = vec![own_module.to_lowercase()];

    let mut assemblies: Vec<(usize, Loaded)> = Vec::new();
    for (index, slot) in loaded.into_iter().enumerate() {
        let Some(loaded) = slot else { continue };
        if references[index].kind() == ImageKind::Module {
            if let Loaded::Image { image, .. } = &loaded {
                let name = image.display_name().to_string();
                if module_names.contains(&name.to_lowercase()) {
                    sink.emit(errors::error_duplicate_module(&name, location(index, explicit)));
                    continue;
                }
                module_names.push(name.to_lowercase());
                modules.push(Arc::clone(image));
                statuses[index] = Status::Module(modules.len() as u32);
                continue;
            }
        }
        assemblies.push((index, loaded));
    }

    // Same content: the last occurrence is bound.
    let mut by_source: HashMap<SourceKey, usize> = HashMap::new();
    let mut survivors = Vec::new();
    for (index, loaded) in assemblies.into_iter().rev() {
        match by_source.get(&loaded.source_key()) {
            Some(&bound) => {
                merge_duplicate(references, &mut aliases, &mut statuses, index, bound, explicit, sink, &loaded.identity());
            }
            None => {
                by_source.insert(loaded.source_key(), index);
                survivors.push((index, loaded));
            }
        }
    }
    survivors.reverse();

    // Same identity from different content: the first is bound.
    let mut by_identity: HashMap<AssemblyIdentity, usize> = HashMap::new();
    let mut definitions = Vec::new();
    for (index, loaded) in survivors {
        let identity = loaded.identity();
        match by_identity.get(&identity) {
            Some(&bound) => {
                merge_duplicate(references, &mut aliases, &mut statuses, index, bound, explicit, sink, &identity);
            }
            None => {
                by_identity.insert(identity.clone(), index);
                statuses[index] = Status::Definition(definitions.len());
                definitions.push(Definition {
                    reference: index,
                    loaded,
                    identity,
                });
            }
        }
    }

    debug!(
        references = count,
        definitions = definitions.len(),
        modules = modules.len(),
        "collected reference definitions"
    );
    Definitions {
        statuses,
        aliases,
        definitions,
        modules,
    }
}

#[allow(clippy::too_many_arguments)]
fn merge_duplicate(
    references: &[Reference],
    aliases: &mut [Vec<String>],
    statuses: &mut [Status],
    duplicate: usize,
    bound: usize,
    explicit: usize,
    sink: &DiagnosticSink,
    identity: &AssemblyIdentity,
) {
    statuses[duplicate] = Status::Duplicate(bound);
    let extra = std::mem::take(&mut aliases[duplicate]);
    for alias in extra {
        if !aliases[bound].contains(&alias) {
            aliases[bound].push(alias);
        }
    }
    if references[duplicate].embed_interop_types() != references[bound].embed_interop_types() {
        sink.emit(errors::error_embed_interop_mismatch(
            identity,
            &references[bound].display(),
            &references[duplicate].display(),
            location(duplicate.min(bound), explicit),
        ));
    }
}
