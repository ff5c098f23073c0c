//! Native assemblies: symbol projections over shared metadata images.
//!
//! A [`NativeAssembly`] is built once per (content key, binding context) by
//! the metadata cache and is otherwise a stateless view over the parsed
//! image. The only state it gains after construction is each module's
//! resolved reference table, assigned exactly once.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use refgraph_common::{AssemblyIdentity, ContentKey, Version};
use refgraph_metadata::{MetadataImage, ModuleDef, TypeDef, WrapperContext};

use crate::assembly::{AssemblyLink, AssemblySymbol};
use crate::source_assembly::SourceAssembly;
use crate::symbol::ImportOptions;

pub(crate) type TypeKey = (String, String, u16);

pub(crate) fn build_type_index<'a>(types: impl Iterator<Item = &'a TypeDef>) -> HashMap<TypeKey, u32> {
    let mut index = HashMap::new();
    for (i, ty) in types.enumerate() {
        index
            .entry((ty.namespace.clone(), ty.name.clone(), ty.arity()))
            .or_insert(i as u32);
    }
    index
}

/// One module of a parsed image together with its bound reference table.
pub(crate) struct ModuleData {
    image: Arc<MetadataImage>,
    ordinal: usize,
    links: OnceLock<Vec<AssemblyLink>>,
    type_index: OnceLock<HashMap<TypeKey, u32>>,
}

impl ModuleData {
    pub(crate) fn new(image: Arc<MetadataImage>, ordinal: usize) -> Self {
        Self {
            image,
            ordinal,
            links: OnceLock::new(),
            type_index: OnceLock::new(),
        }
    }

    pub(crate) fn image(&self) -> &Arc<MetadataImage> {
        &self.image
    }

    pub(crate) fn def(&self) -> &ModuleDef {
        &self.image.modules()[self.ordinal]
    }

    pub(crate) fn links(&self) -> Option<&[AssemblyLink]> {
        self.links.get().map(Vec::as_slice)
    }

    pub(crate) fn bind(&self, links: Vec<AssemblyLink>) -> bool {
        self.links.set(links).is_ok()
    }

    pub(crate) fn find(&self, namespace: &str, name: &str, arity: u16) -> Option<u32> {
        let index = self
            .type_index
            .get_or_init(|| build_type_index(self.def().types.iter()));
        index
            .get(&(namespace.to_string(), name.to_string(), arity))
            .copied()
    }
}

/// An assembly symbol projected from a metadata image.
pub struct NativeAssembly {
    key: ContentKey,
    context: WrapperContext,
    identity: AssemblyIdentity,
    import: ImportOptions,
    image: Arc<MetadataImage>,
    modules: Vec<ModuleData>,
}

impl NativeAssembly {
    /// Wraps `image` for the given binding context.
    ///
    /// Module reference tables stay unbound until
    /// [`bind_references`](Self::bind_references) is called.
    pub fn new(
        key: ContentKey,
        context: WrapperContext,
        image: Arc<MetadataImage>,
        import: ImportOptions,
    ) -> Self {
        let identity = image
            .identity()
            .cloned()
            .unwrap_or_else(|| AssemblyIdentity::new(image.display_name(), Version::ZERO));
        let modules = (0..image.modules().len())
            .map(|ordinal| ModuleData::new(Arc::clone(&image), ordinal))
            .collect();
        Self {
            key,
            context,
            identity,
            import,
            image,
            modules,
        }
    }

    /// The assembly's identity.
    pub fn identity(&self) -> &AssemblyIdentity {
        &self.identity
    }

    /// The content key of the underlying image.
    pub fn key(&self) -> &ContentKey {
        &self.key
    }

    /// The binding context the wrapper was built for.
    pub fn context(&self) -> WrapperContext {
        self.context
    }

    /// Visibility applied to the image's declarations.
    pub fn import(&self) -> ImportOptions {
        self.import
    }

    /// The shared parsed image.
    pub fn image(&self) -> &Arc<MetadataImage> {
        &self.image
    }

    /// Number of modules, manifest included.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Assigns every module's resolved reference table.
    ///
    /// `links[m]` holds one link per entry of module `m`'s reference table.
    /// Tables already assigned are left untouched; returns `true` if this
    /// call assigned any.
    pub fn bind_references(&self, links: Vec<Vec<AssemblyLink>>) -> bool {
        let mut assigned = false;
        for (module, table) in self.modules.iter().zip(links) {
            assigned |= module.bind(table);
        }
        assigned
    }

    /// Whether every module's reference table has been assigned.
    pub fn is_bound(&self) -> bool {
        self.modules.iter().all(|module| module.links().is_some())
    }

    pub(crate) fn module_data(&self, ordinal: usize) -> &ModuleData {
        &self.modules[ordinal]
    }
}

impl fmt::Debug for NativeAssembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeAssembly")
            .field("identity", &self.identity)
            .field("key", &self.key)
            .field("context", &self.context)
            .finish()
    }
}

/// The assembly that owns an image module.
///
/// Modules of an assembly image belong to their [`NativeAssembly`]; modules
/// added to a compilation as standalone references belong to that
/// compilation's [`SourceAssembly`].
#[derive(Clone)]
pub enum ImageOwner {
    /// A module of a native assembly image.
    Assembly(Arc<NativeAssembly>),
    /// A standalone module linked into a compilation's own assembly.
    Source(Arc<SourceAssembly>),
}

impl ImageOwner {
    pub(crate) fn data(&self, ordinal: u32) -> &ModuleData {
        match self {
            ImageOwner::Assembly(native) => native.module_data(ordinal as usize),
            ImageOwner::Source(source) => source.added_module(ordinal as usize - 1),
        }
    }

    /// The owning assembly symbol.
    pub fn assembly(&self) -> AssemblySymbol {
        match self {
            ImageOwner::Assembly(native) => AssemblySymbol::Native(native.clone()),
            ImageOwner::Source(source) => AssemblySymbol::Source(source.clone()),
        }
    }

    pub(crate) fn import(&self) -> ImportOptions {
        match self {
            ImageOwner::Assembly(native) => native.import(),
            ImageOwner::Source(_) => ImportOptions::All,
        }
    }

    fn address(&self) -> usize {
        match self {
            ImageOwner::Assembly(native) => Arc::as_ptr(native) as usize,
            ImageOwner::Source(source) => Arc::as_ptr(source) as usize,
        }
    }
}

impl PartialEq for ImageOwner {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && self.address() == other.address()
    }
}

impl Eq for ImageOwner {}

impl Hash for ImageOwner {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        self.address().hash(state);
    }
}

/// Handle to one image module within its owner.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NativeModule {
    owner: ImageOwner,
    ordinal: u32,
}

impl NativeModule {
    pub(crate) fn new(owner: ImageOwner, ordinal: u32) -> Self {
        Self { owner, ordinal }
    }

    /// The owning assembly.
    pub fn owner(&self) -> &ImageOwner {
        &self.owner
    }

    /// Position within the owner's module list.
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// The module's metadata.
    pub fn definition(&self) -> &ModuleDef {
        self.data().def()
    }

    /// The shared image the module was read from.
    pub fn image(&self) -> &Arc<MetadataImage> {
        self.data().image()
    }

    pub(crate) fn data(&self) -> &ModuleData {
        self.owner.data(self.ordinal)
    }
}
