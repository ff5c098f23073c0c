//! References: requests to bind against external content.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use refgraph_common::ContentKey;
use refgraph_metadata::ImageKind;

use crate::compilation::Compilation;

/// Where an image reference's bytes come from.
#[derive(Clone)]
pub enum ImageSource {
    /// A file on disk; its content key is taken when the reference is bound.
    File(PathBuf),
    /// Bytes held in memory under a fixed content key.
    Memory {
        /// Cache key for these bytes.
        key: ContentKey,
        /// The encoded image.
        bytes: Arc<[u8]>,
    },
}

/// What a reference points at.
#[derive(Clone)]
pub enum ReferenceTarget {
    /// A metadata image.
    Image(ImageSource),
    /// Another compilation.
    Compilation(Compilation),
}

struct ReferenceInner {
    target: ReferenceTarget,
    kind: ImageKind,
    aliases: Vec<String>,
    embed_interop_types: bool,
}

/// One entry of a compilation's reference list.
///
/// References are handles: cloning shares the reference, and equality is
/// handle identity. [`with_aliases`](Self::with_aliases) and
/// [`with_embed_interop_types`](Self::with_embed_interop_types) return a new,
/// distinct reference over the same target.
#[derive(Clone)]
pub struct Reference(Arc<ReferenceInner>);

impl Reference {
    fn new(target: ReferenceTarget, kind: ImageKind) -> Self {
        Reference(Arc::new(ReferenceInner {
            target,
            kind,
            aliases: Vec::new(),
            embed_interop_types: false,
        }))
    }

    /// An assembly image on disk.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(ReferenceTarget::Image(ImageSource::File(path.into())), ImageKind::Assembly)
    }

    /// A standalone module image on disk.
    pub fn module_from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(ReferenceTarget::Image(ImageSource::File(path.into())), ImageKind::Module)
    }

    /// An encoded image held in memory. Every call mints a fresh content key,
    /// so two calls never share a cache entry; clone the reference to share.
    pub fn from_bytes(display: &str, bytes: impl Into<Arc<[u8]>>, kind: ImageKind) -> Self {
        Self::new(
            ReferenceTarget::Image(ImageSource::Memory {
                key: ContentKey::in_memory(display),
                bytes: bytes.into(),
            }),
            kind,
        )
    }

    /// A reference to another compilation.
    pub fn compilation(compilation: Compilation) -> Self {
        Self::new(ReferenceTarget::Compilation(compilation), ImageKind::Assembly)
    }

    fn derive(&self, aliases: Vec<String>, embed_interop_types: bool) -> Self {
        Reference(Arc::new(ReferenceInner {
            target: self.0.target.clone(),
            kind: self.0.kind,
            aliases,
            embed_interop_types,
        }))
    }

    /// The same target with the given extern aliases.
    pub fn with_aliases<I, S>(&self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.derive(
            aliases.into_iter().map(Into::into).collect(),
            self.0.embed_interop_types,
        )
    }

    /// The same target with interop-type embedding switched on or off.
    pub fn with_embed_interop_types(&self, embed: bool) -> Self {
        self.derive(self.0.aliases.clone(), embed)
    }

    /// What the reference points at.
    pub fn target(&self) -> &ReferenceTarget {
        &self.0.target
    }

    /// Whether the reference supplies an assembly or a module.
    pub fn kind(&self) -> ImageKind {
        self.0.kind
    }

    /// Extern aliases declared on the reference.
    pub fn aliases(&self) -> &[String] {
        &self.0.aliases
    }

    /// Whether interop types are embedded rather than referenced.
    pub fn embed_interop_types(&self) -> bool {
        self.0.embed_interop_types
    }

    /// The referenced compilation, if any.
    pub fn as_compilation(&self) -> Option<&Compilation> {
        match &self.0.target {
            ReferenceTarget::Compilation(compilation) => Some(compilation),
            ReferenceTarget::Image(_) => None,
        }
    }

    /// The file path of a file reference.
    pub fn path(&self) -> Option<&Path> {
        match &self.0.target {
            ReferenceTarget::Image(ImageSource::File(path)) => Some(path),
            _ => None,
        }
    }

    /// A short human-readable description.
    pub fn display(&self) -> String {
        match &self.0.target {
            ReferenceTarget::Image(ImageSource::File(path)) => path.display().to_string(),
            ReferenceTarget::Image(ImageSource::Memory { key, .. }) => key.path().display().to_string(),
            ReferenceTarget::Compilation(compilation) => compilation.assembly_name().to_string(),
        }
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({} {}", self.kind(), self.display())?;
        if !self.aliases().is_empty() {
            write!(f, " aliases={:?}", self.aliases())?;
        }
        if self.embed_interop_types() {
            write!(f, " embed")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_compare_by_handle() {
        let a = Reference::from_file("lib.dll");
        let b = Reference::from_file("lib.dll");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn property_changes_mint_new_references() {
        let base = Reference::from_file("lib.dll");
        let aliased = base.with_aliases(["L"]);
        assert_ne!(base, aliased);
        assert_eq!(aliased.aliases(), ["L".to_string()]);
        assert!(base.aliases().is_empty());

        let embedded = aliased.with_embed_interop_types(true);
        assert!(embedded.embed_interop_types());
        assert_eq!(embedded.aliases(), aliased.aliases());
        assert_eq!(embedded.path(), Some(Path::new("lib.dll")));
    }

    #[test]
    fn memory_references_share_key_when_cloned() {
        let a = Reference::from_bytes("lib", vec![1u8, 2, 3], ImageKind::Assembly);
        let b = a.with_aliases(["x"]);
        let key = |r: &Reference| match r.target() {
            ReferenceTarget::Image(ImageSource::Memory { key, .. }) => key.clone(),
            _ => unreachable!(),
        };
        assert_eq!(key(&a), key(&b));
        let c = Reference::from_bytes("lib", vec![1u8, 2, 3], ImageKind::Assembly);
        assert_ne!(key(&a), key(&c));
    }

    #[test]
    fn module_reference_kind() {
        assert_eq!(Reference::module_from_file("x.netmodule").kind(), ImageKind::Module);
        assert!(Reference::from_file("x.dll").display().ends_with("x.dll"));
    }
}
