//! Conformance fixtures for refgraph.
//!
//! Builds small metadata images (a core library, versioned `lib`
//! assemblies, user assemblies that reference them), writes them to a
//! scratch directory or keeps them in memory, and creates compilations over
//! a private metadata cache so tests can observe cache traffic without
//! interference from other tests.

#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use refgraph_binder::{Compilation, CompilationOptions, Reference, SymbolCache};
use refgraph_common::{AssemblyIdentity, Version};
use refgraph_metadata::{
    encode_image, write_image, ImageKind, MetadataImage, MethodDef, ModuleDef, TypeDef, TypeRef,
};
use refgraph_symbols::{ImportOptions, SourceUnit};
use tempfile::TempDir;

/// An identity `name, Version=major.0.0.0`.
pub fn identity(name: &str, major: u16) -> AssemblyIdentity {
    AssemblyIdentity::new(name, Version::new(major, 0, 0, 0))
}

/// The core library: `System.Object` and `System.Int32`.
pub fn core_image() -> MetadataImage {
    MetadataImage::assembly(
        identity("core", 4),
        ModuleDef::new("core.dll")
            .with_type(TypeDef::new("System", "Object"))
            .with_type(TypeDef::new("System", "Int32").with_base(TypeRef::local("System", "Object"))),
    )
}

/// `lib` at version `major`, defining `Lib.Class1` deriving from
/// `System.Object` and, from version 2 on, `Lib.Class2`.
pub fn lib_image(major: u16) -> MetadataImage {
    let mut module = ModuleDef::new("lib.dll")
        .references(identity("core", 4))
        .with_type(TypeDef::new("Lib", "Class1").with_base(TypeRef::external(0, "System", "Object")));
    if major >= 2 {
        module = module.with_type(TypeDef::new("Lib", "Class2"));
    }
    MetadataImage::assembly(identity("lib", major), module)
}

/// An assembly `name` whose manifest module references `targets` in order
/// and defines nothing.
pub fn referencing_image(name: &str, major: u16, targets: &[AssemblyIdentity]) -> MetadataImage {
    let module = targets
        .iter()
        .fold(ModuleDef::new(&format!("{name}.dll")), |module, target| {
            module.references(target.clone())
        });
    MetadataImage::assembly(identity(name, major), module)
}

/// An in-memory reference to `image`. Every call mints a new content key.
pub fn memory(image: &MetadataImage) -> Reference {
    let bytes = encode_image(image).unwrap_or_default();
    Reference::from_bytes(image.display_name(), bytes, image.kind())
}

/// A source unit declaring `L.Api` with two methods: `GetClass` returning
/// `Lib.Class1` and `GetObject` returning `System.Object`.
pub fn api_unit(namespace: &str) -> SourceUnit {
    SourceUnit::new(&format!("{namespace}.src")).with_type(
        TypeDef::new(namespace, "Api")
            .with_method(MethodDef::new("GetClass").returns(TypeRef::unqualified("Lib", "Class1")))
            .with_method(MethodDef::new("GetObject").returns(TypeRef::unqualified("System", "Object"))),
    )
}

/// A scratch directory of image files plus a private cache.
pub struct Fixture {
    dir: TempDir,
    cache: Arc<SymbolCache>,
}

impl Fixture {
    /// Creates an empty fixture.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            cache: Arc::new(SymbolCache::new()),
        })
    }

    /// The scratch directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// The fixture's cache.
    pub fn cache(&self) -> &Arc<SymbolCache> {
        &self.cache
    }

    /// Options bound to the fixture's cache with version 1.0.0.0.
    pub fn options(&self) -> CompilationOptions {
        CompilationOptions::new()
            .with_version(Version::new(1, 0, 0, 0))
            .with_cache(Arc::clone(&self.cache))
    }

    /// Options with a specific import visibility.
    pub fn options_with_import(&self, import: ImportOptions) -> CompilationOptions {
        self.options().with_import(import)
    }

    /// Writes `image` to `file` under the scratch directory.
    pub fn write(&self, file: &str, image: &MetadataImage) -> PathBuf {
        let path = self.dir.path().join(file);
        if let Err(e) = write_image(&path, image) {
            panic!("failed to write fixture {}: {e}", path.display());
        }
        path
    }

    /// Writes `image` and returns a file reference of the matching kind.
    pub fn file(&self, file: &str, image: &MetadataImage) -> Reference {
        let path = self.write(file, image);
        match image.kind() {
            ImageKind::Assembly => Reference::from_file(path),
            ImageKind::Module => Reference::module_from_file(path),
        }
    }

    /// Writes raw bytes under the scratch directory and references them as
    /// an assembly.
    pub fn raw(&self, file: &str, bytes: &[u8]) -> Reference {
        let path = self.dir.path().join(file);
        if let Err(e) = std::fs::write(&path, bytes) {
            panic!("failed to write fixture {}: {e}", path.display());
        }
        Reference::from_file(path)
    }

    /// A compilation with no source over the fixture's cache.
    pub fn compile<R>(&self, name: &str, references: R) -> Compilation
    where
        R: IntoIterator<Item = Reference>,
    {
        Compilation::create(name, [], references, self.options())
    }

    /// A compilation declaring [`api_unit`] in namespace `name`.
    pub fn compile_api<R>(&self, name: &str, references: R) -> Compilation
    where
        R: IntoIterator<Item = Reference>,
    {
        Compilation::create(name, [api_unit(name)], references, self.options())
    }
}
