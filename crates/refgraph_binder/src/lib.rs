//! Reference binding for compilations.
//!
//! A [`Compilation`] pairs source units with an ordered list of
//! [`Reference`]s to metadata images and other compilations. The first time
//! a resolved symbol is needed, the reference manager loads every image
//! through the shared metadata cache, chooses one identity per simple
//! assembly name, unifies version mismatches, wraps referenced compilations
//! in retargeting views where their dependencies differ, and stands in a
//! missing assembly for anything left unresolved. The result is a
//! [`BoundGraph`], memoized on the compilation.
//!
//! # Usage
//!
//! ```ignore
//! let core = Reference::from_file("core.rgm");
//! let app = Compilation::create("App", units, [core.clone()], CompilationOptions::new());
//! let core_symbol = app.referenced_unit_symbol(&core);
//! for diagnostic in app.diagnostics() { /* ... */ }
//! ```

#![warn(missing_docs)]

pub mod compilation;
mod definitions;
pub mod errors;
pub mod graph;
mod manager;
pub mod options;
pub mod reference;
mod use_site;

pub use compilation::Compilation;
pub use graph::{BoundGraph, ReferenceBinding, Unification};
pub use options::{shared_cache, CompilationOptions, MissingReferenceResolver, SymbolCache};
pub use reference::{ImageSource, Reference, ReferenceTarget};

#[cfg(test)]
mod tests {
    use super::*;
    use refgraph_common::{AssemblyIdentity, Version};
    use refgraph_metadata::{
        encode_image, ImageKind, MetadataImage, MethodDef, ModuleDef, TypeDef, TypeRef,
    };
    use refgraph_symbols::{AssemblySymbol, SourceUnit, Symbol, SymbolOrigin};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn identity(name: &str, major: u16) -> AssemblyIdentity {
        AssemblyIdentity::new(name, Version::new(major, 0, 0, 0))
    }

    fn assembly(name: &str, major: u16, module: ModuleDef) -> Reference {
        let image = MetadataImage::assembly(identity(name, major), module);
        Reference::from_bytes(&format!("{name}.v{major}"), encode_image(&image).unwrap(), ImageKind::Assembly)
    }

    fn lib(major: u16) -> Reference {
        assembly("lib", major, ModuleDef::new("lib.dll").with_type(TypeDef::new("Lib", "Class1")))
    }

    fn options() -> CompilationOptions {
        CompilationOptions::new().with_version(Version::new(1, 0, 0, 0))
    }

    #[test]
    fn conflicting_versions_keep_the_highest() {
        let (v1, v3) = (lib(1), lib(3));
        let c = Compilation::create("App", [], [v1.clone(), v3.clone()], options());
        let graph = c.bound_graph();
        assert_eq!(graph.chosen_identity("lib"), Some(&identity("lib", 3)));
        assert!(c.referenced_unit_symbol(&v1).is_none());
        assert_eq!(
            graph.bindings()[0],
            ReferenceBinding::Conflicting { winner: identity("lib", 3) }
        );
        assert_eq!(c.diagnostics().len(), 1);
        assert_eq!(c.diagnostics()[0].code, errors::E003);
        assert_eq!(c.referenced_unit_symbol(&v3).unwrap().identity(), &identity("lib", 3));
    }

    #[test]
    fn same_reference_twice_binds_once() {
        let core = assembly("core", 4, ModuleDef::new("core.dll"));
        let aliased = core.with_aliases(["A"]);
        let c = Compilation::create("App", [], [core.clone(), aliased.clone()], options());
        let graph = c.bound_graph();
        assert_eq!(graph.bindings()[0], ReferenceBinding::Duplicate { of: 1 });
        assert!(c.referenced_unit_symbol(&core).is_none());
        assert!(c.referenced_unit_symbol(&aliased).is_some());
        assert_eq!(graph.aliases(1), ["A".to_string()]);
        assert!(c.diagnostics().is_empty());
    }

    #[test]
    fn embed_interop_disagreement_is_reported() {
        let core = assembly("core", 4, ModuleDef::new("core.dll"));
        let embedded = core.with_embed_interop_types(true);
        let c = Compilation::create("App", [], [core, embedded], options());
        assert!(c.diagnostics().iter().any(|d| d.code == errors::E004));
    }

    #[test]
    fn unreadable_bytes_become_a_failed_reference() {
        let bad = Reference::from_bytes("junk", vec![1u8, 2, 3], ImageKind::Assembly);
        let c = Compilation::create("App", [], [bad.clone()], options());
        assert_eq!(c.bound_graph().bindings()[0], ReferenceBinding::Failed);
        assert!(c.referenced_unit_symbol(&bad).is_none());
        assert_eq!(c.diagnostics().len(), 1);
        assert_eq!(c.diagnostics()[0].code, errors::E002);
    }

    #[test]
    fn missing_file_is_reported() {
        let gone = Reference::from_file("/nonexistent/refgraph/gone.rgm");
        let c = Compilation::create("App", [], [gone], options());
        assert_eq!(c.diagnostics()[0].code, errors::E001);
    }

    #[test]
    fn module_references_link_into_the_own_assembly() {
        let module = MetadataImage::Module(
            ModuleDef::new("extra.netmodule").with_type(TypeDef::new("Extra", "E")),
        );
        let reference = Reference::from_bytes("extra", encode_image(&module).unwrap(), ImageKind::Module);
        let c = Compilation::create("App", [], [reference.clone()], options());
        let linked = c.referenced_subunit_symbol(&reference).unwrap();
        assert_eq!(linked.ordinal(), 1);
        assert!(c.referenced_unit_symbol(&reference).is_none());
        assert!(c.find_type("Extra", "E", 0).is_some());
    }

    #[test]
    fn duplicate_module_names_are_reported() {
        let module = MetadataImage::Module(ModuleDef::new("extra.netmodule"));
        let bytes = encode_image(&module).unwrap();
        let first = Reference::from_bytes("a", bytes.clone(), ImageKind::Module);
        let second = Reference::from_bytes("b", bytes, ImageKind::Module);
        let c = Compilation::create("App", [], [first, second], options());
        assert_eq!(c.bound_graph().bindings()[1], ReferenceBinding::Failed);
        assert!(c.diagnostics().iter().any(|d| d.code == errors::E005));
    }

    #[test]
    fn lower_requested_version_unifies_with_a_warning() {
        let user = assembly("user", 1, ModuleDef::new("user.dll").references(identity("lib", 1)));
        let c = Compilation::create("App", [], [user.clone(), lib(2)], options());
        let graph = c.bound_graph();
        assert_eq!(graph.unifications().len(), 1);
        let diagnostics = c.unification_diagnostics();
        assert_eq!(diagnostics[0].code, errors::W001);
        let user = c.referenced_unit_symbol(&user).unwrap();
        assert_eq!(user.referenced_assemblies()[0].identity(), &identity("lib", 2));
        assert!(c.diagnostics().is_empty());
    }

    #[test]
    fn higher_requested_version_is_an_error_on_demand() {
        let user = assembly("user", 1, ModuleDef::new("user.dll").references(identity("lib", 3)));
        let c = Compilation::create("App", [], [user, lib(2)], options());
        let diagnostics = c.unification_diagnostics();
        assert_eq!(diagnostics[0].code, errors::E006);
    }

    #[test]
    fn image_referencing_the_compilation_binds_to_its_source() {
        let plugin = assembly("plugin", 1, ModuleDef::new("plugin.dll").references(identity("App", 1)));
        let c = Compilation::create("App", [], [plugin.clone()], options());
        let plugin = c.referenced_unit_symbol(&plugin).unwrap();
        let target = &plugin.referenced_assemblies()[0];
        assert_eq!(target.origin(), SymbolOrigin::Source);
        assert_eq!(target, &AssemblySymbol::Source(Arc::clone(c.assembly())));
    }

    #[test]
    fn unresolved_identities_become_missing_assemblies() {
        let user = assembly("user", 1, ModuleDef::new("user.dll").references(identity("absent", 1)));
        let c = Compilation::create("App", [], [user.clone()], options());
        assert!(c.bound_graph().is_missing(&identity("absent", 1)));
        let user = c.referenced_unit_symbol(&user).unwrap();
        assert!(user.referenced_assemblies()[0].is_missing());
        assert!(c.diagnostics().is_empty());
    }

    struct Supplier {
        calls: AtomicUsize,
        lib: Reference,
    }

    impl MissingReferenceResolver for Supplier {
        fn resolve_missing(&self, _: &AssemblyIdentity, requested: &AssemblyIdentity) -> Option<Reference> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (requested.name() == "lib").then(|| self.lib.clone())
        }
    }

    #[test]
    fn resolver_answers_are_bound_implicitly() {
        let supplier = Arc::new(Supplier {
            calls: AtomicUsize::new(0),
            lib: lib(1),
        });
        let user = assembly(
            "user",
            1,
            ModuleDef::new("user.dll")
                .references(identity("lib", 1))
                .references(identity("other", 1)),
        );
        let c = Compilation::create(
            "App",
            [],
            [user.clone()],
            options().with_resolver(supplier.clone()),
        );
        let graph = c.bound_graph();
        assert_eq!(c.external_references().len(), 1);
        assert_eq!(graph.implicit_references().len(), 1);
        let bound = c.referenced_unit_symbol(&supplier.lib).unwrap();
        assert_eq!(bound.identity(), &identity("lib", 1));
        assert!(graph.is_missing(&identity("other", 1)));
        assert_eq!(supplier.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn source_declarations_see_referenced_types() {
        let unit = SourceUnit::new("a.src").with_type(
            TypeDef::new("App", "Program")
                .with_method(MethodDef::new("Make").returns(TypeRef::unqualified("Lib", "Class1"))),
        );
        let c = Compilation::create("App", [unit], [lib(1)], options());
        let program = c.find_type("App", "Program", 0).unwrap();
        let returns = program.method("Make").unwrap().return_type().unwrap();
        assert!(!returns.is_error());
        assert_eq!(returns.to_string(), "Lib.Class1");
    }
}
