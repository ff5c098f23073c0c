//! The symbol family: assemblies, modules, types and members as a compiler
//! sees them after reference binding.
//!
//! Every role is a closed enum over four variants. *Native* symbols are thin
//! projections over a shared [`MetadataImage`](refgraph_metadata::MetadataImage);
//! *source* symbols belong to the compilation being built; *retargeting*
//! symbols present another compilation's source symbols through this
//! compilation's choice of dependency versions; *missing* symbols stand in
//! for anything that could not be resolved and never fail a lookup.
//!
//! Assemblies refer to each other through [`AssemblyLink`]s, assigned once
//! after every assembly of a binding pass has been allocated, so mutually
//! referencing assemblies bind without recursion.

#![warn(missing_docs)]

pub mod arena;
pub mod assembly;
pub mod ids;
pub mod members;
pub mod module;
pub mod native;
pub mod retargeting;
pub mod source;
pub mod source_assembly;
pub mod symbol;
pub mod types;

pub use assembly::{AssemblyLink, AssemblySymbol, MissingAssembly, WeakAssemblySymbol};
pub use ids::{CompilationId, RetargetedId};
pub use members::{FieldSymbol, MethodSymbol, ParameterSymbol, TypeParameterSymbol};
pub use module::ModuleSymbol;
pub use native::{ImageOwner, NativeAssembly, NativeModule};
pub use retargeting::{RetargetKey, Retargetable, Retargeted, RetargetingAssembly};
pub use source::SourceUnit;
pub use source_assembly::SourceAssembly;
pub use symbol::{ImportOptions, Symbol, SymbolKind, SymbolOrigin};
pub use types::{MissingType, NamedTypeSymbol, NativeType, SourceType, TypeSymbol};

#[cfg(test)]
mod tests {
    use super::*;
    use refgraph_common::{AssemblyIdentity, ContentHash, ContentKey, Version};
    use refgraph_metadata::{
        Accessibility, FieldDef, MetadataImage, MethodDef, ModuleDef, TypeDef, TypeRef,
        WrapperContext,
    };
    use std::sync::Arc;

    fn identity(name: &str, major: u16) -> AssemblyIdentity {
        AssemblyIdentity::new(name, Version::new(major, 0, 0, 0))
    }

    fn native(image: MetadataImage, import: ImportOptions) -> AssemblySymbol {
        let key = ContentKey::in_memory(image.display_name());
        let context = WrapperContext::new(ContentHash::from_bytes(key.to_string().as_bytes()));
        AssemblySymbol::Native(Arc::new(NativeAssembly::new(
            key,
            context,
            Arc::new(image),
            import,
        )))
    }

    fn bind(assembly: &AssemblySymbol, targets: &[&AssemblySymbol]) {
        let links: Vec<AssemblyLink> = targets.iter().map(|t| AssemblyLink::to(t)).collect();
        match assembly {
            AssemblySymbol::Native(native) => {
                native.bind_references(vec![links]);
            }
            AssemblySymbol::Source(source) => {
                source.bind_references(links, Vec::new());
            }
            _ => panic!("cannot bind {assembly:?}"),
        }
    }

    fn lib(major: u16, extra: Option<&str>) -> AssemblySymbol {
        let mut manifest = ModuleDef::new("Lib.dll").with_type(
            TypeDef::new("Lib", "Class1").with_method(MethodDef::new("Run")),
        );
        if let Some(name) = extra {
            manifest = manifest.with_type(TypeDef::new("Lib", name));
        }
        let assembly = native(
            MetadataImage::assembly(identity("Lib", major), manifest),
            ImportOptions::Public,
        );
        bind(&assembly, &[]);
        assembly
    }

    /// A compilation-owned assembly `L2` whose members mention `Lib` types.
    fn consumer(lib: &AssemblySymbol) -> Arc<SourceAssembly> {
        let unit = SourceUnit::new("l2.src").with_type(
            TypeDef::new("L2", "C2")
                .type_param("T")
                .with_method(MethodDef::new("Get").returns(TypeRef::unqualified("Lib", "Class1")))
                .with_method(MethodDef::new("Old").returns(TypeRef::unqualified("Lib", "OnlyV1")))
                .with_method(MethodDef::new("Me").returns(TypeRef::unqualified("L2", "C2").with_args(vec![TypeRef::type_param(0)])))
                .with_method(
                    MethodDef::new("Take")
                        .type_param("U")
                        .param("value", TypeRef::method_param(0))
                        .param("items", TypeRef::unqualified("Lib", "Class1").array()),
                )
                .with_field(FieldDef::new("cache", TypeRef::unqualified("Lib", "Class1"))),
        );
        let source = Arc::new(SourceAssembly::new(
            CompilationId::next(),
            identity("L2", 1),
            vec![Arc::new(unit)],
            Vec::new(),
        ));
        source.bind_references(vec![AssemblyLink::to(lib)], Vec::new());
        source
    }

    #[test]
    fn native_assembly_surface() {
        let lib = lib(1, Some("OnlyV1"));
        assert_eq!(lib.origin(), SymbolOrigin::Native);
        assert_eq!(lib.modules().len(), 1);
        assert_eq!(lib.types().len(), 2);
        let ty = lib.find_type("Lib", "Class1", 0).unwrap();
        assert_eq!(ty.full_name(), "Lib.Class1");
        assert_eq!(ty.containing_assembly(), lib);
        assert_eq!(ty.methods().len(), 1);
        assert!(lib.find_type("Lib", "Class1", 1).is_none());
    }

    #[test]
    fn import_options_filter_types_and_members() {
        let image = || {
            MetadataImage::assembly(
                identity("Hidden", 1),
                ModuleDef::new("Hidden.dll")
                    .with_type(TypeDef::new("H", "Inner").with_accessibility(Accessibility::Internal))
                    .with_type(
                        TypeDef::new("H", "Outer").with_method(
                            MethodDef::new("Secret").with_accessibility(Accessibility::Private),
                        ),
                    ),
            )
        };
        let public = native(image(), ImportOptions::Public);
        let all = native(image(), ImportOptions::All);
        assert!(public.find_type("H", "Inner", 0).is_none());
        assert!(all.find_type("H", "Inner", 0).is_some());
        assert!(public.find_type("H", "Outer", 0).unwrap().method("Secret").is_none());
        assert!(all.find_type("H", "Outer", 0).unwrap().method("Secret").is_some());
    }

    #[test]
    fn source_signatures_resolve_through_references() {
        let lib = lib(1, Some("OnlyV1"));
        let l2 = AssemblySymbol::Source(consumer(&lib));
        let c2 = l2.find_type("L2", "C2", 1).unwrap();
        assert_eq!(c2.origin(), SymbolOrigin::Source);

        let ret = c2.method("Get").unwrap().return_type().unwrap();
        assert_eq!(ret.named().unwrap().containing_assembly(), lib);

        let me = c2.method("Me").unwrap().return_type().unwrap();
        match me {
            TypeSymbol::Constructed { definition, arguments } => {
                assert_eq!(definition, c2);
                assert!(matches!(arguments[0], TypeSymbol::TypeParameter(_)));
            }
            other => panic!("expected constructed type, got {other:?}"),
        }

        let take = c2.method("Take").unwrap();
        let params = take.parameters();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name(), "value");
        match params[0].ty() {
            TypeSymbol::TypeParameter(param) => assert!(param.is_method_parameter()),
            other => panic!("expected method type parameter, got {other:?}"),
        }
        assert!(matches!(params[1].ty(), TypeSymbol::Array(_)));
    }

    #[test]
    fn module_reference_slots_resolve_by_index() {
        let lib = lib(1, None);
        let l2 = AssemblySymbol::Source(consumer(&lib));
        let manifest = l2.manifest_module();
        assert_eq!(manifest.referenced_assembly(0), Some(lib.clone()));
        assert_eq!(manifest.referenced_assembly(1), None);
        assert_eq!(manifest.referenced_assemblies(), vec![lib]);
    }

    #[test]
    fn retained_assemblies_survive_dropped_owners() {
        let source = {
            let lib = lib(1, None);
            let source = consumer(&lib);
            assert!(source.retain(vec![lib]));
            source
        };
        assert_eq!(source.retained_count(), 1);
        let l2 = AssemblySymbol::Source(source);
        let ret = l2
            .find_type("L2", "C2", 1)
            .unwrap()
            .method("Get")
            .unwrap()
            .return_type()
            .unwrap();
        assert!(!ret.is_error());
        assert_eq!(ret.named().unwrap().containing_assembly().identity(), &identity("Lib", 1));
    }

    #[test]
    fn retargeting_rewrites_cross_assembly_types() {
        let v1 = lib(1, Some("OnlyV1"));
        let v2 = lib(2, None);
        let l2 = consumer(&v1);

        let owner = CompilationId::next();
        let retargeting = l2.retargeting_for(owner);
        retargeting.bind_references(vec![vec![AssemblyLink::to(&v2)]]);
        let view = AssemblySymbol::Retargeting(retargeting.clone());

        let c2 = view.find_type("L2", "C2", 1).unwrap();
        assert_eq!(c2.origin(), SymbolOrigin::Retargeting);
        assert_eq!(c2.containing_assembly(), view);

        let get = c2.method("Get").unwrap().return_type().unwrap();
        let class1 = get.named().unwrap();
        assert_eq!(class1.containing_assembly(), v2);
        assert!(!get.is_error());

        let old = c2.method("Old").unwrap().return_type().unwrap();
        assert!(old.is_error(), "type absent from the new version is missing");
        assert_eq!(
            old.first_missing().unwrap().assembly(),
            Some(v2.identity())
        );

        let field = c2.field("cache").unwrap();
        assert_eq!(field.ty().named().unwrap().containing_assembly(), v2);

        let me = c2.method("Me").unwrap().return_type().unwrap();
        match me {
            TypeSymbol::Constructed { definition, .. } => assert_eq!(definition, c2),
            other => panic!("expected constructed type, got {other:?}"),
        }
    }

    #[test]
    fn retargeted_handles_are_interned() {
        let v1 = lib(1, Some("OnlyV1"));
        let v2 = lib(2, None);
        let l2 = consumer(&v1);
        let retargeting = l2.retargeting_for(CompilationId::next());
        retargeting.bind_references(vec![vec![AssemblyLink::to(&v2)]]);
        let view = AssemblySymbol::Retargeting(retargeting.clone());

        let first = view.find_type("L2", "C2", 1).unwrap().method("Take").unwrap();
        let slots = retargeting.slot_count();
        let second = view.find_type("L2", "C2", 1).unwrap().method("Take").unwrap();
        assert_eq!(first, second);
        assert_eq!(retargeting.slot_count(), slots);
        assert_eq!(first.parameters(), second.parameters());
    }

    #[test]
    fn one_retargeting_assembly_per_owner() {
        let v1 = lib(1, None);
        let l2 = consumer(&v1);
        let owner = CompilationId::next();
        let a = l2.retargeting_for(owner);
        let b = l2.retargeting_for(owner);
        assert!(Arc::ptr_eq(&a, &b));
        let other = l2.retargeting_for(CompilationId::next());
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(l2.live_retargetings(), 2);
        drop(other);
        assert_eq!(l2.live_retargetings(), 1);
    }

    #[test]
    fn missing_assembly_never_fails() {
        let missing = AssemblySymbol::missing(identity("Gone", 3));
        assert!(missing.is_missing());
        assert_eq!(missing, AssemblySymbol::missing(identity("Gone", 3)));
        assert_eq!(missing.modules().len(), 1);
        assert!(missing.types().is_empty());
        let ty = missing.resolve_type("Gone", "Thing", 0);
        assert!(ty.is_missing());
        assert!(ty.methods().is_empty());
        assert_eq!(ty.containing_assembly(), missing);
    }

    #[test]
    fn mutually_referencing_natives_bind() {
        let a = native(
            MetadataImage::assembly(
                identity("A", 1),
                ModuleDef::new("A.dll")
                    .references(identity("B", 1))
                    .with_type(TypeDef::new("A", "TA").with_base(TypeRef::external(0, "B", "TB"))),
            ),
            ImportOptions::Public,
        );
        let b = native(
            MetadataImage::assembly(
                identity("B", 1),
                ModuleDef::new("B.dll")
                    .references(identity("A", 1))
                    .with_type(TypeDef::new("B", "TB")),
            ),
            ImportOptions::Public,
        );
        bind(&a, &[&b]);
        bind(&b, &[&a]);
        assert_eq!(a.referenced_assemblies(), vec![b.clone()]);
        assert_eq!(b.referenced_assemblies(), vec![a.clone()]);
        let base = a.find_type("A", "TA", 0).unwrap().base_type().unwrap();
        assert_eq!(base.named().unwrap().containing_assembly(), b);
    }

    #[test]
    fn dropped_link_target_reads_as_missing() {
        let target = lib(1, None);
        let link = AssemblyLink::to(&target);
        assert_eq!(link.resolve(), target);
        drop(target);
        assert!(link.resolve().is_missing());
        assert_eq!(link.resolve().identity(), &identity("Lib", 1));
    }
}
