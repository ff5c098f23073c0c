//! Standalone modules linked into a compilation's own assembly.

use std::sync::Arc;

use refgraph_conformance::Fixture;
use refgraph_metadata::{MetadataImage, ModuleDef, TypeDef};
use refgraph_symbols::{AssemblySymbol, ModuleSymbol, Symbol, SymbolOrigin};

fn module_image(name: &str, namespace: &str) -> MetadataImage {
    MetadataImage::Module(ModuleDef::new(name).with_type(TypeDef::new(namespace, "Extra")))
}

#[test]
fn one_module_image_gives_each_compilation_its_own_symbol() {
    let f = Fixture::new().unwrap();
    let m = f.file("extra.rgm", &module_image("extra.netmodule", "One"));
    let m2 = f.file("extra2.rgm", &module_image("extra2.netmodule", "Two"));
    let a = f.compile("A", [m.clone(), m2.clone()]);
    let b = f.compile("B", [m.clone()]);

    let in_a = a.referenced_subunit_symbol(&m).unwrap();
    let in_b = b.referenced_subunit_symbol(&m).unwrap();
    assert_ne!(in_a, in_b);
    assert_eq!(in_a.containing_assembly(), AssemblySymbol::Source(Arc::clone(a.assembly())));
    assert_eq!(in_b.containing_assembly(), AssemblySymbol::Source(Arc::clone(b.assembly())));

    match (&in_a, &in_b) {
        (ModuleSymbol::Native(x), ModuleSymbol::Native(y)) => {
            assert!(Arc::ptr_eq(x.image(), y.image()));
        }
        other => panic!("expected linked image modules, got {other:?}"),
    }
    assert_eq!(f.cache().stats().loads, 2);
}

#[test]
fn subunit_lookups_are_stable() {
    let f = Fixture::new().unwrap();
    let m = f.file("extra.rgm", &module_image("extra.netmodule", "One"));
    let a = f.compile("A", [m.clone()]);

    let first = a.referenced_subunit_symbol(&m).unwrap();
    let second = a.referenced_subunit_symbol(&m).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.origin(), SymbolOrigin::Native);
    assert!(a.referenced_unit_symbol(&m).is_none());
}

#[test]
fn manifest_module_comes_first_then_reference_order() {
    let f = Fixture::new().unwrap();
    let m = f.file("extra.rgm", &module_image("extra.netmodule", "One"));
    let m2 = f.file("extra2.rgm", &module_image("extra2.netmodule", "Two"));
    let a = f.compile("A", [m.clone(), m2.clone()]);

    let modules = AssemblySymbol::Source(Arc::clone(a.assembly())).modules();
    let names: Vec<&str> = modules.iter().map(|module| module.name()).collect();
    assert_eq!(names, ["A.dll", "extra.netmodule", "extra2.netmodule"]);
    assert_eq!(a.referenced_subunit_symbol(&m).unwrap().ordinal(), 1);
    assert_eq!(a.referenced_subunit_symbol(&m2).unwrap().ordinal(), 2);
    assert!(a.find_type("Two", "Extra", 0).is_some());
}
