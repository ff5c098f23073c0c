//! Multi-targeting: compilations seen through other compilations that
//! chose different versions of their dependencies.

use std::sync::Arc;

use refgraph_binder::errors::E007;
use refgraph_conformance::{core_image, identity, lib_image, Fixture};
use refgraph_symbols::{AssemblySymbol, Symbol, SymbolOrigin};

struct Scenario {
    f: Fixture,
    core: refgraph_binder::Reference,
    lib1: refgraph_binder::Reference,
    lib2: refgraph_binder::Reference,
}

fn scenario() -> Scenario {
    let f = Fixture::new().unwrap();
    let core = f.file("core.rgm", &core_image());
    let lib1 = f.file("lib1.rgm", &lib_image(1));
    let lib2 = f.file("lib2.rgm", &lib_image(2));
    Scenario { f, core, lib1, lib2 }
}

#[test]
fn l3_sees_l2_through_its_own_lib_version() {
    let s = scenario();
    let l2 = s.f.compile_api("L2", [s.core.clone(), s.lib1.clone()]);
    let l2_ref = l2.to_reference();
    let l3 = s.f.compile_api("L3", [s.core.clone(), s.lib2.clone(), l2_ref.clone()]);

    let seen = l3.referenced_unit_symbol(&l2_ref).unwrap();
    assert_eq!(seen.origin(), SymbolOrigin::Retargeting);
    assert_eq!(seen.identity(), &l2.identity());
    assert_eq!(l3.bound_graph().retargeted().count(), 1);

    let lib2 = l3.referenced_unit_symbol(&s.lib2).unwrap();
    let targets = seen.referenced_assemblies();
    assert!(targets.contains(&lib2));
    assert!(!targets.iter().any(|a| a.identity() == &identity("lib", 1)));

    let api = seen.find_type("L2", "Api", 0).unwrap();
    assert_eq!(api.origin(), SymbolOrigin::Retargeting);
    let returned = api.method("GetClass").unwrap().return_type().unwrap();
    assert!(!returned.is_error());
    let class1 = returned.named().unwrap();
    assert_eq!(class1.full_name(), "Lib.Class1");
    assert_eq!(class1.containing_assembly(), lib2);
}

#[test]
fn l2_itself_still_sees_lib_v1() {
    let s = scenario();
    let l2 = s.f.compile_api("L2", [s.core.clone(), s.lib1.clone()]);
    let l3 = s.f.compile_api("L3", [s.core.clone(), s.lib2.clone(), l2.to_reference()]);
    l3.bound_graph();

    let api = l2.find_type("L2", "Api", 0).unwrap();
    assert_eq!(api.origin(), SymbolOrigin::Source);
    let returned = api.method("GetClass").unwrap().return_type().unwrap();
    assert_eq!(
        returned.named().unwrap().containing_assembly().identity(),
        &identity("lib", 1)
    );
}

#[test]
fn matching_choices_reuse_the_source_assembly() {
    let s = scenario();
    let l2 = s.f.compile_api("L2", [s.core.clone(), s.lib1.clone()]);
    let l2_ref = l2.to_reference();
    let l4 = s.f.compile("L4", [s.core.clone(), s.lib1.clone(), l2_ref.clone()]);

    let seen = l4.referenced_unit_symbol(&l2_ref).unwrap();
    assert_eq!(seen.origin(), SymbolOrigin::Source);
    assert_eq!(seen, AssemblySymbol::Source(Arc::clone(l2.assembly())));
    assert_eq!(l4.bound_graph().retargeted().count(), 0);
}

#[test]
fn lib_dependent_members_go_missing_without_lib() {
    let s = scenario();
    let l2 = s.f.compile_api("L2", [s.core.clone(), s.lib1.clone()]);
    let l3 = s.f.compile_api("L3", [s.core.clone(), s.lib2.clone(), l2.to_reference()]);
    let l3_ref = l3.to_reference();
    let l5 = s.f.compile("L5", [s.core.clone(), l3_ref.clone()]);

    let seen = l5.referenced_unit_symbol(&l3_ref).unwrap();
    assert_eq!(seen.origin(), SymbolOrigin::Retargeting);
    let api = seen.find_type("L3", "Api", 0).unwrap();

    let class = api.method("GetClass").unwrap().return_type().unwrap();
    assert!(class.is_error());
    let diagnostic = l5.use_site_diagnostic(&class).unwrap();
    assert_eq!(diagnostic.code, E007);
    assert!(diagnostic.message.contains("lib"));

    let object = api.method("GetObject").unwrap().return_type().unwrap();
    assert!(!object.is_error());
    assert_eq!(
        object.named().unwrap().containing_assembly(),
        l5.referenced_unit_symbol(&s.core).unwrap()
    );
    assert!(l5.use_site_diagnostic(&object).is_none());
    assert!(l5.bound_graph().is_missing(&identity("lib", 2)));
}

#[test]
fn retargeted_handles_are_interned() {
    let s = scenario();
    let l2 = s.f.compile_api("L2", [s.core.clone(), s.lib1.clone()]);
    let l2_ref = l2.to_reference();
    let l3 = s.f.compile("L3", [s.core.clone(), s.lib2.clone(), l2_ref.clone()]);
    let seen = l3.referenced_unit_symbol(&l2_ref).unwrap();
    let retargeting = seen.as_retargeting().unwrap();

    let first = seen.find_type("L2", "Api", 0).unwrap();
    let method = first.method("GetObject").unwrap();
    let slots = retargeting.slot_count();

    let second = seen.find_type("L2", "Api", 0).unwrap();
    assert_eq!(first, second);
    assert_eq!(second.method("GetObject").unwrap(), method);
    assert_eq!(retargeting.slot_count(), slots);
}

#[test]
fn one_retargeting_assembly_per_owner() {
    let s = scenario();
    let l2 = s.f.compile_api("L2", [s.core.clone(), s.lib1.clone()]);
    let l2_ref = l2.to_reference();
    let l3 = s.f.compile("L3", [s.core.clone(), s.lib2.clone(), l2_ref.clone()]);
    let l3b = s.f.compile("L3b", [s.core.clone(), s.lib2.clone(), l2_ref.clone()]);

    let a = l3.referenced_unit_symbol(&l2_ref).unwrap();
    let b = l3.referenced_unit_symbol(&l2_ref).unwrap();
    let other = l3b.referenced_unit_symbol(&l2_ref).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, other);
    assert_eq!(l2.assembly().live_retargetings(), 2);
}

#[test]
fn symbols_outlive_their_compilation() {
    let s = scenario();
    let api = {
        let l2 = s.f.compile_api("L2", [s.core.clone(), s.lib1.clone()]);
        l2.find_type("L2", "Api", 0).unwrap()
    };

    let class = api.method("GetClass").unwrap().return_type().unwrap();
    assert!(!class.is_error());
    assert_eq!(
        class.named().unwrap().containing_assembly().identity(),
        &identity("lib", 1)
    );
    assert_eq!(api.containing_assembly().as_source().unwrap().retained_count(), 2);
}

#[test]
fn retargeted_symbols_outlive_both_compilations() {
    let s = scenario();
    let api = {
        let l2 = s.f.compile_api("L2", [s.core.clone(), s.lib1.clone()]);
        let l2_ref = l2.to_reference();
        let l3 = s.f.compile("L3", [s.core.clone(), s.lib2.clone(), l2_ref.clone()]);
        let seen = l3.referenced_unit_symbol(&l2_ref).unwrap();
        seen.find_type("L2", "Api", 0).unwrap()
    };

    assert_eq!(api.origin(), SymbolOrigin::Retargeting);
    let class = api.method("GetClass").unwrap().return_type().unwrap();
    assert!(!class.is_error());
    assert_eq!(
        class.named().unwrap().containing_assembly().identity(),
        &identity("lib", 2)
    );
    let object = api.method("GetObject").unwrap().return_type().unwrap();
    assert!(!object.is_error());
}
