//! Sharing of parsed images and native wrappers through the metadata cache,
//! and compaction of entries nobody holds any more.

use std::sync::Arc;
use std::time::{Duration, Instant};

use refgraph_binder::Compilation;
use refgraph_conformance::{core_image, identity, lib_image, Fixture};
use refgraph_symbols::ImportOptions;

#[test]
fn different_bindings_share_the_image_but_not_the_symbol() {
    let f = Fixture::new().unwrap();
    let core = f.file("core.rgm", &core_image());
    let lib = f.file("lib1.rgm", &lib_image(1));
    let with_core = f.compile("One", [core, lib.clone()]);
    let without_core = f.compile("Two", [lib.clone()]);

    let a = with_core.referenced_unit_symbol(&lib).unwrap();
    let b = without_core.referenced_unit_symbol(&lib).unwrap();
    assert_ne!(a, b);
    assert!(without_core.bound_graph().is_missing(&identity("core", 4)));

    let (a, b) = (a.as_native().unwrap(), b.as_native().unwrap());
    assert_eq!(a.key(), b.key());
    assert!(Arc::ptr_eq(a.image(), b.image()));
    let entry = f.cache().inspect(a.key()).unwrap();
    assert!(entry.image_alive);
    assert_eq!(entry.live_wrappers, 2);
    assert_eq!(f.cache().stats().loads, 2);
}

#[test]
fn equal_bindings_share_native_wrappers() {
    let f = Fixture::new().unwrap();
    let core = f.file("core.rgm", &core_image());
    let lib = f.file("lib1.rgm", &lib_image(1));
    let one = f.compile("One", [core.clone(), lib.clone()]);
    let two = f.compile("Two", [core.clone(), lib.clone()]);
    let a = one.referenced_unit_symbol(&lib).unwrap();
    let b = two.referenced_unit_symbol(&lib).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.referenced_assemblies()[0], one.referenced_unit_symbol(&core).unwrap());
}

#[test]
fn import_visibility_separates_wrappers() {
    let f = Fixture::new().unwrap();
    let core = f.file("core.rgm", &core_image());
    let public = Compilation::create("One", [], [core.clone()], f.options_with_import(ImportOptions::Public));
    let everything = Compilation::create("Two", [], [core.clone()], f.options_with_import(ImportOptions::All));
    let again = Compilation::create("Three", [], [core.clone()], f.options_with_import(ImportOptions::All));

    let p = public.referenced_unit_symbol(&core).unwrap();
    let e = everything.referenced_unit_symbol(&core).unwrap();
    let a = again.referenced_unit_symbol(&core).unwrap();
    assert_ne!(p, e);
    assert_eq!(e, a);
    assert!(Arc::ptr_eq(p.as_native().unwrap().image(), e.as_native().unwrap().image()));
}

#[test]
fn compaction_removes_dropped_entries() {
    let f = Fixture::new().unwrap();
    let core = f.file("core.rgm", &core_image());
    let lib = f.file("lib1.rgm", &lib_image(1));

    let key = {
        let c = f.compile("App", [core.clone(), lib.clone()]);
        let symbol = c.referenced_unit_symbol(&lib).unwrap();
        let native = symbol.as_native().unwrap();
        native.key().clone()
    };
    let entry = f.cache().inspect(&key).unwrap();
    assert!(!entry.image_alive);
    assert_eq!(entry.live_wrappers, 0);

    assert_eq!(f.cache().compact(), 2);
    assert!(!f.cache().contains(&key));
    assert!(f.cache().is_empty());

    let loads = f.cache().stats().loads;
    let c = f.compile("App", [core, lib.clone()]);
    let symbol = c.referenced_unit_symbol(&lib).unwrap();
    assert_eq!(symbol.as_native().unwrap().key(), &key);
    assert!(f.cache().contains(&key));
    assert_eq!(f.cache().stats().loads, loads + 2);
}

#[test]
fn live_entries_survive_compaction() {
    let f = Fixture::new().unwrap();
    let core = f.file("core.rgm", &core_image());
    let c = f.compile("App", [core.clone()]);
    let symbol = c.referenced_unit_symbol(&core).unwrap();
    assert_eq!(f.cache().compact(), 0);
    assert!(f.cache().contains(symbol.as_native().unwrap().key()));
}

#[test]
fn background_compaction_collects_dropped_entries() {
    let f = Fixture::new().unwrap();
    let core = f.file("core.rgm", &core_image());
    let handle = f.cache().spawn_compaction(Duration::from_millis(5)).unwrap();

    drop(f.compile("App", [core.clone()]).referenced_unit_symbol(&core));
    let deadline = Instant::now() + Duration::from_secs(5);
    while !f.cache().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    handle.stop();
    assert!(f.cache().is_empty());
}
