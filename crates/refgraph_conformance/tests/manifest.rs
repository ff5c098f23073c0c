//! A `refgraph.toml` project carried through to bound compilations.

use std::collections::HashMap;

use refgraph_binder::{Compilation, CompilationOptions, Reference};
use refgraph_config::{load_config_from_str, resolve_project, ConfigError, ResolvedReference};
use refgraph_conformance::{core_image, identity, lib_image, Fixture};
use refgraph_metadata::ImageKind;
use refgraph_symbols::{SourceUnit, Symbol, SymbolOrigin};

const MANIFEST: &str = r#"
[project]
name = "multitarget"

[images.core]
path = "core.rgm"

[images.lib1]
path = "lib1.rgm"

[images.lib2]
path = "lib2.rgm"
aliases = "v2"

[compilations.l3]
assembly_name = "L3"
references = ["core", "lib2", "l2"]

[compilations.l2]
assembly_name = "L2"
version = "2.0"
references = ["core", "lib1"]

[[compilations.l2.types]]
namespace = "L2"
name = "Api"

[[compilations.l2.types.methods]]
name = "GetClass"
returns = "Lib.Class1"
"#;

fn build(f: &Fixture, manifest: &str) -> Result<HashMap<String, Compilation>, ConfigError> {
    let config = load_config_from_str(manifest)?;
    let project = resolve_project(&config, f.dir())?;
    let mut built: HashMap<String, Compilation> = HashMap::new();
    for resolved in &project.compilations {
        let references: Vec<Reference> = resolved
            .references
            .iter()
            .map(|reference| match reference {
                ResolvedReference::Image { path, kind, aliases, .. } => {
                    let reference = match kind {
                        ImageKind::Assembly => Reference::from_file(path),
                        ImageKind::Module => Reference::module_from_file(path),
                    };
                    reference.with_aliases(aliases.iter().cloned())
                }
                ResolvedReference::Compilation { name } => built[name].to_reference(),
            })
            .collect();
        let unit = resolved
            .types
            .iter()
            .cloned()
            .fold(SourceUnit::new(&resolved.name), SourceUnit::with_type);
        let options = CompilationOptions::new()
            .with_version(resolved.version)
            .with_cache(f.cache().clone());
        let compilation = Compilation::create(&resolved.assembly_name, [unit], references, options);
        built.insert(resolved.name.clone(), compilation);
    }
    Ok(built)
}

#[test]
fn manifest_compilations_bind_and_retarget() {
    let f = Fixture::new().unwrap();
    f.write("core.rgm", &core_image());
    f.write("lib1.rgm", &lib_image(1));
    f.write("lib2.rgm", &lib_image(2));
    let built = build(&f, MANIFEST).unwrap();

    let l2 = &built["l2"];
    let l3 = &built["l3"];
    assert_eq!(l2.identity().version(), identity("x", 2).version());
    assert_eq!(l3.bound_graph().chosen_identity("lib"), Some(&identity("lib", 2)));
    assert_eq!(l3.bound_graph().aliases(1), ["v2"]);

    let seen = l3.referenced_unit_symbol(&l3.external_references()[2]).unwrap();
    assert_eq!(seen.origin(), SymbolOrigin::Retargeting);
    let returned = seen
        .find_type("L2", "Api", 0)
        .and_then(|api| api.method("GetClass"))
        .and_then(|method| method.return_type())
        .unwrap();
    assert_eq!(
        returned.named().unwrap().containing_assembly().identity(),
        &identity("lib", 2)
    );
    assert!(l3.diagnostics().is_empty());
}

#[test]
fn manifest_cycles_are_rejected() {
    let f = Fixture::new().unwrap();
    let cyclic = r#"
[project]
name = "cyclic"

[compilations.a]
references = ["b"]

[compilations.b]
references = ["a"]
"#;
    assert!(matches!(build(&f, cyclic), Err(ConfigError::ReferenceCycle(_))));
}
