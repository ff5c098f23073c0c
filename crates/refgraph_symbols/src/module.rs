//! Module (sub-unit) symbols.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use refgraph_common::AssemblyIdentity;

use crate::assembly::{AssemblyLink, AssemblySymbol, MissingAssembly};
use crate::native::NativeModule;
use crate::retargeting::Retargeted;
use crate::source_assembly::SourceAssembly;
use crate::symbol::{Symbol, SymbolKind, SymbolOrigin};
use crate::types::{NamedTypeSymbol, NativeType, SourceType};

/// A module of an assembly.
#[derive(Clone)]
pub enum ModuleSymbol {
    /// A module read from an image, owned by a native assembly or linked
    /// into a compilation's own assembly.
    Native(NativeModule),
    /// The manifest module of a compilation's own assembly.
    Source(Arc<SourceAssembly>),
    /// A foreign compilation's module seen through a retargeting assembly.
    Retargeting(Retargeted<ModuleSymbol>),
    /// The only module of a missing assembly.
    Missing(Arc<MissingAssembly>),
}

impl ModuleSymbol {
    /// Position in the containing assembly's module list; 0 is the manifest.
    pub fn ordinal(&self) -> u32 {
        match self {
            ModuleSymbol::Native(module) => module.ordinal(),
            ModuleSymbol::Source(_) | ModuleSymbol::Missing(_) => 0,
            ModuleSymbol::Retargeting(retargeted) => retargeted.underlying().ordinal(),
        }
    }

    /// Identities named by the module's reference table, in table order.
    pub fn referenced_assembly_identities(&self) -> Vec<AssemblyIdentity> {
        match self {
            ModuleSymbol::Native(module) => module.definition().referenced_assemblies.clone(),
            ModuleSymbol::Source(source) => source
                .manifest_links()
                .map(|links| links.iter().map(|link| link.identity().clone()).collect())
                .unwrap_or_default(),
            ModuleSymbol::Retargeting(retargeted) => {
                retargeted.underlying().referenced_assembly_identities()
            }
            ModuleSymbol::Missing(_) => Vec::new(),
        }
    }

    /// The symbols bound to each reference-table entry, same length and order
    /// as [`referenced_assembly_identities`](Self::referenced_assembly_identities).
    ///
    /// Empty until the owning compilation has bound the module.
    pub fn referenced_assemblies(&self) -> Vec<AssemblySymbol> {
        self.links()
            .map(|links| links.iter().map(AssemblyLink::resolve).collect())
            .unwrap_or_default()
    }

    /// The symbol bound to reference-table entry `index`.
    pub fn referenced_assembly(&self, index: usize) -> Option<AssemblySymbol> {
        self.links()
            .and_then(|links| links.get(index).map(AssemblyLink::resolve))
    }

    /// Whether the module's reference table has been bound.
    pub fn is_bound(&self) -> bool {
        match self {
            ModuleSymbol::Missing(_) => true,
            _ => self.links().is_some(),
        }
    }

    fn links(&self) -> Option<Vec<AssemblyLink>> {
        match self {
            ModuleSymbol::Native(module) => module.data().links().map(<[_]>::to_vec),
            ModuleSymbol::Source(source) => source.manifest_links().map(<[_]>::to_vec),
            ModuleSymbol::Retargeting(retargeted) => retargeted
                .retargeting_assembly()
                .module_links(retargeted.underlying().ordinal() as usize)
                .map(<[_]>::to_vec),
            ModuleSymbol::Missing(_) => Some(Vec::new()),
        }
    }

    /// Visible types defined in this module.
    pub fn types(&self) -> Vec<NamedTypeSymbol> {
        match self {
            ModuleSymbol::Native(module) => {
                let import = module.owner().import();
                module
                    .definition()
                    .types
                    .iter()
                    .enumerate()
                    .filter(|(_, ty)| import.admits(ty.accessibility))
                    .map(|(i, _)| NamedTypeSymbol::Native(NativeType::new(module.clone(), i as u32)))
                    .collect()
            }
            ModuleSymbol::Source(source) => (0..source.type_count())
                .map(|i| NamedTypeSymbol::Source(SourceType::new(source.clone(), i as u32)))
                .collect(),
            ModuleSymbol::Retargeting(retargeted) => retargeted
                .underlying()
                .types()
                .into_iter()
                .map(|ty| retargeted.retargeting_assembly().retarget(ty))
                .collect(),
            ModuleSymbol::Missing(_) => Vec::new(),
        }
    }

    /// Visible types in the given namespace.
    pub fn types_in_namespace(&self, namespace: &str) -> Vec<NamedTypeSymbol> {
        self.types()
            .into_iter()
            .filter(|ty| ty.namespace() == namespace)
            .collect()
    }

    /// Looks up a visible type by namespace, name and arity.
    pub fn find_type(&self, namespace: &str, name: &str, arity: u16) -> Option<NamedTypeSymbol> {
        match self {
            ModuleSymbol::Native(module) => {
                let index = module.data().find(namespace, name, arity)?;
                let def = &module.definition().types[index as usize];
                module
                    .owner()
                    .import()
                    .admits(def.accessibility)
                    .then(|| NamedTypeSymbol::Native(NativeType::new(module.clone(), index)))
            }
            ModuleSymbol::Source(source) => source
                .find(namespace, name, arity)
                .map(|index| NamedTypeSymbol::Source(SourceType::new(source.clone(), index))),
            ModuleSymbol::Retargeting(retargeted) => retargeted
                .underlying()
                .find_type(namespace, name, arity)
                .map(|ty| retargeted.retargeting_assembly().retarget(ty)),
            ModuleSymbol::Missing(_) => None,
        }
    }
}

impl Symbol for ModuleSymbol {
    fn kind(&self) -> SymbolKind {
        SymbolKind::Module
    }

    fn origin(&self) -> SymbolOrigin {
        match self {
            ModuleSymbol::Native(_) => SymbolOrigin::Native,
            ModuleSymbol::Source(_) => SymbolOrigin::Source,
            ModuleSymbol::Retargeting(_) => SymbolOrigin::Retargeting,
            ModuleSymbol::Missing(_) => SymbolOrigin::Missing,
        }
    }

    fn name(&self) -> &str {
        match self {
            ModuleSymbol::Native(module) => &module.definition().name,
            ModuleSymbol::Source(source) => source.module_name(),
            ModuleSymbol::Retargeting(retargeted) => retargeted.underlying().name(),
            ModuleSymbol::Missing(missing) => missing.identity().name(),
        }
    }

    fn containing_assembly(&self) -> AssemblySymbol {
        match self {
            ModuleSymbol::Native(module) => module.owner().assembly(),
            ModuleSymbol::Source(source) => AssemblySymbol::Source(source.clone()),
            ModuleSymbol::Retargeting(retargeted) => {
                AssemblySymbol::Retargeting(retargeted.retargeting_assembly().clone())
            }
            ModuleSymbol::Missing(missing) => AssemblySymbol::Missing(missing.clone()),
        }
    }
}

impl PartialEq for ModuleSymbol {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ModuleSymbol::Native(a), ModuleSymbol::Native(b)) => a == b,
            (ModuleSymbol::Source(a), ModuleSymbol::Source(b)) => Arc::ptr_eq(a, b),
            (ModuleSymbol::Retargeting(a), ModuleSymbol::Retargeting(b)) => a == b,
            (ModuleSymbol::Missing(a), ModuleSymbol::Missing(b)) => a.identity() == b.identity(),
            _ => false,
        }
    }
}

impl Eq for ModuleSymbol {}

impl Hash for ModuleSymbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ModuleSymbol::Native(module) => module.hash(state),
            ModuleSymbol::Source(source) => (Arc::as_ptr(source) as usize).hash(state),
            ModuleSymbol::Retargeting(retargeted) => retargeted.hash(state),
            ModuleSymbol::Missing(missing) => missing.identity().hash(state),
        }
    }
}

impl fmt::Debug for ModuleSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModuleSymbol::{}({} in {})",
            self.origin(),
            self.name(),
            self.containing_assembly().identity()
        )
    }
}
