//! Assembly (unit) symbols and the links between them.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use refgraph_common::AssemblyIdentity;

use crate::module::ModuleSymbol;
use crate::native::{ImageOwner, NativeAssembly, NativeModule};
use crate::retargeting::RetargetingAssembly;
use crate::source_assembly::SourceAssembly;
use crate::symbol::{Symbol, SymbolKind, SymbolOrigin};
use crate::types::{MissingType, NamedTypeSymbol};

/// Placeholder for an identity no supplied reference satisfies.
///
/// Missing assemblies compare equal when their identities are equal, so the
/// sentinel for an identity behaves as a constant regardless of which
/// compilation produced it.
pub struct MissingAssembly {
    identity: AssemblyIdentity,
}

impl MissingAssembly {
    /// Creates the placeholder for `identity`.
    pub fn new(identity: AssemblyIdentity) -> Self {
        Self { identity }
    }

    /// The identity that could not be resolved.
    pub fn identity(&self) -> &AssemblyIdentity {
        &self.identity
    }
}

/// A compiled unit as seen by one compilation.
///
/// Cloning is cheap. Equality is handle identity for the native, source and
/// retargeting variants and identity equality for missing ones.
#[derive(Clone)]
pub enum AssemblySymbol {
    /// Built from a parsed metadata image; shared through the metadata cache.
    Native(Arc<NativeAssembly>),
    /// A compilation's own assembly.
    Source(Arc<SourceAssembly>),
    /// Another compilation's assembly viewed through this compilation's
    /// choice of dependency versions.
    Retargeting(Arc<RetargetingAssembly>),
    /// An unresolved identity.
    Missing(Arc<MissingAssembly>),
}

impl AssemblySymbol {
    /// A missing assembly for `identity`.
    pub fn missing(identity: AssemblyIdentity) -> Self {
        AssemblySymbol::Missing(Arc::new(MissingAssembly::new(identity)))
    }

    /// The assembly's identity.
    pub fn identity(&self) -> &AssemblyIdentity {
        match self {
            AssemblySymbol::Native(native) => native.identity(),
            AssemblySymbol::Source(source) => source.identity(),
            AssemblySymbol::Retargeting(retargeting) => retargeting.identity(),
            AssemblySymbol::Missing(missing) => missing.identity(),
        }
    }

    /// Modules in order: manifest first, then linked modules.
    pub fn modules(&self) -> Vec<ModuleSymbol> {
        match self {
            AssemblySymbol::Native(native) => (0..native.module_count())
                .map(|i| {
                    ModuleSymbol::Native(NativeModule::new(
                        ImageOwner::Assembly(native.clone()),
                        i as u32,
                    ))
                })
                .collect(),
            AssemblySymbol::Source(source) => {
                let mut modules = vec![ModuleSymbol::Source(source.clone())];
                modules.extend((0..source.added_module_count()).map(|i| {
                    ModuleSymbol::Native(NativeModule::new(
                        ImageOwner::Source(source.clone()),
                        i as u32 + 1,
                    ))
                }));
                modules
            }
            AssemblySymbol::Retargeting(retargeting) => {
                AssemblySymbol::Source(retargeting.underlying().clone())
                    .modules()
                    .into_iter()
                    .map(|module| retargeting.retarget(module))
                    .collect()
            }
            AssemblySymbol::Missing(missing) => vec![ModuleSymbol::Missing(missing.clone())],
        }
    }

    /// The manifest module.
    pub fn manifest_module(&self) -> ModuleSymbol {
        match self {
            AssemblySymbol::Native(native) => {
                ModuleSymbol::Native(NativeModule::new(ImageOwner::Assembly(native.clone()), 0))
            }
            AssemblySymbol::Source(source) => ModuleSymbol::Source(source.clone()),
            AssemblySymbol::Retargeting(retargeting) => {
                retargeting.retarget(ModuleSymbol::Source(retargeting.underlying().clone()))
            }
            AssemblySymbol::Missing(missing) => ModuleSymbol::Missing(missing.clone()),
        }
    }

    /// Assemblies referenced by the manifest module, in table order.
    pub fn referenced_assemblies(&self) -> Vec<AssemblySymbol> {
        self.manifest_module().referenced_assemblies()
    }

    /// Every visible type of every module.
    pub fn types(&self) -> Vec<NamedTypeSymbol> {
        self.modules()
            .iter()
            .flat_map(|module| module.types())
            .collect()
    }

    /// Looks up a type by namespace, name and arity across modules in order.
    pub fn find_type(&self, namespace: &str, name: &str, arity: u16) -> Option<NamedTypeSymbol> {
        self.modules()
            .iter()
            .find_map(|module| module.find_type(namespace, name, arity))
    }

    /// Like [`find_type`](Self::find_type) but yields a missing type when absent.
    pub fn resolve_type(&self, namespace: &str, name: &str, arity: u16) -> NamedTypeSymbol {
        self.find_type(namespace, name, arity).unwrap_or_else(|| {
            NamedTypeSymbol::Missing(Arc::new(MissingType::new(
                Some(self.identity().clone()),
                namespace,
                name,
                arity,
            )))
        })
    }

    /// A weak handle, or `None` for missing assemblies.
    pub fn downgrade(&self) -> Option<WeakAssemblySymbol> {
        match self {
            AssemblySymbol::Native(native) => Some(WeakAssemblySymbol::Native(Arc::downgrade(native))),
            AssemblySymbol::Source(source) => Some(WeakAssemblySymbol::Source(Arc::downgrade(source))),
            AssemblySymbol::Retargeting(retargeting) => {
                Some(WeakAssemblySymbol::Retargeting(Arc::downgrade(retargeting)))
            }
            AssemblySymbol::Missing(_) => None,
        }
    }

    /// The native wrapper, if this is one.
    pub fn as_native(&self) -> Option<&Arc<NativeAssembly>> {
        match self {
            AssemblySymbol::Native(native) => Some(native),
            _ => None,
        }
    }

    /// The own-source assembly, if this is one.
    pub fn as_source(&self) -> Option<&Arc<SourceAssembly>> {
        match self {
            AssemblySymbol::Source(source) => Some(source),
            _ => None,
        }
    }

    /// The retargeting assembly, if this is one.
    pub fn as_retargeting(&self) -> Option<&Arc<RetargetingAssembly>> {
        match self {
            AssemblySymbol::Retargeting(retargeting) => Some(retargeting),
            _ => None,
        }
    }

    fn address(&self) -> usize {
        match self {
            AssemblySymbol::Native(native) => Arc::as_ptr(native) as usize,
            AssemblySymbol::Source(source) => Arc::as_ptr(source) as usize,
            AssemblySymbol::Retargeting(retargeting) => Arc::as_ptr(retargeting) as usize,
            AssemblySymbol::Missing(_) => 0,
        }
    }
}

impl Symbol for AssemblySymbol {
    fn kind(&self) -> SymbolKind {
        SymbolKind::Assembly
    }

    fn origin(&self) -> SymbolOrigin {
        match self {
            AssemblySymbol::Native(_) => SymbolOrigin::Native,
            AssemblySymbol::Source(_) => SymbolOrigin::Source,
            AssemblySymbol::Retargeting(_) => SymbolOrigin::Retargeting,
            AssemblySymbol::Missing(_) => SymbolOrigin::Missing,
        }
    }

    fn name(&self) -> &str {
        self.identity().name()
    }

    fn containing_assembly(&self) -> AssemblySymbol {
        self.clone()
    }
}

impl PartialEq for AssemblySymbol {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AssemblySymbol::Missing(a), AssemblySymbol::Missing(b)) => a.identity == b.identity,
            (AssemblySymbol::Native(_), AssemblySymbol::Native(_))
            | (AssemblySymbol::Source(_), AssemblySymbol::Source(_))
            | (AssemblySymbol::Retargeting(_), AssemblySymbol::Retargeting(_)) => {
                self.address() == other.address()
            }
            _ => false,
        }
    }
}

impl Eq for AssemblySymbol {}

impl Hash for AssemblySymbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            AssemblySymbol::Missing(missing) => missing.identity.hash(state),
            _ => self.address().hash(state),
        }
    }
}

impl fmt::Debug for AssemblySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssemblySymbol::{}({})", self.origin(), self.identity())
    }
}

/// A non-owning handle to an assembly symbol.
#[derive(Clone)]
pub enum WeakAssemblySymbol {
    /// See [`AssemblySymbol::Native`].
    Native(Weak<NativeAssembly>),
    /// See [`AssemblySymbol::Source`].
    Source(Weak<SourceAssembly>),
    /// See [`AssemblySymbol::Retargeting`].
    Retargeting(Weak<RetargetingAssembly>),
}

impl WeakAssemblySymbol {
    /// Recovers the strong handle if the symbol is still alive.
    pub fn upgrade(&self) -> Option<AssemblySymbol> {
        match self {
            WeakAssemblySymbol::Native(native) => native.upgrade().map(AssemblySymbol::Native),
            WeakAssemblySymbol::Source(source) => source.upgrade().map(AssemblySymbol::Source),
            WeakAssemblySymbol::Retargeting(retargeting) => {
                retargeting.upgrade().map(AssemblySymbol::Retargeting)
            }
        }
    }
}

/// One resolved entry of a module's referenced-assembly table.
///
/// Links to live assemblies are weak: the compilation that bound them owns
/// the targets, and native assemblies may reference each other in cycles.
/// Missing targets are held strongly. A link whose target has been dropped
/// resolves to a missing assembly.
#[derive(Clone)]
pub struct AssemblyLink {
    identity: AssemblyIdentity,
    target: LinkTarget,
}

#[derive(Clone)]
enum LinkTarget {
    Strong(AssemblySymbol),
    Weak(WeakAssemblySymbol),
}

impl AssemblyLink {
    /// A link to `symbol`.
    pub fn to(symbol: &AssemblySymbol) -> Self {
        let target = match symbol.downgrade() {
            Some(weak) => LinkTarget::Weak(weak),
            None => LinkTarget::Strong(symbol.clone()),
        };
        Self {
            identity: symbol.identity().clone(),
            target,
        }
    }

    /// The identity of the bound target.
    pub fn identity(&self) -> &AssemblyIdentity {
        &self.identity
    }

    /// The bound symbol.
    pub fn resolve(&self) -> AssemblySymbol {
        match &self.target {
            LinkTarget::Strong(symbol) => symbol.clone(),
            LinkTarget::Weak(weak) => weak
                .upgrade()
                .unwrap_or_else(|| AssemblySymbol::missing(self.identity.clone())),
        }
    }
}

impl fmt::Debug for AssemblyLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssemblyLink({:?})", self.resolve())
    }
}
