//! Retargeting: viewing a foreign compilation's assembly through another
//! compilation's choice of dependencies.
//!
//! A [`RetargetingAssembly`] wraps the own-source assembly of a referenced
//! compilation. Every symbol reached through it is wrapped lazily in a
//! [`Retargeted`] handle; every type reference leaving the wrapped assembly
//! is rewritten to the assembly the owning compilation bound for the same
//! reference-table slot. Handles are interned in an arena so that reaching
//! the same underlying symbol twice yields equal handles.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use refgraph_common::AssemblyIdentity;

use crate::arena::Arena;
use crate::assembly::{AssemblyLink, AssemblySymbol};
use crate::ids::{CompilationId, RetargetedId};
use crate::members::{FieldSymbol, MethodSymbol, ParameterSymbol, TypeParameterSymbol};
use crate::module::ModuleSymbol;
use crate::source_assembly::SourceAssembly;
use crate::symbol::Symbol;
use crate::types::{NamedTypeSymbol, TypeSymbol};

/// The underlying symbol a retargeted handle stands for.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RetargetKey {
    /// A module.
    Module(ModuleSymbol),
    /// A named type.
    Type(NamedTypeSymbol),
    /// A method.
    Method(MethodSymbol),
    /// A field.
    Field(FieldSymbol),
    /// A parameter.
    Parameter(ParameterSymbol),
    /// A generic parameter.
    TypeParameter(TypeParameterSymbol),
}

/// Symbol roles that can be seen through a retargeting assembly.
pub trait Retargetable: Clone + Sized {
    /// The interning key of an underlying symbol.
    fn key(&self) -> RetargetKey;

    /// Wraps a retargeted handle in the role's symbol type.
    fn wrap(retargeted: Retargeted<Self>) -> Self;
}

macro_rules! retargetable {
    ($ty:ident, $key:ident) => {
        impl Retargetable for $ty {
            fn key(&self) -> RetargetKey {
                RetargetKey::$key(self.clone())
            }

            fn wrap(retargeted: Retargeted<Self>) -> Self {
                $ty::Retargeting(retargeted)
            }
        }
    };
}

retargetable!(ModuleSymbol, Module);
retargetable!(NamedTypeSymbol, Type);
retargetable!(MethodSymbol, Method);
retargetable!(FieldSymbol, Field);
retargetable!(ParameterSymbol, Parameter);
retargetable!(TypeParameterSymbol, TypeParameter);

/// A handle to one underlying symbol as seen through a retargeting assembly.
///
/// Two handles are equal when they come from the same retargeting assembly
/// and name the same interned slot.
pub struct Retargeted<S> {
    assembly: Arc<RetargetingAssembly>,
    id: RetargetedId,
    underlying: Arc<S>,
}

impl<S> Retargeted<S> {
    /// The retargeting assembly the handle belongs to.
    pub fn retargeting_assembly(&self) -> &Arc<RetargetingAssembly> {
        &self.assembly
    }

    /// The wrapped symbol.
    pub fn underlying(&self) -> &S {
        &self.underlying
    }

    /// The interned slot.
    pub fn id(&self) -> RetargetedId {
        self.id
    }
}

impl<S> Clone for Retargeted<S> {
    fn clone(&self) -> Self {
        Self {
            assembly: Arc::clone(&self.assembly),
            id: self.id,
            underlying: Arc::clone(&self.underlying),
        }
    }
}

impl<S> PartialEq for Retargeted<S> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.assembly, &other.assembly) && self.id == other.id
    }
}

impl<S> Eq for Retargeted<S> {}

impl<S> Hash for Retargeted<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.assembly) as usize).hash(state);
        self.id.hash(state);
    }
}

impl<S: fmt::Debug> fmt::Debug for Retargeted<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Retargeted({:?} #{})", self.underlying, self.id.as_raw())
    }
}

#[derive(Default)]
struct RetargetingTable {
    slots: Arena<RetargetedId, RetargetKey>,
    index: HashMap<RetargetKey, RetargetedId>,
}

/// Another compilation's own assembly, presented inside compilation `owner`.
pub struct RetargetingAssembly {
    owner: CompilationId,
    underlying: Arc<SourceAssembly>,
    module_links: OnceLock<Vec<Vec<AssemblyLink>>>,
    retained: OnceLock<Vec<AssemblySymbol>>,
    assembly_map: OnceLock<HashMap<AssemblySymbol, AssemblyLink>>,
    table: Mutex<RetargetingTable>,
}

impl RetargetingAssembly {
    pub(crate) fn new(owner: CompilationId, underlying: Arc<SourceAssembly>) -> Self {
        Self {
            owner,
            underlying,
            module_links: OnceLock::new(),
            retained: OnceLock::new(),
            assembly_map: OnceLock::new(),
            table: Mutex::new(RetargetingTable::default()),
        }
    }

    /// The underlying assembly's identity.
    pub fn identity(&self) -> &AssemblyIdentity {
        self.underlying.identity()
    }

    /// The wrapped own-source assembly.
    pub fn underlying(&self) -> &Arc<SourceAssembly> {
        &self.underlying
    }

    /// The compilation this view belongs to.
    pub fn owner(&self) -> CompilationId {
        self.owner
    }

    /// Assigns the owner's binding of each underlying module's reference
    /// table, slot for slot. Only the first call has an effect.
    pub fn bind_references(&self, links: Vec<Vec<AssemblyLink>>) -> bool {
        self.module_links.set(links).is_ok()
    }

    /// Whether [`bind_references`](Self::bind_references) has run.
    pub fn is_bound(&self) -> bool {
        self.module_links.get().is_some()
    }

    /// Holds strong handles to the owner's assemblies this view links to.
    ///
    /// Must not include the owner's own assembly or this view. Only the
    /// first call has an effect.
    pub fn retain(&self, symbols: Vec<AssemblySymbol>) -> bool {
        self.retained.set(symbols).is_ok()
    }

    pub(crate) fn module_links(&self, ordinal: usize) -> Option<&[AssemblyLink]> {
        self.module_links
            .get()
            .and_then(|modules| modules.get(ordinal))
            .map(Vec::as_slice)
    }

    /// Number of interned retargeted symbols.
    pub fn slot_count(&self) -> usize {
        self.table.lock().slots.len()
    }

    /// Returns the handle for `symbol`, which must belong to the underlying
    /// assembly. Repeated calls with equal symbols return equal handles.
    pub fn retarget<S: Retargetable>(self: &Arc<Self>, symbol: S) -> S {
        let key = symbol.key();
        let id = {
            let mut table = self.table.lock();
            match table.index.get(&key) {
                Some(&id) => id,
                None => {
                    let id = table.slots.alloc(key.clone());
                    table.index.insert(key, id);
                    id
                }
            }
        };
        S::wrap(Retargeted {
            assembly: Arc::clone(self),
            id,
            underlying: Arc::new(symbol),
        })
    }

    /// Rewrites a type expression produced by the underlying assembly.
    pub fn translate_type(self: &Arc<Self>, ty: TypeSymbol) -> TypeSymbol {
        match ty {
            TypeSymbol::Named(named) => TypeSymbol::Named(self.translate_named(named)),
            TypeSymbol::Constructed {
                definition,
                arguments,
            } => TypeSymbol::Constructed {
                definition: self.translate_named(definition),
                arguments: arguments
                    .into_iter()
                    .map(|arg| self.translate_type(arg))
                    .collect(),
            },
            TypeSymbol::TypeParameter(param) => {
                if self.owns(&param.containing_assembly()) {
                    TypeSymbol::TypeParameter(self.retarget(param))
                } else {
                    TypeSymbol::TypeParameter(param)
                }
            }
            TypeSymbol::Array(element) => TypeSymbol::Array(Box::new(self.translate_type(*element))),
        }
    }

    /// Rewrites a named type produced by the underlying assembly.
    ///
    /// Types of the underlying assembly become retargeted handles. Types of an
    /// assembly the underlying compilation referenced are looked up again in
    /// the assembly this compilation bound in the same slot, yielding a
    /// missing type when that assembly lacks it.
    pub fn translate_named(self: &Arc<Self>, ty: NamedTypeSymbol) -> NamedTypeSymbol {
        let source = match &ty {
            NamedTypeSymbol::Missing(missing) => match missing.assembly() {
                Some(identity) if identity != self.identity() => {
                    AssemblySymbol::missing(identity.clone())
                }
                _ => return ty,
            },
            _ => ty.containing_assembly(),
        };
        if self.owns(&source) {
            return self.retarget(ty);
        }
        match self.map_assembly(&source) {
            Some(dest) if dest != source => dest.resolve_type(ty.namespace(), ty.name(), ty.arity()),
            _ => ty,
        }
    }

    fn owns(&self, assembly: &AssemblySymbol) -> bool {
        assembly
            .as_source()
            .is_some_and(|source| Arc::ptr_eq(source, &self.underlying))
    }

    fn map_assembly(&self, assembly: &AssemblySymbol) -> Option<AssemblySymbol> {
        let links = self.module_links.get()?;
        let map = self.assembly_map.get_or_init(|| {
            let mut map = HashMap::new();
            let modules = AssemblySymbol::Source(Arc::clone(&self.underlying)).modules();
            for (module, ours) in modules.iter().zip(links) {
                for (theirs, ours) in module.referenced_assemblies().into_iter().zip(ours) {
                    map.entry(theirs).or_insert_with(|| ours.clone());
                }
            }
            map
        });
        map.get(assembly).map(AssemblyLink::resolve)
    }
}

impl fmt::Debug for RetargetingAssembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetargetingAssembly")
            .field("identity", self.identity())
            .field("owner", &self.owner)
            .field("slots", &self.slot_count())
            .finish()
    }
}
