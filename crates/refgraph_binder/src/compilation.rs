//! Compilations: immutable values pairing source units with a reference list.
//!
//! Binding happens lazily. Creating or deriving a compilation does no work;
//! the first call that needs a resolved symbol runs the reference manager
//! once and memoizes the [`BoundGraph`] for the compilation's lifetime.

use std::fmt;
use std::sync::{Arc, OnceLock};

use refgraph_common::AssemblyIdentity;
use refgraph_diagnostics::Diagnostic;
use refgraph_symbols::{
    AssemblySymbol, CompilationId, ModuleSymbol, NamedTypeSymbol, SourceAssembly, SourceUnit,
    TypeSymbol,
};
use tracing::debug;

use crate::errors;
use crate::graph::BoundGraph;
use crate::manager;
use crate::options::CompilationOptions;
use crate::reference::Reference;
use crate::use_site;

struct CompilationInner {
    id: CompilationId,
    assembly_name: String,
    units: Vec<Arc<SourceUnit>>,
    references: Vec<Reference>,
    options: CompilationOptions,
    graph: OnceLock<BoundGraph>,
}

/// A compilation: own source units, ordered references and options.
///
/// Cloning shares the compilation, including its resolution. Every
/// mutator returns a new compilation and leaves `self` untouched.
#[derive(Clone)]
pub struct Compilation(Arc<CompilationInner>);

impl Compilation {
    /// Creates a compilation. Nothing is resolved until first use.
    pub fn create<U, R>(
        assembly_name: impl Into<String>,
        units: U,
        references: R,
        options: CompilationOptions,
    ) -> Self
    where
        U: IntoIterator<Item = SourceUnit>,
        R: IntoIterator<Item = Reference>,
    {
        Self::from_parts(
            assembly_name.into(),
            units.into_iter().map(Arc::new).collect(),
            references.into_iter().collect(),
            options,
        )
    }

    fn from_parts(
        assembly_name: String,
        units: Vec<Arc<SourceUnit>>,
        references: Vec<Reference>,
        options: CompilationOptions,
    ) -> Self {
        Compilation(Arc::new(CompilationInner {
            id: CompilationId::next(),
            assembly_name,
            units,
            references,
            options,
            graph: OnceLock::new(),
        }))
    }

    fn derive(&self, units: Vec<Arc<SourceUnit>>, references: Vec<Reference>) -> Self {
        Self::from_parts(
            self.0.assembly_name.clone(),
            units,
            references,
            self.0.options.clone(),
        )
    }

    /// Process-unique id of this compilation value.
    pub fn id(&self) -> CompilationId {
        self.0.id
    }

    /// Simple name of the own assembly.
    pub fn assembly_name(&self) -> &str {
        &self.0.assembly_name
    }

    /// The own assembly's identity, from the name and the options.
    pub fn identity(&self) -> AssemblyIdentity {
        self.0.options.identity_for(&self.0.assembly_name)
    }

    /// Own source units.
    pub fn units(&self) -> &[Arc<SourceUnit>] {
        &self.0.units
    }

    /// Options the compilation was created with.
    pub fn options(&self) -> &CompilationOptions {
        &self.0.options
    }

    /// The references this compilation was created with, in input order.
    /// References supplied by a missing-reference resolver are not included.
    pub fn external_references(&self) -> &[Reference] {
        &self.0.references
    }

    /// A reference to this compilation, for use by another compilation.
    pub fn to_reference(&self) -> Reference {
        Reference::compilation(self.clone())
    }

    /// Appends `references`.
    pub fn add_references<I>(&self, references: I) -> Compilation
    where
        I: IntoIterator<Item = Reference>,
    {
        let mut list = self.0.references.clone();
        list.extend(references);
        self.derive(self.0.units.clone(), list)
    }

    /// Removes every occurrence of each of `references`.
    pub fn remove_references(&self, references: &[Reference]) -> Compilation {
        let list = self
            .0
            .references
            .iter()
            .filter(|r| !references.contains(r))
            .cloned()
            .collect();
        self.derive(self.0.units.clone(), list)
    }

    /// Drops every reference.
    pub fn remove_all_references(&self) -> Compilation {
        self.derive(self.0.units.clone(), Vec::new())
    }

    /// Replaces `old` with `new` in place. `None` when `old` is not one of
    /// the compilation's references.
    pub fn replace_reference(&self, old: &Reference, new: Reference) -> Option<Compilation> {
        let position = self.0.references.iter().position(|r| r == old)?;
        let mut list = self.0.references.clone();
        list[position] = new;
        Some(self.derive(self.0.units.clone(), list))
    }

    /// Appends source units.
    pub fn add_units<I>(&self, units: I) -> Compilation
    where
        I: IntoIterator<Item = SourceUnit>,
    {
        let mut list = self.0.units.clone();
        list.extend(units.into_iter().map(Arc::new));
        self.derive(list, self.0.references.clone())
    }

    /// Removes the units with the given names.
    pub fn remove_units(&self, names: &[&str]) -> Compilation {
        let list = self
            .0
            .units
            .iter()
            .filter(|unit| !names.contains(&unit.name.as_str()))
            .cloned()
            .collect();
        self.derive(list, self.0.references.clone())
    }

    /// The same sources and references under different options.
    pub fn with_options(&self, options: CompilationOptions) -> Compilation {
        Self::from_parts(
            self.0.assembly_name.clone(),
            self.0.units.clone(),
            self.0.references.clone(),
            options,
        )
    }

    /// The same compilation producing a differently named assembly.
    pub fn with_assembly_name(&self, name: impl Into<String>) -> Compilation {
        Self::from_parts(
            name.into(),
            self.0.units.clone(),
            self.0.references.clone(),
            self.0.options.clone(),
        )
    }

    /// Whether references have been bound yet.
    pub fn is_resolved(&self) -> bool {
        self.0.graph.get().is_some()
    }

    /// The bound reference graph, resolving on first call. Concurrent first
    /// callers block until the one resolving thread finishes.
    pub fn bound_graph(&self) -> &BoundGraph {
        self.0.graph.get_or_init(|| {
            debug!(assembly = %self.0.assembly_name, id = self.0.id.as_raw(), "binding references");
            manager::resolve(self)
        })
    }

    /// The compilation's own assembly symbol.
    pub fn assembly(&self) -> &Arc<SourceAssembly> {
        self.bound_graph().assembly()
    }

    /// The assembly a reference bound to. `None` for module references,
    /// duplicates, conflicting references, failed loads and references that
    /// are not part of this compilation.
    pub fn referenced_unit_symbol(&self, reference: &Reference) -> Option<AssemblySymbol> {
        let graph = self.bound_graph();
        self.0
            .references
            .iter()
            .zip(graph.bindings())
            .chain(graph.implicit_references().iter().map(|(r, b)| (r, b)))
            .filter(|(r, _)| *r == reference)
            .find_map(|(_, binding)| binding.assembly().cloned())
    }

    /// The linked module a module reference bound to.
    pub fn referenced_subunit_symbol(&self, reference: &Reference) -> Option<ModuleSymbol> {
        self.0
            .references
            .iter()
            .zip(self.bound_graph().bindings())
            .filter(|(r, _)| *r == reference)
            .find_map(|(_, binding)| binding.module().cloned())
    }

    /// The reference an assembly symbol was bound from.
    pub fn reference_for(&self, assembly: &AssemblySymbol) -> Option<Reference> {
        let graph = self.bound_graph();
        self.0
            .references
            .iter()
            .zip(graph.bindings())
            .chain(graph.implicit_references().iter().map(|(r, b)| (r, b)))
            .find(|(_, binding)| binding.assembly() == Some(assembly))
            .map(|(reference, _)| reference.clone())
    }

    /// Every assembly the compilation bound, including missing ones.
    pub fn referenced_assemblies(&self) -> &[AssemblySymbol] {
        self.bound_graph().assemblies()
    }

    /// Diagnostics produced while binding references.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.bound_graph().diagnostics()
    }

    /// Diagnostics for references bound to a different version than requested.
    pub fn unification_diagnostics(&self) -> Vec<Diagnostic> {
        self.bound_graph().unification_diagnostics()
    }

    /// Looks a type up in the own assembly, then in bound assemblies in
    /// reference order.
    pub fn find_type(&self, namespace: &str, name: &str, arity: u16) -> Option<NamedTypeSymbol> {
        let own = AssemblySymbol::Source(Arc::clone(self.assembly()));
        std::iter::once(&own)
            .chain(self.referenced_assemblies())
            .find_map(|assembly| assembly.find_type(namespace, name, arity))
    }

    /// A type the compiler depends on by name.
    pub fn well_known_type(&self, namespace: &str, name: &str) -> Result<NamedTypeSymbol, Diagnostic> {
        self.find_type(namespace, name, 0).ok_or_else(|| {
            let full = if namespace.is_empty() {
                name.to_string()
            } else {
                format!("{namespace}.{name}")
            };
            errors::error_missing_predefined_type(&full)
        })
    }

    /// The error a use of `ty` reports, if `ty` mentions a missing type.
    pub fn use_site_diagnostic(&self, ty: &TypeSymbol) -> Option<Diagnostic> {
        use_site::diagnose(self.bound_graph(), ty)
    }
}

impl PartialEq for Compilation {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Compilation {}

impl fmt::Debug for Compilation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compilation")
            .field("id", &self.0.id)
            .field("assembly_name", &self.0.assembly_name)
            .field("units", &self.0.units.len())
            .field("references", &self.0.references)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
