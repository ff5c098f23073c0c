//! The result of binding one compilation's references.

use std::collections::BTreeMap;
use std::sync::Arc;

use refgraph_common::AssemblyIdentity;
use refgraph_diagnostics::Diagnostic;
use refgraph_symbols::{AssemblySymbol, ModuleSymbol, SourceAssembly};

use crate::errors;

/// How one reference was bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceBinding {
    /// Bound to an assembly symbol.
    Assembly(AssemblySymbol),
    /// Linked as a module of the compilation's own assembly.
    Module(ModuleSymbol),
    /// Another reference to the same definition was bound instead.
    Duplicate {
        /// Index of the bound reference.
        of: usize,
    },
    /// Another identity won the reference's simple name.
    Conflicting {
        /// The identity that was chosen.
        winner: AssemblyIdentity,
    },
    /// The content could not be read.
    Failed,
}

impl ReferenceBinding {
    /// The bound assembly, if any.
    pub fn assembly(&self) -> Option<&AssemblySymbol> {
        match self {
            ReferenceBinding::Assembly(assembly) => Some(assembly),
            _ => None,
        }
    }

    /// The linked module, if any.
    pub fn module(&self) -> Option<&ModuleSymbol> {
        match self {
            ReferenceBinding::Module(module) => Some(module),
            _ => None,
        }
    }

    /// A one-word status for reports.
    pub fn status(&self) -> &'static str {
        match self {
            ReferenceBinding::Assembly(_) => "bound",
            ReferenceBinding::Module(_) => "module",
            ReferenceBinding::Duplicate { .. } => "duplicate",
            ReferenceBinding::Conflicting { .. } => "conflicting",
            ReferenceBinding::Failed => "failed",
        }
    }
}

/// A reference-table entry of a bound unit satisfied by a different version.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Unification {
    /// The unit whose table holds the entry.
    pub referencing: AssemblyIdentity,
    /// The identity the table asked for.
    pub requested: AssemblyIdentity,
    /// The identity bound in its place.
    pub bound: AssemblyIdentity,
}

impl Unification {
    /// The warning or error this unification implies.
    pub fn diagnostic(&self) -> Diagnostic {
        if self.bound.version() >= self.requested.version() {
            errors::warn_unified_to_higher(&self.referencing, &self.requested, &self.bound)
        } else {
            errors::error_higher_version_referenced(&self.referencing, &self.requested, &self.bound)
        }
    }
}

/// Everything the reference manager computed for one compilation.
///
/// The graph holds every assembly symbol it bound strongly; links between
/// assemblies are weak, so the graph is what keeps the bound network alive.
pub struct BoundGraph {
    pub(crate) assembly: Arc<SourceAssembly>,
    pub(crate) bindings: Vec<ReferenceBinding>,
    pub(crate) aliases: Vec<Vec<String>>,
    pub(crate) implicit: Vec<(crate::Reference, ReferenceBinding)>,
    pub(crate) assemblies: Vec<AssemblySymbol>,
    pub(crate) chosen: BTreeMap<String, AssemblyIdentity>,
    pub(crate) missing: Vec<AssemblyIdentity>,
    pub(crate) unifications: Vec<Unification>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl BoundGraph {
    /// The compilation's own assembly.
    pub fn assembly(&self) -> &Arc<SourceAssembly> {
        &self.assembly
    }

    /// Binding of each explicit reference, in reference order.
    pub fn bindings(&self) -> &[ReferenceBinding] {
        &self.bindings
    }

    /// Aliases in effect for the explicit reference at `index`, merged from
    /// its duplicates when it is the bound one.
    pub fn aliases(&self, index: usize) -> &[String] {
        self.aliases.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// References supplied by the missing-reference resolver, with their bindings.
    pub fn implicit_references(&self) -> &[(crate::Reference, ReferenceBinding)] {
        &self.implicit
    }

    /// Every assembly symbol the compilation bound, in binding order:
    /// explicit references, implicit ones, then missing assemblies.
    pub fn assemblies(&self) -> &[AssemblySymbol] {
        &self.assemblies
    }

    /// Assemblies presented through a retargeting view.
    pub fn retargeted(&self) -> impl Iterator<Item = &AssemblySymbol> {
        self.assemblies
            .iter()
            .filter(|assembly| assembly.as_retargeting().is_some())
    }

    /// The identity chosen for each simple name (lowercase), including the
    /// compilation's own name and names only known transitively.
    pub fn chosen(&self) -> &BTreeMap<String, AssemblyIdentity> {
        &self.chosen
    }

    /// The chosen identity for a simple name.
    pub fn chosen_identity(&self, name: &str) -> Option<&AssemblyIdentity> {
        self.chosen.get(&name.to_lowercase())
    }

    /// Identities some bound unit needs that nothing supplied.
    pub fn missing(&self) -> &[AssemblyIdentity] {
        &self.missing
    }

    /// Whether an identity was left unresolved.
    pub fn is_missing(&self, identity: &AssemblyIdentity) -> bool {
        self.missing.contains(identity)
    }

    /// Version unifications performed while binding reference tables.
    pub fn unifications(&self) -> &[Unification] {
        &self.unifications
    }

    /// Diagnostics for every recorded unification.
    pub fn unification_diagnostics(&self) -> Vec<Diagnostic> {
        self.unifications.iter().map(Unification::diagnostic).collect()
    }

    /// Diagnostics reported while binding, ordered by reference.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether binding reported any error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}
