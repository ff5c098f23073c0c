//! Diagnostics for uses of types that could not be resolved.

use std::sync::Arc;

use refgraph_diagnostics::Diagnostic;
use refgraph_symbols::{AssemblySymbol, Symbol, TypeSymbol};

use crate::errors;
use crate::graph::BoundGraph;

/// Reports the first missing type `ty` mentions.
///
/// A type whose expected assembly is not bound in `graph`, or bound as a
/// missing assembly, reports the unresolved assembly. A type absent from an
/// assembly that is present reports the type itself.
pub(crate) fn diagnose(graph: &BoundGraph, ty: &TypeSymbol) -> Option<Diagnostic> {
    let missing = ty.first_missing()?;
    let use_site = ty.to_string();
    let Some(identity) = missing.assembly() else {
        return Some(errors::error_missing_type(&missing.full_name(), None, &use_site));
    };
    let present = graph
        .assemblies()
        .iter()
        .chain(std::iter::once(&AssemblySymbol::Source(Arc::clone(graph.assembly()))))
        .any(|assembly| !assembly.is_missing() && assembly.identity() == identity);
    if present {
        Some(errors::error_missing_type(&missing.full_name(), Some(identity), &use_site))
    } else {
        Some(errors::error_unresolved_assembly(identity, &use_site))
    }
}
