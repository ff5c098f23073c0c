//! `refgraph resolve`: bind every compilation of the manifest and report.
//!
//! 1. Locate and load `refgraph.toml`
//! 2. Resolve it into compilations in build order
//! 3. Create the compilations over one metadata cache
//! 4. Resolve each and collect a report
//! 5. Render text or JSON

use std::collections::BTreeMap;
use std::sync::Arc;

use refgraph_binder::{Compilation, ReferenceBinding, SymbolCache};
use refgraph_diagnostics::Diagnostic;
use refgraph_symbols::Symbol;
use serde::Serialize;
use tracing::info;

use crate::pipeline::{build_compilations, load_manifest};
use crate::{GlobalArgs, ReportFormat, ResolveArgs};

/// One reference's outcome.
#[derive(Debug, Serialize, PartialEq)]
pub struct ReferenceReport {
    /// Display name of the reference.
    pub reference: String,
    /// `bound`, `module`, `duplicate`, `conflicting` or `failed`.
    pub status: String,
    /// The bound identity, linked module or winning identity.
    pub detail: Option<String>,
}

/// One compilation's bound graph.
#[derive(Debug, Serialize)]
pub struct CompilationReport {
    /// Manifest name.
    pub name: String,
    /// Own assembly identity.
    pub identity: String,
    /// Chosen identity per simple name.
    pub chosen: BTreeMap<String, String>,
    /// Explicit references in order.
    pub references: Vec<ReferenceReport>,
    /// References a missing-reference resolver supplied.
    pub implicit: Vec<ReferenceReport>,
    /// Referenced compilations seen through a retargeting view.
    pub retargeted: Vec<String>,
    /// Identities no reference satisfied.
    pub missing: Vec<String>,
    /// Binding diagnostics.
    pub diagnostics: Vec<Diagnostic>,
    /// Version unification diagnostics.
    pub unifications: Vec<Diagnostic>,
}

impl CompilationReport {
    /// Resolves `compilation` and summarizes its graph.
    pub fn collect(name: &str, compilation: &Compilation) -> Self {
        let graph = compilation.bound_graph();
        let describe = |reference: &refgraph_binder::Reference, binding: &ReferenceBinding| {
            let detail = match binding {
                ReferenceBinding::Assembly(assembly) => Some(assembly.identity().to_string()),
                ReferenceBinding::Module(module) => Some(module.name().to_string()),
                ReferenceBinding::Duplicate { of } => Some(format!("of reference {of}")),
                ReferenceBinding::Conflicting { winner } => Some(winner.to_string()),
                ReferenceBinding::Failed => None,
            };
            ReferenceReport {
                reference: reference.display(),
                status: binding.status().to_string(),
                detail,
            }
        };
        CompilationReport {
            name: name.to_string(),
            identity: compilation.identity().to_string(),
            chosen: graph
                .chosen()
                .iter()
                .map(|(name, identity)| (name.clone(), identity.to_string()))
                .collect(),
            references: compilation
                .external_references()
                .iter()
                .zip(graph.bindings())
                .map(|(reference, binding)| describe(reference, binding))
                .collect(),
            implicit: graph
                .implicit_references()
                .iter()
                .map(|(reference, binding)| describe(reference, binding))
                .collect(),
            retargeted: graph.retargeted().map(|a| a.identity().to_string()).collect(),
            missing: graph.missing().iter().map(ToString::to_string).collect(),
            diagnostics: graph.diagnostics().to_vec(),
            unifications: graph.unification_diagnostics(),
        }
    }

    /// Whether any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Renders the report for a terminal.
    pub fn render_text(&self) -> String {
        let mut out = format!("{} ({})\n", self.name, self.identity);
        out.push_str("  chosen:\n");
        for (name, identity) in &self.chosen {
            out.push_str(&format!("    {name} -> {identity}\n"));
        }
        out.push_str("  references:\n");
        for (index, report) in self.references.iter().enumerate() {
            out.push_str(&format!("    [{index}] {}: {}", report.reference, report.status));
            if let Some(detail) = &report.detail {
                out.push_str(&format!(" {detail}"));
            }
            out.push('\n');
        }
        for report in &self.implicit {
            out.push_str(&format!("    [resolver] {}: {}", report.reference, report.status));
            if let Some(detail) = &report.detail {
                out.push_str(&format!(" {detail}"));
            }
            out.push('\n');
        }
        if !self.retargeted.is_empty() {
            out.push_str(&format!("  retargeted: {}\n", self.retargeted.join(", ")));
        }
        if !self.missing.is_empty() {
            out.push_str(&format!("  missing: {}\n", self.missing.join(", ")));
        }
        for diagnostic in self.diagnostics.iter().chain(&self.unifications) {
            out.push_str(&format!("  {diagnostic}\n"));
        }
        out
    }
}

/// Runs `refgraph resolve`. Returns exit code 1 when any compilation has an
/// error diagnostic.
pub fn run(args: &ResolveArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (config, base_dir) = load_manifest(global)?;
    let project = refgraph_config::resolve_project(&config, &base_dir)?;

    if let Some(wanted) = &args.compilation {
        if !project.compilations.iter().any(|c| &c.name == wanted) {
            return Err(format!("unknown compilation '{wanted}'").into());
        }
    }

    if !global.quiet && args.format == ReportFormat::Text {
        eprintln!(
            "   Resolving {} ({} compilation(s))",
            project.name,
            project.compilations.len()
        );
    }

    let cache = Arc::new(SymbolCache::new());
    let _compaction = match project.compaction_interval {
        Some(interval) => Some(cache.spawn_compaction(interval)?),
        None => None,
    };
    let compilations = build_compilations(&project.compilations, &cache)?;

    let reports: Vec<CompilationReport> = compilations
        .iter()
        .filter(|(name, _)| args.compilation.as_ref().is_none_or(|wanted| wanted == name))
        .map(|(name, compilation)| CompilationReport::collect(name, compilation))
        .collect();

    let stats = cache.stats();
    info!(
        entries = cache.len(),
        hits = stats.hits,
        loads = stats.loads,
        "metadata cache after resolution"
    );

    match args.format {
        ReportFormat::Text => {
            for report in &reports {
                print!("{}", report.render_text());
            }
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    let failed = reports.iter().filter(|r| r.has_errors()).count();
    if !global.quiet && args.format == ReportFormat::Text {
        eprintln!("   Result: {} compilation(s) with errors", failed);
    }
    Ok(if failed > 0 { 1 } else { 0 })
}
