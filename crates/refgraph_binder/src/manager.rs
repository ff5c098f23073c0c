//! The reference manager: turns a compilation's reference list into a bound
//! assembly graph.
//!
//! One pass runs in four steps:
//!
//! 1. load every reference and collapse duplicates into definitions
//!    ([`definitions`](crate::definitions));
//! 2. choose one identity per simple name: direct references beat names
//!    only known through a referenced compilation, and conflicting direct
//!    references are reported while the highest version is kept;
//! 3. map every reference-table entry of every bound unit to a target;
//! 4. materialize symbols: native wrappers through the cache, referenced
//!    compilations either as-is or through a retargeting view, one missing
//!    assembly per unresolved identity; then assign every table's links.
//!
//! Whether a referenced compilation can be used as-is and which cached
//! native wrappers can be shared depend on each other, so step 4 iterates
//! until neither changes.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use refgraph_common::{AssemblyIdentity, ContentHasher, ContentKey, IdentityMatch};
use refgraph_diagnostics::DiagnosticSink;
use refgraph_metadata::{MetadataImage, WrapperContext};
use refgraph_symbols::{AssemblyLink, AssemblySymbol, NativeAssembly, SourceAssembly};
use tracing::{debug, info, trace};

use crate::compilation::Compilation;
use crate::definitions::{self, Definitions, Loaded, Status};
use crate::errors;
use crate::graph::{BoundGraph, ReferenceBinding, Unification};
use crate::reference::Reference;

/// Resolves `compilation`, consulting its missing-reference resolver until
/// it has nothing more to offer.
pub(crate) fn resolve(compilation: &Compilation) -> BoundGraph {
    let explicit = compilation.external_references().len();
    let mut references = compilation.external_references().to_vec();
    let mut offered: HashSet<AssemblyIdentity> = HashSet::new();
    loop {
        let plan = Plan::build(compilation, &references, explicit);
        let Some(resolver) = compilation.options().resolver() else {
            return plan.materialize();
        };
        let mut added = false;
        for (requesting, requested) in plan.unresolved() {
            if !offered.insert(requested.clone()) {
                continue;
            }
            match resolver.resolve_missing(&requesting, &requested) {
                Some(reference) => {
                    debug!(%requested, %requesting, reference = %reference.display(), "resolver supplied reference");
                    references.push(reference);
                    added = true;
                }
                None => debug!(%requested, "resolver has no reference"),
            }
        }
        if !added {
            return plan.materialize();
        }
    }
}

/// Where one reference-table entry points.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Target {
    /// The compilation's own assembly.
    Own,
    /// Nothing supplied satisfies the identity.
    Missing(AssemblyIdentity),
    /// A bound definition.
    Definition(usize),
}

struct Plan<'a> {
    compilation: &'a Compilation,
    own: AssemblyIdentity,
    own_key: String,
    references: Vec<Reference>,
    explicit: usize,
    defs: Definitions,
    direct: BTreeMap<String, usize>,
    chosen: BTreeMap<String, AssemblyIdentity>,
    tables: Vec<Vec<Vec<Target>>>,
    module_tables: Vec<Vec<Target>>,
    unifications: BTreeSet<Unification>,
    sink: DiagnosticSink,
}

impl<'a> Plan<'a> {
    fn build(compilation: &'a Compilation, references: &[Reference], explicit: usize) -> Self {
        let sink = DiagnosticSink::new();
        let own = compilation.identity();
        let loaded =
            definitions::load_all(references, explicit, compilation.options().cache(), &sink);
        let defs = definitions::collect(
            references,
            loaded,
            explicit,
            &SourceAssembly::module_name_for(&own),
            &sink,
        );
        let mut plan = Plan {
            compilation,
            own_key: own.simple_name_key(),
            own,
            references: references.to_vec(),
            explicit,
            defs,
            direct: BTreeMap::new(),
            chosen: BTreeMap::new(),
            tables: Vec::new(),
            module_tables: Vec::new(),
            unifications: BTreeSet::new(),
            sink,
        };
        plan.choose();
        plan.map_tables();
        plan
    }

    fn is_bound(&self, d: usize) -> bool {
        let reference = self.defs.definitions[d].reference;
        self.defs.statuses[reference] == Status::Definition(d)
    }

    fn choose(&mut self) {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (d, def) in self.defs.definitions.iter().enumerate() {
            groups.entry(def.identity.simple_name_key()).or_default().push(d);
        }

        for (name, members) in groups {
            let winner = if name == self.own_key {
                None
            } else {
                members.iter().copied().max_by(|&a, &b| {
                    let (a, b) = (&self.defs.definitions[a].identity, &self.defs.definitions[b].identity);
                    a.version().cmp(&b.version()).then_with(|| a.cmp(b))
                })
            };
            let winning = match winner {
                Some(w) => self.defs.definitions[w].identity.clone(),
                None => self.own.clone(),
            };
            for &d in members.iter().filter(|&&d| Some(d) != winner) {
                let def = &self.defs.definitions[d];
                debug!(rejected = %def.identity, chosen = %winning, "conflicting identities");
                self.sink.emit(errors::error_conflicting_identity(
                    &def.identity,
                    &winning,
                    definitions::location(def.reference, self.explicit),
                ));
                self.defs.statuses[def.reference] = Status::Conflicting(winning.clone());
            }
            if let Some(w) = winner {
                self.direct.insert(name.clone(), w);
                self.chosen.insert(name, winning);
            }
        }
        self.chosen.insert(self.own_key.clone(), self.own.clone());

        for (d, def) in self.defs.definitions.iter().enumerate() {
            if let Loaded::Compilation(compilation) = &def.loaded {
                if !self.is_bound(d) {
                    continue;
                }
                for (name, identity) in compilation.bound_graph().chosen() {
                    self.chosen
                        .entry(name.clone())
                        .or_insert_with(|| identity.clone());
                }
            }
        }
    }

    fn target_of(
        &self,
        requesting: &AssemblyIdentity,
        requested: &AssemblyIdentity,
        unifications: &mut BTreeSet<Unification>,
    ) -> Target {
        let name = requested.simple_name_key();
        let (bound, target) = if name == self.own_key {
            (&self.own, Target::Own)
        } else if let Some(&d) = self.direct.get(&name) {
            (&self.defs.definitions[d].identity, Target::Definition(d))
        } else {
            let identity = self.chosen.get(&name).unwrap_or(requested);
            return Target::Missing(identity.clone());
        };
        match requested.match_definition(bound) {
            IdentityMatch::Equivalent => target,
            IdentityMatch::NotEquivalent => Target::Missing(requested.clone()),
            IdentityMatch::UnifiedToHigher | IdentityMatch::UnifiedToLower => {
                unifications.insert(Unification {
                    referencing: requesting.clone(),
                    requested: requested.clone(),
                    bound: bound.clone(),
                });
                target
            }
        }
    }

    fn map_tables(&mut self) {
        let mut unifications = BTreeSet::new();
        let mut tables = Vec::with_capacity(self.defs.definitions.len());
        for (d, def) in self.defs.definitions.iter().enumerate() {
            if !self.is_bound(d) {
                tables.push(Vec::new());
                continue;
            }
            let requested: Vec<Vec<AssemblyIdentity>> = match &def.loaded {
                Loaded::Image { image, .. } => image
                    .modules()
                    .iter()
                    .map(|module| module.referenced_assemblies.clone())
                    .collect(),
                Loaded::Compilation(compilation) => {
                    AssemblySymbol::Source(Arc::clone(compilation.bound_graph().assembly()))
                        .modules()
                        .iter()
                        .map(|module| module.referenced_assembly_identities())
                        .collect()
                }
            };
            tables.push(
                requested
                    .iter()
                    .map(|table| {
                        table
                            .iter()
                            .map(|r| self.target_of(&def.identity, r, &mut unifications))
                            .collect()
                    })
                    .collect(),
            );
        }
        let module_tables = self
            .defs
            .modules
            .iter()
            .map(|image| {
                image.modules()[0]
                    .referenced_assemblies
                    .iter()
                    .map(|r| self.target_of(&self.own, r, &mut unifications))
                    .collect()
            })
            .collect();
        self.tables = tables;
        self.module_tables = module_tables;
        self.unifications = unifications;
    }

    /// `(requesting unit, missing identity)` pairs in binding order.
    fn unresolved(&self) -> Vec<(AssemblyIdentity, AssemblyIdentity)> {
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        let owners = self
            .defs
            .definitions
            .iter()
            .zip(&self.tables)
            .flat_map(|(def, tables)| tables.iter().map(move |table| (&def.identity, table)))
            .chain(self.module_tables.iter().map(|table| (&self.own, table)));
        for (requesting, table) in owners {
            for target in table {
                if let Target::Missing(identity) = target {
                    if seen.insert(identity.clone()) {
                        pairs.push((requesting.clone(), identity.clone()));
                    }
                }
            }
        }
        pairs
    }

    fn image_of(&self, d: usize) -> Option<(&ContentKey, &Arc<MetadataImage>)> {
        match &self.defs.definitions[d].loaded {
            Loaded::Image { key, image } => Some((key, image)),
            Loaded::Compilation(_) => None,
        }
    }

    /// Fingerprint of everything a native wrapper for image definition `d`
    /// would be bound to: the reference tables of every image reachable from
    /// it, resolved to targets.
    fn context(&self, d: usize, reuse: &[bool], salts: &[u64]) -> WrapperContext {
        let mut seen = HashSet::new();
        let mut stack = vec![d];
        let mut members = Vec::new();
        while let Some(e) = stack.pop() {
            if !seen.insert(e) {
                continue;
            }
            let Some((key, _)) = self.image_of(e) else { continue };
            members.push((key, e));
            for target in self.tables[e].iter().flatten() {
                if let Target::Definition(f) = target {
                    stack.push(*f);
                }
            }
        }
        members.sort();

        let mut hasher = ContentHasher::new();
        hasher.write_u8(self.compilation.options().import().tag());
        hasher.write_u64(salts[d]);
        for (key, e) in members {
            write_key(&mut hasher, key);
            hasher.write_u64(salts[e]);
            for table in &self.tables[e] {
                hasher.write_u64(table.len() as u64);
                for target in table {
                    self.describe(target, reuse, &mut hasher);
                }
            }
        }
        WrapperContext::new(hasher.finish())
    }

    fn describe(&self, target: &Target, reuse: &[bool], hasher: &mut ContentHasher) {
        match target {
            Target::Own => {
                hasher.write_u8(0);
                hasher.write_u64(self.compilation.id().as_raw().into());
            }
            Target::Missing(identity) => {
                hasher.write_u8(1);
                hasher.write_str(&identity.to_string());
            }
            Target::Definition(f) => match &self.defs.definitions[*f].loaded {
                Loaded::Image { key, .. } => {
                    hasher.write_u8(2);
                    write_key(hasher, key);
                }
                Loaded::Compilation(compilation) if reuse[*f] => {
                    hasher.write_u8(3);
                    hasher.write_u64(compilation.id().as_raw().into());
                }
                Loaded::Compilation(compilation) => {
                    hasher.write_u8(4);
                    hasher.write_u64(compilation.id().as_raw().into());
                    hasher.write_u64(self.compilation.id().as_raw().into());
                }
            },
        }
    }

    /// The symbol a target binds to, when it is already known. Targets that
    /// would bind to a not yet created retargeting view yield `None`.
    fn expected(
        &self,
        target: &Target,
        own: &Arc<SourceAssembly>,
        natives: &[Option<Arc<NativeAssembly>>],
        reuse: &[bool],
    ) -> Option<AssemblySymbol> {
        match target {
            Target::Own => Some(AssemblySymbol::Source(Arc::clone(own))),
            Target::Missing(identity) => Some(AssemblySymbol::missing(identity.clone())),
            Target::Definition(e) => match &self.defs.definitions[*e].loaded {
                Loaded::Image { .. } => natives[*e].clone().map(AssemblySymbol::Native),
                Loaded::Compilation(compilation) if reuse[*e] => Some(AssemblySymbol::Source(
                    Arc::clone(compilation.bound_graph().assembly()),
                )),
                Loaded::Compilation(_) => None,
            },
        }
    }

    fn links_match(
        &self,
        d: usize,
        actual: &[Vec<AssemblySymbol>],
        own: &Arc<SourceAssembly>,
        natives: &[Option<Arc<NativeAssembly>>],
        reuse: &[bool],
    ) -> bool {
        self.tables[d].len() == actual.len()
            && self.tables[d].iter().zip(actual).all(|(targets, symbols)| {
                targets.len() == symbols.len()
                    && targets.iter().zip(symbols).all(|(target, symbol)| {
                        self.expected(target, own, natives, reuse).as_ref() == Some(symbol)
                    })
            })
    }

    /// Picks native wrappers and decides which referenced compilations are
    /// used as-is, iterating until both are stable.
    fn settle(&self, own: &Arc<SourceAssembly>) -> (Vec<Option<Arc<NativeAssembly>>>, Vec<bool>) {
        let count = self.defs.definitions.len();
        let cache = self.compilation.options().cache();
        let import = self.compilation.options().import();
        let mut reuse: Vec<bool> = (0..count).map(|d| self.image_of(d).is_none()).collect();
        let mut salts = vec![0u64; count];
        let underlying: Vec<Vec<Vec<AssemblySymbol>>> = self
            .defs
            .definitions
            .iter()
            .map(|def| match &def.loaded {
                Loaded::Compilation(compilation) => {
                    AssemblySymbol::Source(Arc::clone(compilation.bound_graph().assembly()))
                        .modules()
                        .iter()
                        .map(|module| module.referenced_assemblies())
                        .collect()
                }
                Loaded::Image { .. } => Vec::new(),
            })
            .collect();

        loop {
            let natives: Vec<Option<Arc<NativeAssembly>>> = (0..count)
                .map(|d| {
                    let (key, image) = self.image_of(d)?;
                    if !self.is_bound(d) {
                        return None;
                    }
                    let context = self.context(d, &reuse, &salts);
                    Some(cache.get_or_wrap(key, context, || {
                        NativeAssembly::new(key.clone(), context, Arc::clone(image), import)
                    }))
                })
                .collect();

            let mut changed = false;
            for d in 0..count {
                let Some(native) = &natives[d] else { continue };
                if !native.is_bound() {
                    continue;
                }
                let actual: Vec<Vec<AssemblySymbol>> = AssemblySymbol::Native(Arc::clone(native))
                    .modules()
                    .iter()
                    .map(|module| module.referenced_assemblies())
                    .collect();
                if !self.links_match(d, &actual, own, &natives, &reuse) {
                    debug!(key = %native.key(), "cached wrapper is stale, using a fresh one");
                    salts[d] += 1;
                    changed = true;
                }
            }
            for d in 0..count {
                if !reuse[d] || !self.is_bound(d) || self.image_of(d).is_some() {
                    continue;
                }
                if !self.links_match(d, &underlying[d], own, &natives, &reuse) {
                    debug!(
                        assembly = %self.defs.definitions[d].identity,
                        "referenced compilation bound different dependencies, retargeting"
                    );
                    reuse[d] = false;
                    changed = true;
                }
            }
            if !changed {
                return (natives, reuse);
            }
        }
    }

    fn materialize(self) -> BoundGraph {
        let compilation = self.compilation;
        let own = Arc::new(SourceAssembly::new(
            compilation.id(),
            self.own.clone(),
            compilation.units().to_vec(),
            self.defs.modules.clone(),
        ));
        let (natives, reuse) = self.settle(&own);

        let symbols: Vec<Option<AssemblySymbol>> = self
            .defs
            .definitions
            .iter()
            .enumerate()
            .map(|(d, def)| {
                if !self.is_bound(d) {
                    return None;
                }
                match &def.loaded {
                    Loaded::Image { .. } => natives[d].clone().map(AssemblySymbol::Native),
                    Loaded::Compilation(referenced) => {
                        let source = Arc::clone(referenced.bound_graph().assembly());
                        if reuse[d] {
                            Some(AssemblySymbol::Source(source))
                        } else {
                            Some(AssemblySymbol::Retargeting(source.retargeting_for(compilation.id())))
                        }
                    }
                }
            })
            .collect();

        let mut missing: BTreeMap<AssemblyIdentity, AssemblySymbol> = BTreeMap::new();
        let mut link = |target: &Target| -> AssemblyLink {
            let symbol = match target {
                Target::Own => AssemblySymbol::Source(Arc::clone(&own)),
                Target::Missing(identity) => missing
                    .entry(identity.clone())
                    .or_insert_with(|| AssemblySymbol::missing(identity.clone()))
                    .clone(),
                Target::Definition(e) => symbols[*e]
                    .clone()
                    .unwrap_or_else(|| AssemblySymbol::missing(self.defs.definitions[*e].identity.clone())),
            };
            AssemblyLink::to(&symbol)
        };

        for (d, symbol) in symbols.iter().enumerate() {
            let Some(symbol) = symbol else { continue };
            let links: Vec<Vec<AssemblyLink>> = self.tables[d]
                .iter()
                .map(|table| table.iter().map(&mut link).collect())
                .collect();
            let assigned = match symbol {
                AssemblySymbol::Native(native) => native.bind_references(links),
                AssemblySymbol::Retargeting(retargeting) => {
                    let own_symbol = AssemblySymbol::Source(Arc::clone(&own));
                    let mut targets: Vec<AssemblySymbol> = links
                        .iter()
                        .flatten()
                        .map(AssemblyLink::resolve)
                        .filter(|target| target != &own_symbol && target != symbol)
                        .collect();
                    targets.dedup();
                    retargeting.retain(targets);
                    retargeting.bind_references(links)
                }
                _ => true,
            };
            if !assigned {
                trace!(
                    assembly = %symbol.identity(),
                    "reference tables already assigned by another compilation"
                );
            }
        }
        let added: Vec<Vec<AssemblyLink>> = self
            .module_tables
            .iter()
            .map(|table| table.iter().map(&mut link).collect())
            .collect();
        let manifest: Vec<AssemblyLink> = symbols.iter().flatten().map(AssemblyLink::to).collect();
        own.bind_references(manifest, added);

        let own_modules = AssemblySymbol::Source(Arc::clone(&own)).modules();
        let mut bindings: Vec<ReferenceBinding> = self
            .defs
            .statuses
            .iter()
            .map(|status| match status {
                Status::Definition(d) => symbols[*d]
                    .clone()
                    .map(ReferenceBinding::Assembly)
                    .unwrap_or(ReferenceBinding::Failed),
                Status::Module(ordinal) => own_modules
                    .get(*ordinal as usize)
                    .cloned()
                    .map(ReferenceBinding::Module)
                    .unwrap_or(ReferenceBinding::Failed),
                Status::Duplicate(of) => ReferenceBinding::Duplicate {
                    of: self.bound_occurrence(*of),
                },
                Status::Conflicting(winner) => ReferenceBinding::Conflicting {
                    winner: winner.clone(),
                },
                Status::Failed => ReferenceBinding::Failed,
            })
            .collect();
        let implicit: Vec<(Reference, ReferenceBinding)> = self.references[self.explicit..]
            .iter()
            .cloned()
            .zip(bindings.split_off(self.explicit))
            .collect();

        let mut assemblies: Vec<AssemblySymbol> = symbols.into_iter().flatten().collect();
        let missing_identities: Vec<AssemblyIdentity> = missing.keys().cloned().collect();
        assemblies.extend(missing.into_values());
        own.retain(assemblies.clone());

        let diagnostics = self.sink.sorted();
        info!(
            assembly = %self.own,
            references = self.explicit,
            implicit = implicit.len(),
            bound = assemblies.len() - missing_identities.len(),
            retargeted = reuse.iter().enumerate().filter(|&(d, r)| !r && self.is_bound(d) && self.image_of(d).is_none()).count(),
            missing = missing_identities.len(),
            errors = diagnostics.iter().filter(|d| d.is_error()).count(),
            "resolved references"
        );

        let mut aliases = self.defs.aliases;
        aliases.truncate(self.explicit);
        BoundGraph {
            assembly: own,
            bindings,
            aliases,
            implicit,
            assemblies,
            chosen: self.chosen,
            missing: missing_identities,
            unifications: self.unifications.into_iter().collect(),
            diagnostics,
        }
    }

    fn bound_occurrence(&self, mut index: usize) -> usize {
        while let Status::Duplicate(next) = &self.defs.statuses[index] {
            index = *next;
        }
        index
    }
}

fn write_key(hasher: &mut ContentHasher, key: &ContentKey) {
    hasher.write_str(&key.path().to_string_lossy());
    hasher.write_u64(key.tag());
}
