//! A compilation's own assembly.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use refgraph_common::AssemblyIdentity;
use refgraph_metadata::{MetadataImage, TypeDef};
use tracing::debug;

use crate::assembly::{AssemblyLink, AssemblySymbol};
use crate::ids::CompilationId;
use crate::native::{build_type_index, ModuleData, TypeKey};
use crate::retargeting::RetargetingAssembly;
use crate::source::SourceUnit;

/// The assembly a compilation is building from its own source.
///
/// Its manifest module holds the declared types; modules supplied as
/// standalone references follow it in reference order and are owned by this
/// assembly, so the same module image added to two compilations yields two
/// distinct module symbols over one shared image.
///
/// The assembly also keeps a weak registry of the retargeting wrappers other
/// compilations have built over it, at most one per referencing compilation.
///
/// Links out of the assembly are weak; the assemblies its compilation bound
/// are kept alive through [`retain`](Self::retain) instead, so symbols handed
/// out by a compilation stay resolvable after the compilation is dropped.
pub struct SourceAssembly {
    compilation: CompilationId,
    identity: AssemblyIdentity,
    module_name: String,
    units: Vec<Arc<SourceUnit>>,
    types: Vec<(u32, u32)>,
    type_index: HashMap<TypeKey, u32>,
    references: OnceLock<Vec<AssemblyLink>>,
    retained: OnceLock<Vec<AssemblySymbol>>,
    added_modules: Vec<ModuleData>,
    retargetings: Mutex<Vec<(CompilationId, Weak<RetargetingAssembly>)>>,
}

impl SourceAssembly {
    /// Creates the assembly for `compilation` from its units and linked module images.
    pub fn new(
        compilation: CompilationId,
        identity: AssemblyIdentity,
        units: Vec<Arc<SourceUnit>>,
        added_modules: Vec<Arc<MetadataImage>>,
    ) -> Self {
        let types: Vec<(u32, u32)> = units
            .iter()
            .enumerate()
            .flat_map(|(u, unit)| (0..unit.types.len()).map(move |t| (u as u32, t as u32)))
            .collect();
        let type_index = build_type_index(
            types
                .iter()
                .map(|&(u, t)| &units[u as usize].types[t as usize]),
        );
        Self {
            compilation,
            module_name: Self::module_name_for(&identity),
            identity,
            units,
            types,
            type_index,
            references: OnceLock::new(),
            retained: OnceLock::new(),
            added_modules: added_modules
                .into_iter()
                .map(|image| ModuleData::new(image, 0))
                .collect(),
            retargetings: Mutex::new(Vec::new()),
        }
    }

    /// The compilation this assembly belongs to.
    pub fn compilation(&self) -> CompilationId {
        self.compilation
    }

    /// The assembly's identity.
    pub fn identity(&self) -> &AssemblyIdentity {
        &self.identity
    }

    /// Manifest module name of an assembly with `identity`.
    pub fn module_name_for(identity: &AssemblyIdentity) -> String {
        format!("{}.dll", identity.name())
    }

    /// Name of the manifest module.
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// The syntax units the assembly was built from.
    pub fn units(&self) -> &[Arc<SourceUnit>] {
        &self.units
    }

    /// Number of declared types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of linked modules after the manifest.
    pub fn added_module_count(&self) -> usize {
        self.added_modules.len()
    }

    /// Assigns the manifest module's references and each linked module's
    /// reference table. Only the first call has any effect; returns whether
    /// this call was it.
    pub fn bind_references(&self, manifest: Vec<AssemblyLink>, added: Vec<Vec<AssemblyLink>>) -> bool {
        if self.references.set(manifest).is_err() {
            return false;
        }
        for (module, table) in self.added_modules.iter().zip(added) {
            module.bind(table);
        }
        true
    }

    /// Whether [`bind_references`](Self::bind_references) has run.
    pub fn is_bound(&self) -> bool {
        self.references.get().is_some()
    }

    /// Holds strong handles to every assembly the compilation bound.
    ///
    /// None of them may own this assembly. Only the first call has an
    /// effect; returns whether this call was it.
    pub fn retain(&self, symbols: Vec<AssemblySymbol>) -> bool {
        self.retained.set(symbols).is_ok()
    }

    /// Number of assemblies kept alive by [`retain`](Self::retain).
    pub fn retained_count(&self) -> usize {
        self.retained.get().map_or(0, Vec::len)
    }

    /// Returns the retargeting wrapper that presents this assembly inside
    /// compilation `owner`, creating it on first request.
    pub fn retargeting_for(self: &Arc<Self>, owner: CompilationId) -> Arc<RetargetingAssembly> {
        let mut registry = self.retargetings.lock();
        registry.retain(|(_, weak)| weak.strong_count() > 0);
        if let Some(existing) = registry
            .iter()
            .filter(|(id, _)| *id == owner)
            .find_map(|(_, weak)| weak.upgrade())
        {
            return existing;
        }
        let created = Arc::new(RetargetingAssembly::new(owner, Arc::clone(self)));
        registry.push((owner, Arc::downgrade(&created)));
        debug!(assembly = %self.identity, ?owner, "created retargeting assembly");
        created
    }

    /// Number of live retargeting wrappers over this assembly.
    pub fn live_retargetings(&self) -> usize {
        self.retargetings
            .lock()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    pub(crate) fn type_def(&self, index: u32) -> &TypeDef {
        let (unit, ty) = self.types[index as usize];
        &self.units[unit as usize].types[ty as usize]
    }

    pub(crate) fn find(&self, namespace: &str, name: &str, arity: u16) -> Option<u32> {
        self.type_index
            .get(&(namespace.to_string(), name.to_string(), arity))
            .copied()
    }

    pub(crate) fn manifest_links(&self) -> Option<&[AssemblyLink]> {
        self.references.get().map(Vec::as_slice)
    }

    pub(crate) fn added_module(&self, index: usize) -> &ModuleData {
        &self.added_modules[index]
    }
}

impl fmt::Debug for SourceAssembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceAssembly")
            .field("identity", &self.identity)
            .field("compilation", &self.compilation)
            .field("types", &self.types.len())
            .field("added_modules", &self.added_modules.len())
            .finish()
    }
}
