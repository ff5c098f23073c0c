//! Named types and type expressions.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use refgraph_common::{AssemblyIdentity, Version};
use refgraph_metadata::{Accessibility, GenericOwner, TypeDef, TypeRef, TypeScope};

use crate::assembly::{AssemblySymbol, MissingAssembly};
use crate::members::{
    DefinedField, DefinedMethod, DefinedTypeParameter, FieldSymbol, MethodSymbol,
    TypeParameterOwner, TypeParameterSymbol,
};
use crate::module::ModuleSymbol;
use crate::native::NativeModule;
use crate::retargeting::Retargeted;
use crate::source_assembly::SourceAssembly;
use crate::symbol::{ImportOptions, Symbol, SymbolKind, SymbolOrigin};

/// A type definition read from an image module.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NativeType {
    module: NativeModule,
    index: u32,
}

impl NativeType {
    pub(crate) fn new(module: NativeModule, index: u32) -> Self {
        Self { module, index }
    }

    /// The defining module.
    pub fn module(&self) -> &NativeModule {
        &self.module
    }

    fn def(&self) -> &TypeDef {
        &self.module.definition().types[self.index as usize]
    }
}

/// A type declared in a compilation's own source.
#[derive(Clone)]
pub struct SourceType {
    assembly: Arc<SourceAssembly>,
    index: u32,
}

impl SourceType {
    pub(crate) fn new(assembly: Arc<SourceAssembly>, index: u32) -> Self {
        Self { assembly, index }
    }

    /// The declaring assembly.
    pub fn assembly(&self) -> &Arc<SourceAssembly> {
        &self.assembly
    }

    fn def(&self) -> &TypeDef {
        self.assembly.type_def(self.index)
    }
}

impl PartialEq for SourceType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.assembly, &other.assembly) && self.index == other.index
    }
}

impl Eq for SourceType {}

impl Hash for SourceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.assembly) as usize).hash(state);
        self.index.hash(state);
    }
}

/// Placeholder for a type that could not be found.
///
/// `assembly` is the identity the type was expected in, or `None` when a
/// name search over every visible assembly came up empty.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MissingType {
    assembly: Option<AssemblyIdentity>,
    namespace: String,
    name: String,
    arity: u16,
}

impl MissingType {
    /// Creates the placeholder.
    pub fn new(assembly: Option<AssemblyIdentity>, namespace: &str, name: &str, arity: u16) -> Self {
        Self {
            assembly,
            namespace: namespace.to_string(),
            name: name.to_string(),
            arity,
        }
    }

    /// The assembly expected to define the type.
    pub fn assembly(&self) -> Option<&AssemblyIdentity> {
        self.assembly.as_ref()
    }

    /// Display name including namespace and arity suffix.
    pub fn full_name(&self) -> String {
        format_full_name(&self.namespace, &self.name, self.arity)
    }
}

fn format_full_name(namespace: &str, name: &str, arity: u16) -> String {
    let mut full = String::new();
    if !namespace.is_empty() {
        full.push_str(namespace);
        full.push('.');
    }
    full.push_str(name);
    if arity > 0 {
        full.push_str(&format!("`{arity}"));
    }
    full
}

/// A type definition: the unit of type lookup.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum NamedTypeSymbol {
    /// Defined in an image module.
    Native(NativeType),
    /// Declared in the compilation's own source.
    Source(SourceType),
    /// A foreign compilation's type seen through a retargeting assembly.
    Retargeting(Retargeted<NamedTypeSymbol>),
    /// Not found.
    Missing(Arc<MissingType>),
}

impl NamedTypeSymbol {
    pub(crate) fn missing(assembly: Option<AssemblyIdentity>, namespace: &str, name: &str, arity: u16) -> Self {
        NamedTypeSymbol::Missing(Arc::new(MissingType::new(assembly, namespace, name, arity)))
    }

    pub(crate) fn as_defined(&self) -> Option<DefinedType> {
        match self {
            NamedTypeSymbol::Native(native) => Some(DefinedType::Native(native.clone())),
            NamedTypeSymbol::Source(source) => Some(DefinedType::Source(source.clone())),
            _ => None,
        }
    }

    /// The dotted namespace, empty for the global namespace.
    pub fn namespace(&self) -> &str {
        match self {
            NamedTypeSymbol::Native(native) => &native.def().namespace,
            NamedTypeSymbol::Source(source) => &source.def().namespace,
            NamedTypeSymbol::Retargeting(retargeted) => retargeted.underlying().namespace(),
            NamedTypeSymbol::Missing(missing) => &missing.namespace,
        }
    }

    /// Number of generic parameters.
    pub fn arity(&self) -> u16 {
        match self {
            NamedTypeSymbol::Missing(missing) => missing.arity,
            NamedTypeSymbol::Retargeting(retargeted) => retargeted.underlying().arity(),
            _ => self.definition().map(TypeDef::arity).unwrap_or(0),
        }
    }

    /// `Namespace.Name` with a `` `n `` suffix for generic types.
    pub fn full_name(&self) -> String {
        format_full_name(self.namespace(), self.name(), self.arity())
    }

    /// The metadata declaration, if the type exists.
    pub fn definition(&self) -> Option<&TypeDef> {
        match self {
            NamedTypeSymbol::Native(native) => Some(native.def()),
            NamedTypeSymbol::Source(source) => Some(source.def()),
            NamedTypeSymbol::Retargeting(retargeted) => retargeted.underlying().definition(),
            NamedTypeSymbol::Missing(_) => None,
        }
    }

    /// Declared accessibility; missing types report public.
    pub fn accessibility(&self) -> Accessibility {
        self.definition()
            .map(|def| def.accessibility)
            .unwrap_or(Accessibility::Public)
    }

    /// The module the type is defined in.
    pub fn containing_module(&self) -> ModuleSymbol {
        match self {
            NamedTypeSymbol::Native(native) => ModuleSymbol::Native(native.module.clone()),
            NamedTypeSymbol::Source(source) => ModuleSymbol::Source(source.assembly.clone()),
            NamedTypeSymbol::Retargeting(retargeted) => retargeted
                .retargeting_assembly()
                .retarget(retargeted.underlying().containing_module()),
            NamedTypeSymbol::Missing(missing) => {
                let identity = missing
                    .assembly
                    .clone()
                    .unwrap_or_else(|| AssemblyIdentity::new("", Version::ZERO));
                ModuleSymbol::Missing(Arc::new(MissingAssembly::new(identity)))
            }
        }
    }

    /// The base type, if any.
    pub fn base_type(&self) -> Option<TypeSymbol> {
        match self {
            NamedTypeSymbol::Retargeting(retargeted) => {
                let base = retargeted.underlying().base_type()?;
                Some(retargeted.retargeting_assembly().translate_type(base))
            }
            _ => {
                let defined = self.as_defined()?;
                let base = defined.def().base.as_ref()?;
                Some(defined.resolve(base, None))
            }
        }
    }

    /// Generic parameters in declaration order.
    pub fn type_parameters(&self) -> Vec<TypeParameterSymbol> {
        match self {
            NamedTypeSymbol::Retargeting(retargeted) => retargeted
                .underlying()
                .type_parameters()
                .into_iter()
                .map(|param| retargeted.retargeting_assembly().retarget(param))
                .collect(),
            _ => match self.as_defined() {
                Some(defined) => (0..defined.def().type_params.len() as u16)
                    .map(|ordinal| {
                        TypeParameterSymbol::Defined(DefinedTypeParameter::new(
                            TypeParameterOwner::Type(defined.clone()),
                            ordinal,
                        ))
                    })
                    .collect(),
                None => Vec::new(),
            },
        }
    }

    /// Visible methods in declaration order.
    pub fn methods(&self) -> Vec<MethodSymbol> {
        match self {
            NamedTypeSymbol::Retargeting(retargeted) => retargeted
                .underlying()
                .methods()
                .into_iter()
                .map(|method| retargeted.retargeting_assembly().retarget(method))
                .collect(),
            _ => match self.as_defined() {
                Some(defined) => {
                    let import = defined.import();
                    defined
                        .def()
                        .methods
                        .iter()
                        .enumerate()
                        .filter(|(_, method)| import.admits(method.accessibility))
                        .map(|(i, _)| MethodSymbol::Defined(DefinedMethod::new(defined.clone(), i as u32)))
                        .collect()
                }
                None => Vec::new(),
            },
        }
    }

    /// The first visible method called `name`.
    pub fn method(&self, name: &str) -> Option<MethodSymbol> {
        self.methods().into_iter().find(|method| method.name() == name)
    }

    /// Visible fields in declaration order.
    pub fn fields(&self) -> Vec<FieldSymbol> {
        match self {
            NamedTypeSymbol::Retargeting(retargeted) => retargeted
                .underlying()
                .fields()
                .into_iter()
                .map(|field| retargeted.retargeting_assembly().retarget(field))
                .collect(),
            _ => match self.as_defined() {
                Some(defined) => {
                    let import = defined.import();
                    defined
                        .def()
                        .fields
                        .iter()
                        .enumerate()
                        .filter(|(_, field)| import.admits(field.accessibility))
                        .map(|(i, _)| FieldSymbol::Defined(DefinedField::new(defined.clone(), i as u32)))
                        .collect()
                }
                None => Vec::new(),
            },
        }
    }

    /// The visible field called `name`.
    pub fn field(&self, name: &str) -> Option<FieldSymbol> {
        self.fields().into_iter().find(|field| field.name() == name)
    }
}

impl Symbol for NamedTypeSymbol {
    fn kind(&self) -> SymbolKind {
        SymbolKind::NamedType
    }

    fn origin(&self) -> SymbolOrigin {
        match self {
            NamedTypeSymbol::Native(_) => SymbolOrigin::Native,
            NamedTypeSymbol::Source(_) => SymbolOrigin::Source,
            NamedTypeSymbol::Retargeting(_) => SymbolOrigin::Retargeting,
            NamedTypeSymbol::Missing(_) => SymbolOrigin::Missing,
        }
    }

    fn name(&self) -> &str {
        match self {
            NamedTypeSymbol::Native(native) => &native.def().name,
            NamedTypeSymbol::Source(source) => &source.def().name,
            NamedTypeSymbol::Retargeting(retargeted) => retargeted.underlying().name(),
            NamedTypeSymbol::Missing(missing) => &missing.name,
        }
    }

    fn containing_assembly(&self) -> AssemblySymbol {
        self.containing_module().containing_assembly()
    }
}

impl fmt::Debug for NamedTypeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamedTypeSymbol::{}({})", self.origin(), self.full_name())
    }
}

impl fmt::Display for NamedTypeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.namespace().is_empty() {
            write!(f, "{}.", self.namespace())?;
        }
        write!(f, "{}", self.name())
    }
}

/// A type as it appears in a signature.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeSymbol {
    /// A non-generic named type, or a generic definition used bare.
    Named(NamedTypeSymbol),
    /// A generic definition applied to arguments.
    Constructed {
        /// The generic definition.
        definition: NamedTypeSymbol,
        /// Type arguments, one per parameter.
        arguments: Vec<TypeSymbol>,
    },
    /// A generic parameter.
    TypeParameter(TypeParameterSymbol),
    /// A single-dimensional array.
    Array(Box<TypeSymbol>),
}

impl TypeSymbol {
    /// Whether the type mentions any missing named type.
    pub fn is_error(&self) -> bool {
        self.first_missing().is_some()
    }

    /// The first missing named type, in reading order.
    pub fn first_missing(&self) -> Option<&Arc<MissingType>> {
        match self {
            TypeSymbol::Named(NamedTypeSymbol::Missing(missing)) => Some(missing),
            TypeSymbol::Named(_) | TypeSymbol::TypeParameter(_) => None,
            TypeSymbol::Constructed {
                definition,
                arguments,
            } => match definition {
                NamedTypeSymbol::Missing(missing) => Some(missing),
                _ => arguments.iter().find_map(TypeSymbol::first_missing),
            },
            TypeSymbol::Array(element) => element.first_missing(),
        }
    }

    /// The named type at the root of the expression.
    pub fn named(&self) -> Option<&NamedTypeSymbol> {
        match self {
            TypeSymbol::Named(named) => Some(named),
            TypeSymbol::Constructed { definition, .. } => Some(definition),
            _ => None,
        }
    }
}

impl fmt::Display for TypeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSymbol::Named(named) => write!(f, "{named}"),
            TypeSymbol::Constructed {
                definition,
                arguments,
            } => {
                write!(f, "{definition}<")?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            TypeSymbol::TypeParameter(param) => write!(f, "{}", param.name()),
            TypeSymbol::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// A type with a declaration: the context signature references resolve in.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) enum DefinedType {
    Native(NativeType),
    Source(SourceType),
}

impl DefinedType {
    pub(crate) fn def(&self) -> &TypeDef {
        match self {
            DefinedType::Native(native) => native.def(),
            DefinedType::Source(source) => source.def(),
        }
    }

    pub(crate) fn symbol(&self) -> NamedTypeSymbol {
        match self {
            DefinedType::Native(native) => NamedTypeSymbol::Native(native.clone()),
            DefinedType::Source(source) => NamedTypeSymbol::Source(source.clone()),
        }
    }

    pub(crate) fn import(&self) -> ImportOptions {
        match self {
            DefinedType::Native(native) => native.module.owner().import(),
            DefinedType::Source(_) => ImportOptions::All,
        }
    }

    fn module(&self) -> ModuleSymbol {
        match self {
            DefinedType::Native(native) => ModuleSymbol::Native(native.module.clone()),
            DefinedType::Source(source) => ModuleSymbol::Source(source.assembly.clone()),
        }
    }

    /// Resolves a signature reference written inside this type, or inside
    /// `method` when it is one of the type's methods.
    pub(crate) fn resolve(&self, reference: &TypeRef, method: Option<&DefinedMethod>) -> TypeSymbol {
        match reference {
            TypeRef::Named {
                scope,
                namespace,
                name,
                args,
            } => {
                let definition = self.lookup(*scope, namespace, name, args.len() as u16);
                if args.is_empty() {
                    TypeSymbol::Named(definition)
                } else {
                    TypeSymbol::Constructed {
                        definition,
                        arguments: args.iter().map(|arg| self.resolve(arg, method)).collect(),
                    }
                }
            }
            TypeRef::GenericParam {
                owner: GenericOwner::Type,
                index,
            } if (*index as usize) < self.def().type_params.len() => {
                TypeSymbol::TypeParameter(TypeParameterSymbol::Defined(DefinedTypeParameter::new(
                    TypeParameterOwner::Type(self.clone()),
                    *index,
                )))
            }
            TypeRef::GenericParam {
                owner: GenericOwner::Method,
                index,
            } => match method {
                Some(method) if (*index as usize) < method.def().type_params.len() => {
                    TypeSymbol::TypeParameter(TypeParameterSymbol::Defined(
                        DefinedTypeParameter::new(TypeParameterOwner::Method(method.clone()), *index),
                    ))
                }
                _ => self.unbound_parameter(reference),
            },
            TypeRef::GenericParam { .. } => self.unbound_parameter(reference),
            TypeRef::Array(element) => TypeSymbol::Array(Box::new(self.resolve(element, method))),
        }
    }

    fn unbound_parameter(&self, reference: &TypeRef) -> TypeSymbol {
        let own = self.module().containing_assembly().identity().clone();
        TypeSymbol::Named(NamedTypeSymbol::missing(Some(own), "", &reference.to_string(), 0))
    }

    fn lookup(&self, scope: TypeScope, namespace: &str, name: &str, arity: u16) -> NamedTypeSymbol {
        let module = self.module();
        match scope {
            TypeScope::CurrentModule => module.find_type(namespace, name, arity).unwrap_or_else(|| {
                let own = module.containing_assembly().identity().clone();
                NamedTypeSymbol::missing(Some(own), namespace, name, arity)
            }),
            TypeScope::Assembly(index) => {
                let identities = module.referenced_assembly_identities();
                match module.referenced_assembly(index as usize) {
                    Some(target) => target.resolve_type(namespace, name, arity),
                    None => NamedTypeSymbol::missing(
                        identities.get(index as usize).cloned(),
                        namespace,
                        name,
                        arity,
                    ),
                }
            }
            TypeScope::Unqualified => {
                let own = module.containing_assembly();
                own.find_type(namespace, name, arity)
                    .or_else(|| {
                        module
                            .referenced_assemblies()
                            .iter()
                            .find_map(|target| target.find_type(namespace, name, arity))
                    })
                    .unwrap_or_else(|| NamedTypeSymbol::missing(None, namespace, name, arity))
            }
        }
    }
}
