//! Methods, fields, parameters and generic parameters.

use std::fmt;

use refgraph_metadata::{Accessibility, FieldDef, MethodDef};

use crate::assembly::AssemblySymbol;
use crate::retargeting::Retargeted;
use crate::symbol::{Symbol, SymbolKind, SymbolOrigin};
use crate::types::{DefinedType, NamedTypeSymbol, TypeSymbol};

/// A method declared in a native or source type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DefinedMethod {
    ty: DefinedType,
    index: u32,
}

impl DefinedMethod {
    pub(crate) fn new(ty: DefinedType, index: u32) -> Self {
        Self { ty, index }
    }

    pub(crate) fn def(&self) -> &MethodDef {
        &self.ty.def().methods[self.index as usize]
    }
}

/// A method.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum MethodSymbol {
    /// Declared in a native or source type.
    Defined(DefinedMethod),
    /// A foreign compilation's method seen through a retargeting assembly.
    Retargeting(Retargeted<MethodSymbol>),
}

impl MethodSymbol {
    /// The declaring type.
    pub fn containing_type(&self) -> NamedTypeSymbol {
        match self {
            MethodSymbol::Defined(method) => method.ty.symbol(),
            MethodSymbol::Retargeting(retargeted) => retargeted
                .retargeting_assembly()
                .retarget(retargeted.underlying().containing_type()),
        }
    }

    /// The return type, `None` for methods returning nothing.
    pub fn return_type(&self) -> Option<TypeSymbol> {
        match self {
            MethodSymbol::Defined(method) => method
                .def()
                .return_type
                .as_ref()
                .map(|ty| method.ty.resolve(ty, Some(method))),
            MethodSymbol::Retargeting(retargeted) => retargeted
                .underlying()
                .return_type()
                .map(|ty| retargeted.retargeting_assembly().translate_type(ty)),
        }
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> Vec<ParameterSymbol> {
        match self {
            MethodSymbol::Defined(method) => (0..method.def().params.len() as u16)
                .map(|ordinal| {
                    ParameterSymbol::Defined(DefinedParameter {
                        method: method.clone(),
                        ordinal,
                    })
                })
                .collect(),
            MethodSymbol::Retargeting(retargeted) => retargeted
                .underlying()
                .parameters()
                .into_iter()
                .map(|param| retargeted.retargeting_assembly().retarget(param))
                .collect(),
        }
    }

    /// Method-level generic parameters.
    pub fn type_parameters(&self) -> Vec<TypeParameterSymbol> {
        match self {
            MethodSymbol::Defined(method) => (0..method.def().type_params.len() as u16)
                .map(|ordinal| {
                    TypeParameterSymbol::Defined(DefinedTypeParameter::new(
                        TypeParameterOwner::Method(method.clone()),
                        ordinal,
                    ))
                })
                .collect(),
            MethodSymbol::Retargeting(retargeted) => retargeted
                .underlying()
                .type_parameters()
                .into_iter()
                .map(|param| retargeted.retargeting_assembly().retarget(param))
                .collect(),
        }
    }

    /// The method's declaration.
    pub fn definition(&self) -> &MethodDef {
        match self {
            MethodSymbol::Defined(method) => method.def(),
            MethodSymbol::Retargeting(retargeted) => retargeted.underlying().definition(),
        }
    }

    /// Whether the method is static.
    pub fn is_static(&self) -> bool {
        self.definition().is_static
    }

    /// Declared accessibility.
    pub fn accessibility(&self) -> Accessibility {
        self.definition().accessibility
    }
}

impl Symbol for MethodSymbol {
    fn kind(&self) -> SymbolKind {
        SymbolKind::Method
    }

    fn origin(&self) -> SymbolOrigin {
        match self {
            MethodSymbol::Defined(method) => method.ty.symbol().origin(),
            MethodSymbol::Retargeting(_) => SymbolOrigin::Retargeting,
        }
    }

    fn name(&self) -> &str {
        &self.definition().name
    }

    fn containing_assembly(&self) -> AssemblySymbol {
        self.containing_type().containing_assembly()
    }
}

impl fmt::Debug for MethodSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MethodSymbol::{}({}.{})",
            self.origin(),
            self.containing_type().full_name(),
            self.name()
        )
    }
}

/// A field declared in a native or source type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DefinedField {
    ty: DefinedType,
    index: u32,
}

impl DefinedField {
    pub(crate) fn new(ty: DefinedType, index: u32) -> Self {
        Self { ty, index }
    }

    fn def(&self) -> &FieldDef {
        &self.ty.def().fields[self.index as usize]
    }
}

/// A field.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum FieldSymbol {
    /// Declared in a native or source type.
    Defined(DefinedField),
    /// A foreign compilation's field seen through a retargeting assembly.
    Retargeting(Retargeted<FieldSymbol>),
}

impl FieldSymbol {
    /// The declaring type.
    pub fn containing_type(&self) -> NamedTypeSymbol {
        match self {
            FieldSymbol::Defined(field) => field.ty.symbol(),
            FieldSymbol::Retargeting(retargeted) => retargeted
                .retargeting_assembly()
                .retarget(retargeted.underlying().containing_type()),
        }
    }

    /// The field's type.
    pub fn ty(&self) -> TypeSymbol {
        match self {
            FieldSymbol::Defined(field) => field.ty.resolve(&field.def().ty, None),
            FieldSymbol::Retargeting(retargeted) => retargeted
                .retargeting_assembly()
                .translate_type(retargeted.underlying().ty()),
        }
    }

    /// The field's declaration.
    pub fn definition(&self) -> &FieldDef {
        match self {
            FieldSymbol::Defined(field) => field.def(),
            FieldSymbol::Retargeting(retargeted) => retargeted.underlying().definition(),
        }
    }
}

impl Symbol for FieldSymbol {
    fn kind(&self) -> SymbolKind {
        SymbolKind::Field
    }

    fn origin(&self) -> SymbolOrigin {
        match self {
            FieldSymbol::Defined(field) => field.ty.symbol().origin(),
            FieldSymbol::Retargeting(_) => SymbolOrigin::Retargeting,
        }
    }

    fn name(&self) -> &str {
        &self.definition().name
    }

    fn containing_assembly(&self) -> AssemblySymbol {
        self.containing_type().containing_assembly()
    }
}

impl fmt::Debug for FieldSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldSymbol::{}({})", self.origin(), self.name())
    }
}

/// A parameter of a defined method.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DefinedParameter {
    method: DefinedMethod,
    ordinal: u16,
}

/// A method parameter.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ParameterSymbol {
    /// Declared by a native or source method.
    Defined(DefinedParameter),
    /// A foreign compilation's parameter seen through a retargeting assembly.
    Retargeting(Retargeted<ParameterSymbol>),
}

impl ParameterSymbol {
    /// Zero-based position.
    pub fn ordinal(&self) -> u16 {
        match self {
            ParameterSymbol::Defined(param) => param.ordinal,
            ParameterSymbol::Retargeting(retargeted) => retargeted.underlying().ordinal(),
        }
    }

    /// The parameter's type.
    pub fn ty(&self) -> TypeSymbol {
        match self {
            ParameterSymbol::Defined(param) => {
                let def = &param.method.def().params[param.ordinal as usize];
                param.method.ty.resolve(&def.ty, Some(&param.method))
            }
            ParameterSymbol::Retargeting(retargeted) => retargeted
                .retargeting_assembly()
                .translate_type(retargeted.underlying().ty()),
        }
    }

    /// The declaring method.
    pub fn containing_method(&self) -> MethodSymbol {
        match self {
            ParameterSymbol::Defined(param) => MethodSymbol::Defined(param.method.clone()),
            ParameterSymbol::Retargeting(retargeted) => retargeted
                .retargeting_assembly()
                .retarget(retargeted.underlying().containing_method()),
        }
    }
}

impl Symbol for ParameterSymbol {
    fn kind(&self) -> SymbolKind {
        SymbolKind::Parameter
    }

    fn origin(&self) -> SymbolOrigin {
        match self {
            ParameterSymbol::Defined(param) => param.method.ty.symbol().origin(),
            ParameterSymbol::Retargeting(_) => SymbolOrigin::Retargeting,
        }
    }

    fn name(&self) -> &str {
        match self {
            ParameterSymbol::Defined(param) => &param.method.def().params[param.ordinal as usize].name,
            ParameterSymbol::Retargeting(retargeted) => retargeted.underlying().name(),
        }
    }

    fn containing_assembly(&self) -> AssemblySymbol {
        self.containing_method().containing_assembly()
    }
}

impl fmt::Debug for ParameterSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParameterSymbol::{}({}: {})", self.origin(), self.name(), self.ty())
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) enum TypeParameterOwner {
    Type(DefinedType),
    Method(DefinedMethod),
}

/// A generic parameter of a defined type or method.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DefinedTypeParameter {
    owner: TypeParameterOwner,
    ordinal: u16,
}

impl DefinedTypeParameter {
    pub(crate) fn new(owner: TypeParameterOwner, ordinal: u16) -> Self {
        Self { owner, ordinal }
    }

    fn names(&self) -> &[String] {
        match &self.owner {
            TypeParameterOwner::Type(ty) => &ty.def().type_params,
            TypeParameterOwner::Method(method) => &method.def().type_params,
        }
    }

    fn declaring_type(&self) -> NamedTypeSymbol {
        match &self.owner {
            TypeParameterOwner::Type(ty) => ty.symbol(),
            TypeParameterOwner::Method(method) => method.ty.symbol(),
        }
    }
}

/// A generic parameter.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TypeParameterSymbol {
    /// Declared by a native or source type or method.
    Defined(DefinedTypeParameter),
    /// A foreign compilation's generic parameter seen through a retargeting assembly.
    Retargeting(Retargeted<TypeParameterSymbol>),
}

impl TypeParameterSymbol {
    /// Zero-based position in the owner's parameter list.
    pub fn ordinal(&self) -> u16 {
        match self {
            TypeParameterSymbol::Defined(param) => param.ordinal,
            TypeParameterSymbol::Retargeting(retargeted) => retargeted.underlying().ordinal(),
        }
    }

    /// Whether the parameter belongs to a method rather than a type.
    pub fn is_method_parameter(&self) -> bool {
        match self {
            TypeParameterSymbol::Defined(param) => {
                matches!(param.owner, TypeParameterOwner::Method(_))
            }
            TypeParameterSymbol::Retargeting(retargeted) => {
                retargeted.underlying().is_method_parameter()
            }
        }
    }

    /// The type declaring the parameter, or declaring the method that does.
    pub fn declaring_type(&self) -> NamedTypeSymbol {
        match self {
            TypeParameterSymbol::Defined(param) => param.declaring_type(),
            TypeParameterSymbol::Retargeting(retargeted) => retargeted
                .retargeting_assembly()
                .retarget(retargeted.underlying().declaring_type()),
        }
    }
}

impl Symbol for TypeParameterSymbol {
    fn kind(&self) -> SymbolKind {
        SymbolKind::TypeParameter
    }

    fn origin(&self) -> SymbolOrigin {
        match self {
            TypeParameterSymbol::Defined(param) => param.declaring_type().origin(),
            TypeParameterSymbol::Retargeting(_) => SymbolOrigin::Retargeting,
        }
    }

    fn name(&self) -> &str {
        match self {
            TypeParameterSymbol::Defined(param) => param
                .names()
                .get(param.ordinal as usize)
                .map(String::as_str)
                .unwrap_or("?"),
            TypeParameterSymbol::Retargeting(retargeted) => retargeted.underlying().name(),
        }
    }

    fn containing_assembly(&self) -> AssemblySymbol {
        self.declaring_type().containing_assembly()
    }
}

impl fmt::Debug for TypeParameterSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeParameterSymbol::{}({})", self.origin(), self.name())
    }
}
