//! The parsed form of a metadata image.
//!
//! An image is either a whole assembly (identity plus manifest module and
//! linked modules) or a standalone module meant to be linked into another
//! compilation's assembly. Every module carries the ordered table of assembly
//! identities it references; type references inside the module point into
//! that table by index.

use refgraph_common::AssemblyIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an image is a whole unit or a linkable sub-unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum ImageKind {
    /// An assembly with an identity and a manifest module.
    #[default]
    Assembly,
    /// A standalone module.
    Module,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Assembly => write!(f, "assembly"),
            ImageKind::Module => write!(f, "module"),
        }
    }
}

/// Declared visibility of a type or member.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Accessibility {
    /// Visible only inside its declaring type.
    Private,
    /// Visible inside the declaring assembly.
    Internal,
    /// Visible everywhere.
    #[default]
    Public,
}

/// Where a named type reference should be looked up.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TypeScope {
    /// The module containing the reference.
    CurrentModule,
    /// Entry `n` of the containing module's referenced-assembly table.
    Assembly(u32),
    /// Search the containing assembly, then its references in order.
    Unqualified,
}

/// Whether a generic parameter belongs to a type or a method.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum GenericOwner {
    /// A type parameter of the enclosing type.
    Type,
    /// A type parameter of the enclosing method.
    Method,
}

/// A reference to a type as written in a signature.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TypeRef {
    /// A named type, possibly constructed with type arguments.
    Named {
        /// Lookup scope.
        scope: TypeScope,
        /// Dotted namespace, empty for the global namespace.
        namespace: String,
        /// Simple type name.
        name: String,
        /// Type arguments; the referenced definition has this many parameters.
        args: Vec<TypeRef>,
    },
    /// A generic parameter by position.
    GenericParam {
        /// The owner of the parameter.
        owner: GenericOwner,
        /// Zero-based ordinal.
        index: u16,
    },
    /// A single-dimensional array of the element type.
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// A type in the current module.
    pub fn local(namespace: &str, name: &str) -> Self {
        Self::named(TypeScope::CurrentModule, namespace, name)
    }

    /// A type in entry `index` of the module's reference table.
    pub fn external(index: u32, namespace: &str, name: &str) -> Self {
        Self::named(TypeScope::Assembly(index), namespace, name)
    }

    /// A type found by name search.
    pub fn unqualified(namespace: &str, name: &str) -> Self {
        Self::named(TypeScope::Unqualified, namespace, name)
    }

    fn named(scope: TypeScope, namespace: &str, name: &str) -> Self {
        TypeRef::Named {
            scope,
            namespace: namespace.to_string(),
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    /// Adds type arguments to a named reference; other references are returned unchanged.
    pub fn with_args(mut self, new_args: Vec<TypeRef>) -> Self {
        if let TypeRef::Named { args, .. } = &mut self {
            *args = new_args;
        }
        self
    }

    /// A type parameter of the enclosing type.
    pub fn type_param(index: u16) -> Self {
        TypeRef::GenericParam {
            owner: GenericOwner::Type,
            index,
        }
    }

    /// A type parameter of the enclosing method.
    pub fn method_param(index: u16) -> Self {
        TypeRef::GenericParam {
            owner: GenericOwner::Method,
            index,
        }
    }

    /// An array of this type.
    pub fn array(self) -> Self {
        TypeRef::Array(Box::new(self))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named {
                namespace,
                name,
                args,
                ..
            } => {
                if !namespace.is_empty() {
                    write!(f, "{namespace}.")?;
                }
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeRef::GenericParam {
                owner: GenericOwner::Type,
                index,
            } => write!(f, "!{index}"),
            TypeRef::GenericParam {
                owner: GenericOwner::Method,
                index,
            } => write!(f, "!!{index}"),
            TypeRef::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// A method parameter.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ParamDef {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub ty: TypeRef,
}

/// A method definition.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MethodDef {
    /// Method name.
    pub name: String,
    /// Declared visibility.
    pub accessibility: Accessibility,
    /// Whether the method is static.
    pub is_static: bool,
    /// Names of the method's own type parameters.
    pub type_params: Vec<String>,
    /// Parameters in declaration order.
    pub params: Vec<ParamDef>,
    /// Return type; `None` for a method returning nothing.
    pub return_type: Option<TypeRef>,
}

impl MethodDef {
    /// A public instance method with no parameters returning nothing.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            accessibility: Accessibility::Public,
            is_static: false,
            type_params: Vec::new(),
            params: Vec::new(),
            return_type: None,
        }
    }

    /// Sets the return type.
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Appends a parameter.
    pub fn param(mut self, name: &str, ty: TypeRef) -> Self {
        self.params.push(ParamDef {
            name: name.to_string(),
            ty,
        });
        self
    }

    /// Appends a method type parameter.
    pub fn type_param(mut self, name: &str) -> Self {
        self.type_params.push(name.to_string());
        self
    }

    /// Sets the visibility.
    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    /// Marks the method static.
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// A field definition.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Declared visibility.
    pub accessibility: Accessibility,
    /// Declared type.
    pub ty: TypeRef,
}

impl FieldDef {
    /// A public field.
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            accessibility: Accessibility::Public,
            ty,
        }
    }
}

/// A type definition.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TypeDef {
    /// Dotted namespace, empty for the global namespace.
    pub namespace: String,
    /// Simple name without arity suffix.
    pub name: String,
    /// Declared visibility.
    pub accessibility: Accessibility,
    /// Names of the type parameters; the count is the type's arity.
    pub type_params: Vec<String>,
    /// Base type, if any.
    pub base: Option<TypeRef>,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
    /// Methods in declaration order.
    pub methods: Vec<MethodDef>,
}

impl TypeDef {
    /// An empty public type.
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            accessibility: Accessibility::Public,
            type_params: Vec::new(),
            base: None,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Number of type parameters.
    pub fn arity(&self) -> u16 {
        self.type_params.len() as u16
    }

    /// Appends a type parameter.
    pub fn type_param(mut self, name: &str) -> Self {
        self.type_params.push(name.to_string());
        self
    }

    /// Sets the base type.
    pub fn with_base(mut self, base: TypeRef) -> Self {
        self.base = Some(base);
        self
    }

    /// Appends a method.
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Appends a field.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the visibility.
    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    /// `Namespace.Name` with an arity suffix for generic types.
    pub fn full_name(&self) -> String {
        let mut out = String::new();
        if !self.namespace.is_empty() {
            out.push_str(&self.namespace);
            out.push('.');
        }
        out.push_str(&self.name);
        if !self.type_params.is_empty() {
            out.push('`');
            out.push_str(&self.type_params.len().to_string());
        }
        out
    }
}

/// One module: a name, its referenced-assembly table and its types.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ModuleDef {
    /// Module file name, e.g. `Lib.dll` or `Extra.netmodule`.
    pub name: String,
    /// Referenced assemblies in table order.
    pub referenced_assemblies: Vec<AssemblyIdentity>,
    /// Types defined in this module.
    pub types: Vec<TypeDef>,
}

impl ModuleDef {
    /// An empty module.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            referenced_assemblies: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Appends a referenced assembly; returns the module for chaining.
    pub fn references(mut self, identity: AssemblyIdentity) -> Self {
        self.referenced_assemblies.push(identity);
        self
    }

    /// Appends a type definition.
    pub fn with_type(mut self, ty: TypeDef) -> Self {
        self.types.push(ty);
        self
    }
}

/// An assembly: identity plus modules, manifest module first.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AssemblyDef {
    /// The assembly's identity.
    pub identity: AssemblyIdentity,
    /// Modules; index 0 is the manifest module.
    pub modules: Vec<ModuleDef>,
}

/// A decoded metadata image.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum MetadataImage {
    /// A whole assembly.
    Assembly(AssemblyDef),
    /// A standalone module.
    Module(ModuleDef),
}

impl MetadataImage {
    /// An assembly image with a single manifest module.
    pub fn assembly(identity: AssemblyIdentity, manifest: ModuleDef) -> Self {
        MetadataImage::Assembly(AssemblyDef {
            identity,
            modules: vec![manifest],
        })
    }

    /// Whether this is an assembly or module image.
    pub fn kind(&self) -> ImageKind {
        match self {
            MetadataImage::Assembly(_) => ImageKind::Assembly,
            MetadataImage::Module(_) => ImageKind::Module,
        }
    }

    /// The assembly identity, for assembly images.
    pub fn identity(&self) -> Option<&AssemblyIdentity> {
        match self {
            MetadataImage::Assembly(assembly) => Some(&assembly.identity),
            MetadataImage::Module(_) => None,
        }
    }

    /// The image's modules, manifest first; a module image has exactly one.
    pub fn modules(&self) -> &[ModuleDef] {
        match self {
            MetadataImage::Assembly(assembly) => &assembly.modules,
            MetadataImage::Module(module) => std::slice::from_ref(module),
        }
    }

    /// A short display name: the identity's name or the module name.
    pub fn display_name(&self) -> &str {
        match self {
            MetadataImage::Assembly(assembly) => assembly.identity.name(),
            MetadataImage::Module(module) => &module.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refgraph_common::Version;

    #[test]
    fn module_image_exposes_single_module() {
        let image = MetadataImage::Module(ModuleDef::new("Extra.netmodule"));
        assert_eq!(image.kind(), ImageKind::Module);
        assert!(image.identity().is_none());
        assert_eq!(image.modules().len(), 1);
        assert_eq!(image.display_name(), "Extra.netmodule");
    }

    #[test]
    fn assembly_image_manifest_first() {
        let identity = AssemblyIdentity::new("Lib", Version::new(1, 0, 0, 0));
        let mut image = MetadataImage::assembly(identity.clone(), ModuleDef::new("Lib.dll"));
        if let MetadataImage::Assembly(def) = &mut image {
            def.modules.push(ModuleDef::new("Lib2.netmodule"));
        }
        assert_eq!(image.identity(), Some(&identity));
        assert_eq!(image.modules()[0].name, "Lib.dll");
        assert_eq!(image.modules()[1].name, "Lib2.netmodule");
    }

    #[test]
    fn type_ref_display() {
        let list = TypeRef::external(0, "System.Collections", "List")
            .with_args(vec![TypeRef::type_param(0)]);
        assert_eq!(list.to_string(), "System.Collections.List<!0>");
        assert_eq!(TypeRef::method_param(1).array().to_string(), "!!1[]");
        assert_eq!(TypeRef::local("", "Global").to_string(), "Global");
    }

    #[test]
    fn full_name_has_arity_suffix() {
        let ty = TypeDef::new("Lib", "Box").type_param("T");
        assert_eq!(ty.arity(), 1);
        assert_eq!(ty.full_name(), "Lib.Box`1");
        assert_eq!(TypeDef::new("", "G").full_name(), "G");
    }

    #[test]
    fn method_builder() {
        let m = MethodDef::new("Make")
            .type_param("T")
            .param("x", TypeRef::method_param(0))
            .returns(TypeRef::local("Lib", "C"))
            .static_method();
        assert!(m.is_static);
        assert_eq!(m.params.len(), 1);
        assert!(m.return_type.is_some());
    }
}
