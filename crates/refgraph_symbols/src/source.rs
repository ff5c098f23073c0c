//! Declarations contributed by a compilation's own source.

use refgraph_metadata::TypeDef;

/// One syntax unit of a compilation: a named group of type declarations.
///
/// Type references inside declarations normally use
/// [`TypeScope::Unqualified`](refgraph_metadata::TypeScope::Unqualified):
/// they are looked up in the compilation's own types first, then in its
/// referenced assemblies in reference order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceUnit {
    /// Unit name, e.g. a file name.
    pub name: String,
    /// Declared types.
    pub types: Vec<TypeDef>,
}

impl SourceUnit {
    /// An empty unit.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            types: Vec::new(),
        }
    }

    /// Appends a type declaration.
    pub fn with_type(mut self, ty: TypeDef) -> Self {
        self.types.push(ty);
        self
    }
}
