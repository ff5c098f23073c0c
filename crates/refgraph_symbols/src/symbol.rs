//! The read-only surface shared by every symbol role and variant.

use refgraph_metadata::Accessibility;
use std::fmt;

use crate::assembly::AssemblySymbol;

/// The role a symbol plays.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SymbolKind {
    /// A compiled unit.
    Assembly,
    /// A sub-unit of an assembly.
    Module,
    /// A named type definition.
    NamedType,
    /// A method.
    Method,
    /// A field.
    Field,
    /// A method parameter.
    Parameter,
    /// A generic type parameter.
    TypeParameter,
}

/// Where a symbol's data comes from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SymbolOrigin {
    /// Projected from a parsed metadata image.
    Native,
    /// Declared by a compilation's own source.
    Source,
    /// A proxy viewing a foreign compilation's symbol through a different
    /// choice of dependency versions.
    Retargeting,
    /// A placeholder for something that could not be resolved.
    Missing,
}

impl fmt::Display for SymbolOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolOrigin::Native => write!(f, "native"),
            SymbolOrigin::Source => write!(f, "source"),
            SymbolOrigin::Retargeting => write!(f, "retargeting"),
            SymbolOrigin::Missing => write!(f, "missing"),
        }
    }
}

/// Operations every symbol supports regardless of role or variant.
pub trait Symbol {
    /// The symbol's role.
    fn kind(&self) -> SymbolKind;

    /// The variant backing the symbol.
    fn origin(&self) -> SymbolOrigin;

    /// The simple name.
    fn name(&self) -> &str;

    /// The assembly the symbol belongs to, as seen by its owner.
    fn containing_assembly(&self) -> AssemblySymbol;

    /// Whether the symbol stands in for something unresolved.
    fn is_missing(&self) -> bool {
        self.origin() == SymbolOrigin::Missing
    }
}

/// Which non-public metadata members become visible as symbols.
///
/// Part of a native assembly's binding context: compilations importing with
/// different visibility never share native wrappers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum ImportOptions {
    /// Public types and members only.
    #[default]
    Public,
    /// Public and internal.
    Internal,
    /// Everything, including private members.
    All,
}

impl ImportOptions {
    /// Whether a declaration with `accessibility` is imported.
    pub fn admits(self, accessibility: Accessibility) -> bool {
        match self {
            ImportOptions::Public => accessibility == Accessibility::Public,
            ImportOptions::Internal => accessibility != Accessibility::Private,
            ImportOptions::All => true,
        }
    }

    /// A stable tag for context hashing.
    pub fn tag(self) -> u8 {
        match self {
            ImportOptions::Public => 0,
            ImportOptions::Internal => 1,
            ImportOptions::All => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_visibility() {
        assert!(ImportOptions::Public.admits(Accessibility::Public));
        assert!(!ImportOptions::Public.admits(Accessibility::Internal));
        assert!(ImportOptions::Internal.admits(Accessibility::Internal));
        assert!(!ImportOptions::Internal.admits(Accessibility::Private));
        assert!(ImportOptions::All.admits(Accessibility::Private));
    }

    #[test]
    fn tags_are_distinct() {
        let tags = [
            ImportOptions::Public.tag(),
            ImportOptions::Internal.tag(),
            ImportOptions::All.tag(),
        ];
        assert_ne!(tags[0], tags[1]);
        assert_ne!(tags[1], tags[2]);
    }
}
