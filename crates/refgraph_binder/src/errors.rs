//! Diagnostic codes and helper functions for reference binding.
//!
//! Error codes `E001`--`E005` are reported while binding a compilation's
//! reference list. `E006`--`E009` and `W001` describe unresolved or unified
//! dependencies and are produced on demand, when a consumer asks about a
//! unification or uses a symbol that could not be resolved.

use refgraph_common::AssemblyIdentity;
use refgraph_diagnostics::{Diagnostic, DiagnosticCode, Location};

/// Referenced metadata file does not exist.
pub const E001: DiagnosticCode = DiagnosticCode::error(1);

/// Referenced content is not a valid metadata image of the expected kind.
pub const E002: DiagnosticCode = DiagnosticCode::error(2);

/// Two direct references supply different identities for one simple name.
pub const E003: DiagnosticCode = DiagnosticCode::error(3);

/// Duplicate references disagree on embedding interop types.
pub const E004: DiagnosticCode = DiagnosticCode::error(4);

/// Two modules of the compilation's assembly share a name.
pub const E005: DiagnosticCode = DiagnosticCode::error(5);

/// A bound unit references a higher version than the one bound.
pub const E006: DiagnosticCode = DiagnosticCode::error(6);

/// An assembly required by a used symbol was not supplied.
pub const E007: DiagnosticCode = DiagnosticCode::error(7);

/// A type is absent from the assembly expected to define it.
pub const E008: DiagnosticCode = DiagnosticCode::error(8);

/// A predefined type is not defined by any referenced assembly.
pub const E009: DiagnosticCode = DiagnosticCode::error(9);

/// A bound unit's reference was unified to a higher version.
pub const W001: DiagnosticCode = DiagnosticCode::warning(1);

/// Creates a diagnostic for a metadata file that does not exist.
pub fn error_file_not_found(reference: &str, location: Location) -> Diagnostic {
    Diagnostic::error(E001, format!("metadata file `{reference}` could not be found"), location)
}

/// Creates a diagnostic for unreadable or malformed metadata.
pub fn error_bad_image(reference: &str, reason: &str, location: Location) -> Diagnostic {
    Diagnostic::error(
        E002,
        format!("metadata file `{reference}` could not be opened: {reason}"),
        location,
    )
}

/// Creates a diagnostic for conflicting identities under one simple name.
pub fn error_conflicting_identity(
    rejected: &AssemblyIdentity,
    chosen: &AssemblyIdentity,
    location: Location,
) -> Diagnostic {
    Diagnostic::error(
        E003,
        format!(
            "duplicate reference for assembly `{}`: `{rejected}` conflicts with `{chosen}`",
            chosen.name()
        ),
        location,
    )
    .with_note(format!("`{chosen}` is used"))
    .with_help("remove one of the references or reference a single version")
}

/// Creates a diagnostic for duplicates that disagree on interop embedding.
pub fn error_embed_interop_mismatch(
    identity: &AssemblyIdentity,
    first: &str,
    second: &str,
    location: Location,
) -> Diagnostic {
    Diagnostic::error(
        E004,
        format!("assembly `{identity}` is specified both as linked and as referenced"),
        location,
    )
    .with_note(format!("references `{first}` and `{second}` disagree on embedding interop types"))
}

/// Creates a diagnostic for a module name already used in the assembly.
pub fn error_duplicate_module(name: &str, location: Location) -> Diagnostic {
    Diagnostic::error(
        E005,
        format!("module `{name}` is already defined in this assembly"),
        location,
    )
    .with_help("each linked module must have a unique name")
}

/// Creates a diagnostic for a reference bound to a lower version than requested.
pub fn error_higher_version_referenced(
    referencing: &AssemblyIdentity,
    requested: &AssemblyIdentity,
    bound: &AssemblyIdentity,
) -> Diagnostic {
    Diagnostic::error(
        E006,
        format!(
            "`{referencing}` uses `{requested}` which has a higher version than referenced assembly `{bound}`"
        ),
        Location::None,
    )
}

/// Creates a warning for a reference unified to a higher version.
pub fn warn_unified_to_higher(
    referencing: &AssemblyIdentity,
    requested: &AssemblyIdentity,
    bound: &AssemblyIdentity,
) -> Diagnostic {
    Diagnostic::warning(
        W001,
        format!("assuming `{requested}` used by `{referencing}` matches `{bound}`"),
        Location::None,
    )
    .with_note("you may need to supply runtime policy")
}

/// Creates a diagnostic for a used symbol whose assembly is missing.
pub fn error_unresolved_assembly(identity: &AssemblyIdentity, use_site: &str) -> Diagnostic {
    Diagnostic::error(
        E007,
        format!("the type `{use_site}` is defined in assembly `{identity}`, which is not referenced"),
        Location::UseSite(use_site.to_string()),
    )
    .with_help(format!("add a reference to `{}`", identity.name()))
}

/// Creates a diagnostic for a type absent from its expected assembly.
pub fn error_missing_type(type_name: &str, assembly: Option<&AssemblyIdentity>, use_site: &str) -> Diagnostic {
    let message = match assembly {
        Some(identity) => format!("missing required type `{type_name}` in `{identity}`"),
        None => format!("the type `{type_name}` could not be found"),
    };
    Diagnostic::error(E008, message, Location::UseSite(use_site.to_string()))
}

/// Creates a diagnostic for an absent predefined type.
pub fn error_missing_predefined_type(type_name: &str) -> Diagnostic {
    Diagnostic::error(
        E009,
        format!("predefined type `{type_name}` is not defined or imported"),
        Location::UseSite(type_name.to_string()),
    )
}
