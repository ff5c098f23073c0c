//! Structured diagnostics produced while binding references.
//!
//! This crate provides [`Diagnostic`] values with severity levels, codes and
//! a [`Location`] naming the reference or use site they concern. The
//! thread-safe [`DiagnosticSink`] accumulates them during a resolve pass.
//! Rendering is left to consumers; [`Diagnostic`] implements `Display` for
//! a one-line summary.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::{Diagnostic, Location};
pub use severity::Severity;
pub use sink::DiagnosticSink;
