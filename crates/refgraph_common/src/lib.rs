//! Shared foundational types used across the refgraph reference resolver.
//!
//! This crate provides the identity model for compiled units (assembly names,
//! four-part versions, public-key tokens), the content keys that identify one
//! physical snapshot of a metadata image, and XXH3 content hashing.

#![warn(missing_docs)]

pub mod content_key;
pub mod hash;
pub mod identity;
pub mod version;

pub use content_key::ContentKey;
pub use hash::{ContentHash, ContentHasher};
pub use identity::{AssemblyIdentity, IdentityMatch, ParseKeyTokenError, PublicKeyToken};
pub use version::{ParseVersionError, Version};
