//! Metadata images and the process-wide metadata cache.
//!
//! A metadata image is the parsed form of one compiled unit (an assembly with
//! its manifest and linked modules) or of one standalone module. Images are
//! stored on disk in a small binary format with an integrity header, decoded
//! by [`decode_image`], and shared between compilations by [`MetadataCache`],
//! which holds both the images and the symbol wrappers built over them weakly
//! and compacts dead entries.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod format;
pub mod image;

pub use cache::{CacheStats, CompactionHandle, EntrySnapshot, MetadataCache, WrapperContext};
pub use error::MetadataError;
pub use format::{decode_image, encode_image, read_image, write_image};
pub use image::{
    Accessibility, AssemblyDef, FieldDef, GenericOwner, ImageKind, MetadataImage, MethodDef,
    ModuleDef, ParamDef, TypeDef, TypeRef, TypeScope,
};
