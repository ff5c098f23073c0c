//! Opaque ID newtypes.

use crate::arena::ArenaId;
use std::sync::atomic::{AtomicU32, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// Stable handle of one retargeted symbol within its retargeting assembly.
    RetargetedId
);

define_id!(
    /// Process-unique identity of a compilation instance.
    CompilationId
);

static NEXT_COMPILATION: AtomicU32 = AtomicU32::new(1);

impl CompilationId {
    /// Allocates a fresh, never-reused id.
    pub fn next() -> Self {
        Self(NEXT_COMPILATION.fetch_add(1, Ordering::Relaxed))
    }
}
