//! Directory children cache and the virtual tree built on top of it.
/// Backend contract and the local-disk adapter.
pub mod backend;
/// Copy-on-write two-zone children array.
pub mod children;
/// Invariant checks for children arrays.
pub mod consistency;
/// Binary search over an array holding two independently sorted zones.
pub mod dual_zone;
/// Name ordering policies.
pub mod name_cmp;
/// Tree nodes.
pub mod node;
/// The virtual tree: lookups, listings and change notifications.
pub mod tree;

pub use backend::{Backend, BackendError, LocalBackend, LocalBackendConfig};
pub use children::{CachedLookup, ChildRef, DirChildren};
pub use name_cmp::CaseSensitivity;
pub use node::{Node, NodeKind};
pub use tree::{Lookup, TreeConfig, Vfs, VfsError};

use std::fmt;
use std::num::NonZeroU32;

use bitflags::bitflags;

/// Stable identity the backend assigns to a file or directory.
///
/// Zero is never a valid identity, which `NonZeroU32` encodes in the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(NonZeroU32);

impl FileId {
    /// Wraps a raw backend id, rejecting the invalid value `0`.
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Wraps a raw id that the caller knows to be non-zero.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is zero.
    #[must_use]
    pub fn new_unchecked(raw: u32) -> Self {
        match NonZeroU32::new(raw) {
            Some(id) => Self(id),
            None => panic!("FileId must be non-zero"),
        }
    }

    /// The raw integer id.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Attributes the backend reports for a child.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileAttributes: u8 {
        /// The entry is a directory.
        const DIRECTORY = 1 << 0;
        /// The entry is a symbolic link.
        const SYMLINK   = 1 << 1;
        /// The entry is neither a regular file nor a directory (fifo, socket, device).
        const SPECIAL   = 1 << 2;
        /// The entry is not writable.
        const READ_ONLY = 1 << 3;
        /// The entry is hidden by filesystem convention.
        const HIDDEN    = 1 << 4;
    }
}

impl FileAttributes {
    /// Whether these attributes describe a directory.
    #[must_use]
    pub fn is_directory(self) -> bool {
        self.contains(Self::DIRECTORY)
    }
}
