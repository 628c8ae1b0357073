//! The authoritative source of child identities.
//!
//! The tree never calls a [`Backend`] while holding a directory lock, so
//! implementations are free to block on I/O.

/// Backend over a real directory on disk.
pub mod local;

pub use local::{LocalBackend, LocalBackendConfig};

use std::path::PathBuf;

use thiserror::Error;

use super::name_cmp::CaseSensitivity;
use super::{FileAttributes, FileId};

/// A child as reported by a full directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameId {
    /// Child name, in the filesystem's casing.
    pub name: String,
    /// Child identity.
    pub id: FileId,
}

/// Identity and name of a backend's root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRecord {
    /// Root identity.
    pub id: FileId,
    /// Display name of the root.
    pub name: String,
}

/// Failures a backend can report. None of them are ever cached.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The underlying store failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The parent identity is not known to the backend.
    #[error("unknown parent {0}")]
    UnknownParent(FileId),

    /// Every identity the backend can hand out is taken.
    #[error("file identities exhausted")]
    IdsExhausted,

    /// The child lies outside the roots the backend is allowed to expose.
    #[error("access outside allowed roots: {}", path.display())]
    AccessDenied {
        /// The rejected path.
        path: PathBuf,
    },
}

/// Ground truth for one filesystem.
pub trait Backend: Send + Sync {
    /// Name ordering of this filesystem.
    fn case_sensitivity(&self) -> CaseSensitivity;

    /// The root directory of the filesystem.
    ///
    /// # Errors
    ///
    /// Fails if the root cannot be read.
    fn root(&self) -> Result<RootRecord, BackendError>;

    /// Identity of the child `name` of `parent`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be queried.
    fn resolve_child_id(
        &self,
        parent: FileId,
        name: &str,
        case: CaseSensitivity,
    ) -> Result<Option<FileId>, BackendError>;

    /// Attributes of the child `name` of `parent`, or `None` if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be queried.
    fn attributes(
        &self,
        parent: FileId,
        name: &str,
    ) -> Result<Option<FileAttributes>, BackendError>;

    /// The filesystem's own casing of `name`. Returns `name` unchanged when
    /// no child matches.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be queried.
    fn canonical_name(&self, parent: FileId, name: &str) -> Result<String, BackendError>;

    /// Every child of `parent`. Order is unspecified; callers sort.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be queried.
    fn list_all(&self, parent: FileId) -> Result<Vec<NameId>, BackendError>;

    /// The name of the file with identity `id`, if the backend knows it.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be queried.
    fn name_of(&self, id: FileId) -> Result<Option<String>, BackendError>;
}
