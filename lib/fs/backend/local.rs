//! [`LocalBackend`]: a [`Backend`] over a directory of the host filesystem.
//!
//! Identities are handed out on first sight of a path and stay stable for the
//! backend's lifetime. The path-to-id and id-to-path maps are concurrent
//! `scc::HashMap`s; allocations that touch both are serialized by a
//! coordination lock so the two maps never disagree.

use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Backend, BackendError, NameId, RootRecord};
use crate::fs::name_cmp::CaseSensitivity;
use crate::fs::{FileAttributes, FileId};

/// Configuration of a [`LocalBackend`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LocalBackendConfig {
    /// How names are matched. Set to `insensitive` for filesystems that fold
    /// case (the default APFS and NTFS setups).
    pub case_sensitivity: CaseSensitivity,

    /// When non-empty, children may only be materialized inside these roots
    /// or on the way to them.
    pub allowed_roots: Vec<PathBuf>,
}

/// Backend serving a directory tree from disk.
pub struct LocalBackend {
    root: PathBuf,
    config: LocalBackendConfig,
    /// path -> id
    ids: scc::HashMap<PathBuf, FileId>,
    /// id -> path
    paths: scc::HashMap<FileId, PathBuf>,
    next_id: AtomicU32,
    /// Serializes id allocation across both maps.
    mu: Mutex<()>,
}

impl LocalBackend {
    /// Opens a backend rooted at `root`.
    ///
    /// # Errors
    ///
    /// Fails if `root` cannot be canonicalized or is not a directory.
    pub fn new(root: impl AsRef<Path>, config: LocalBackendConfig) -> Result<Self, BackendError> {
        let root = fs::canonicalize(root)?;
        if !fs::metadata(&root)?.is_dir() {
            return Err(BackendError::Io(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            )));
        }
        let allowed_roots = config
            .allowed_roots
            .iter()
            .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
            .collect();
        let backend = Self {
            root: root.clone(),
            config: LocalBackendConfig {
                allowed_roots,
                ..config
            },
            ids: scc::HashMap::new(),
            paths: scc::HashMap::new(),
            next_id: AtomicU32::new(1),
            mu: Mutex::new(()),
        };
        backend.id_for(&root)?;
        Ok(backend)
    }

    /// The canonical root directory.
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Path of the file with identity `id`, if it was ever handed out.
    #[must_use]
    pub fn path_of(&self, id: FileId) -> Option<PathBuf> {
        self.paths.read_sync(&id, |_, p| p.clone())
    }

    fn id_for(&self, path: &Path) -> Result<FileId, BackendError> {
        if let Some(id) = self.ids.read_sync(path, |_, &id| id) {
            return Ok(id);
        }
        let _guard = self
            .mu
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match self.ids.entry_sync(path.to_path_buf()) {
            scc::hash_map::Entry::Occupied(occ) => Ok(*occ.get()),
            scc::hash_map::Entry::Vacant(vac) => {
                // Allocation is serialized by `mu`. The counter wraps to 0
                // after `u32::MAX` is handed out, and 0 is never an id.
                let raw = self.next_id.load(Ordering::Relaxed);
                let id = FileId::new(raw).ok_or(BackendError::IdsExhausted)?;
                self.next_id.store(raw.wrapping_add(1), Ordering::Relaxed);
                vac.insert_entry(id);
                let _ = self.paths.insert_sync(id, path.to_path_buf());
                Ok(id)
            }
        }
    }

    fn parent_path(&self, parent: FileId) -> Result<PathBuf, BackendError> {
        self.path_of(parent)
            .ok_or(BackendError::UnknownParent(parent))
    }

    fn check_access(&self, path: &Path) -> Result<(), BackendError> {
        let roots = &self.config.allowed_roots;
        if roots.is_empty()
            || roots
                .iter()
                .any(|root| path.starts_with(root) || root.starts_with(path))
        {
            Ok(())
        } else {
            Err(BackendError::AccessDenied {
                path: path.to_path_buf(),
            })
        }
    }

    /// Locate the on-disk entry for `name` under `parent`, honoring the
    /// configured case policy. `None` if there is no such entry or `name`
    /// is not a single path component.
    fn locate(
        &self,
        parent: FileId,
        name: &str,
        case: CaseSensitivity,
    ) -> Result<Option<(PathBuf, Metadata)>, BackendError> {
        if !is_plain_component(name) {
            return Ok(None);
        }
        let dir = self.parent_path(parent)?;
        let name = if case.is_sensitive() {
            name.to_owned()
        } else {
            match find_case_insensitive(&dir, name)? {
                Some(found) => found,
                None => return Ok(None),
            }
        };
        let path = dir.join(&name);
        match fs::symlink_metadata(&path) {
            Ok(meta) => {
                self.check_access(&path)?;
                Ok(Some((path, meta)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Backend for LocalBackend {
    fn case_sensitivity(&self) -> CaseSensitivity {
        self.config.case_sensitivity
    }

    fn root(&self) -> Result<RootRecord, BackendError> {
        let name = self
            .root
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("/")
            .to_owned();
        Ok(RootRecord {
            id: self.id_for(&self.root)?,
            name,
        })
    }

    fn resolve_child_id(
        &self,
        parent: FileId,
        name: &str,
        case: CaseSensitivity,
    ) -> Result<Option<FileId>, BackendError> {
        self.locate(parent, name, case)?
            .map(|(path, _)| self.id_for(&path))
            .transpose()
    }

    fn attributes(
        &self,
        parent: FileId,
        name: &str,
    ) -> Result<Option<FileAttributes>, BackendError> {
        Ok(self
            .locate(parent, name, self.config.case_sensitivity)?
            .map(|(path, meta)| attributes_of(&path, &meta)))
    }

    fn canonical_name(&self, parent: FileId, name: &str) -> Result<String, BackendError> {
        if !is_plain_component(name) {
            return Ok(name.to_owned());
        }
        let dir = self.parent_path(parent)?;
        Ok(find_case_insensitive(&dir, name)?.unwrap_or_else(|| name.to_owned()))
    }

    fn list_all(&self, parent: FileId) -> Result<Vec<NameId>, BackendError> {
        let dir = self.parent_path(parent)?;
        let mut listing = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                debug!(dir = %dir.display(), "skipping non-UTF-8 entry");
                continue;
            };
            let path = entry.path();
            if self.check_access(&path).is_err() {
                continue;
            }
            listing.push(NameId {
                id: self.id_for(&path)?,
                name,
            });
        }
        Ok(listing)
    }

    fn name_of(&self, id: FileId) -> Result<Option<String>, BackendError> {
        Ok(self
            .path_of(id)
            .and_then(|p| p.file_name().and_then(OsStr::to_str).map(str::to_owned)))
    }
}

fn is_plain_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == OsStr::new(name)
    )
}

/// The on-disk spelling of `name` in `dir`, preferring an exact match.
///
/// Scans the directory rather than probing `dir/name`: a case-folding host
/// filesystem would accept any casing of the name.
fn find_case_insensitive(dir: &Path, name: &str) -> Result<Option<String>, BackendError> {
    let mut folded = None;
    for entry in fs::read_dir(dir)? {
        let Ok(candidate) = entry?.file_name().into_string() else {
            continue;
        };
        if candidate == name {
            return Ok(Some(candidate));
        }
        if folded.is_none() && CaseSensitivity::Insensitive.eq(&candidate, name) {
            folded = Some(candidate);
        }
    }
    Ok(folded)
}

fn attributes_of(path: &Path, meta: &Metadata) -> FileAttributes {
    let file_type = meta.file_type();
    let mut attributes = FileAttributes::empty();
    if file_type.is_dir() {
        attributes |= FileAttributes::DIRECTORY;
    } else if file_type.is_symlink() {
        attributes |= FileAttributes::SYMLINK;
    } else if !file_type.is_file() {
        attributes |= FileAttributes::SPECIAL;
    }
    if meta.permissions().readonly() {
        attributes |= FileAttributes::READ_ONLY;
    }
    if path
        .file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|n| n.starts_with('.'))
    {
        attributes |= FileAttributes::HIDDEN;
    }
    attributes
}
