#![allow(dead_code, missing_docs, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use vfs_dircache::fs::backend::{Backend, BackendError, NameId, RootRecord};
use vfs_dircache::fs::{CaseSensitivity, FileAttributes, FileId, Vfs};

pub const ROOT: u32 = 1;

pub fn fid(raw: u32) -> FileId {
    FileId::new_unchecked(raw)
}

#[derive(Debug, Clone)]
struct MockEntry {
    name: String,
    id: FileId,
    attributes: FileAttributes,
}

/// In-memory backend that counts every call it receives.
///
/// Directories are keyed by id; the root is [`ROOT`]. Mutations through
/// [`MockBackend::add`] and [`MockBackend::remove`] are invisible to a tree
/// until it asks the backend again.
pub struct MockBackend {
    case: CaseSensitivity,
    dirs: Mutex<HashMap<FileId, Vec<MockEntry>>>,
    failing: AtomicBool,
    pub resolve_calls: AtomicUsize,
    pub attribute_calls: AtomicUsize,
    pub canonical_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub name_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new(case: CaseSensitivity) -> Self {
        let mut dirs = HashMap::new();
        dirs.insert(fid(ROOT), Vec::new());
        Self {
            case,
            dirs: Mutex::new(dirs),
            failing: AtomicBool::new(false),
            resolve_calls: AtomicUsize::new(0),
            attribute_calls: AtomicUsize::new(0),
            canonical_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            name_calls: AtomicUsize::new(0),
        }
    }

    /// Adds a child. Directories get an empty listing of their own.
    pub fn add(&self, parent: u32, name: &str, id: u32, directory: bool) -> &Self {
        let attributes = if directory {
            FileAttributes::DIRECTORY
        } else {
            FileAttributes::empty()
        };
        let mut dirs = self.dirs.lock().unwrap();
        dirs.get_mut(&fid(parent)).unwrap().push(MockEntry {
            name: name.to_owned(),
            id: fid(id),
            attributes,
        });
        if directory {
            dirs.entry(fid(id)).or_default();
        }
        self
    }

    pub fn remove(&self, parent: u32, name: &str) {
        let mut dirs = self.dirs.lock().unwrap();
        dirs.get_mut(&fid(parent))
            .unwrap()
            .retain(|e| !self.case.eq(&e.name, name));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn resolves(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Total number of calls of any kind.
    pub fn total_calls(&self) -> usize {
        [
            &self.resolve_calls,
            &self.attribute_calls,
            &self.canonical_calls,
            &self.list_calls,
            &self.name_calls,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    fn check_failing(&self) -> Result<(), BackendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Io(std::io::Error::other("backend offline")));
        }
        Ok(())
    }

    fn find(&self, parent: FileId, name: &str, case: CaseSensitivity) -> Result<Option<MockEntry>, BackendError> {
        self.check_failing()?;
        let dirs = self.dirs.lock().unwrap();
        let entries = dirs.get(&parent).ok_or(BackendError::UnknownParent(parent))?;
        Ok(entries.iter().find(|e| case.eq(&e.name, name)).cloned())
    }
}

impl Backend for MockBackend {
    fn case_sensitivity(&self) -> CaseSensitivity {
        self.case
    }

    fn root(&self) -> Result<RootRecord, BackendError> {
        Ok(RootRecord {
            id: fid(ROOT),
            name: "root".to_owned(),
        })
    }

    fn resolve_child_id(
        &self,
        parent: FileId,
        name: &str,
        case: CaseSensitivity,
    ) -> Result<Option<FileId>, BackendError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.find(parent, name, case)?.map(|e| e.id))
    }

    fn attributes(&self, parent: FileId, name: &str) -> Result<Option<FileAttributes>, BackendError> {
        self.attribute_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.find(parent, name, self.case)?.map(|e| e.attributes))
    }

    fn canonical_name(&self, parent: FileId, name: &str) -> Result<String, BackendError> {
        self.canonical_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .find(parent, name, CaseSensitivity::Insensitive)?
            .map_or_else(|| name.to_owned(), |e| e.name))
    }

    fn list_all(&self, parent: FileId) -> Result<Vec<NameId>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        let dirs = self.dirs.lock().unwrap();
        let entries = dirs.get(&parent).ok_or(BackendError::UnknownParent(parent))?;
        // Reverse so callers cannot rely on backend order.
        Ok(entries
            .iter()
            .rev()
            .map(|e| NameId {
                name: e.name.clone(),
                id: e.id,
            })
            .collect())
    }

    fn name_of(&self, id: FileId) -> Result<Option<String>, BackendError> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        let dirs = self.dirs.lock().unwrap();
        Ok(dirs
            .values()
            .flatten()
            .find(|e| e.id == id)
            .map(|e| e.name.clone()))
    }
}

/// A backend holding `/src` (dir, 2), `/lib` (dir, 3) and `/src/main.rs`
/// (file, 4).
pub fn sample_backend(case: CaseSensitivity) -> MockBackend {
    let backend = MockBackend::new(case);
    backend
        .add(ROOT, "src", 2, true)
        .add(ROOT, "lib", 3, true)
        .add(2, "main.rs", 4, false);
    backend
}

pub fn sample_vfs(case: CaseSensitivity) -> Vfs<MockBackend> {
    Vfs::new(sample_backend(case), Default::default()).unwrap()
}
