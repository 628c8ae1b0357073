//! [`Vfs`]: a tree of directory nodes resolved lazily through a [`Backend`].
//!
//! Lookups follow a double-check protocol. The children cache is searched
//! first; on a miss the directory lock is released, the backend is queried,
//! and the answer is re-validated against the cache under the lock before it
//! is inserted. Backend calls therefore never block lookups of sibling names,
//! and two threads racing on the same name end up sharing one node.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use super::backend::{Backend, BackendError};
use super::children::{CachedLookup, DirChildren};
use super::name_cmp::CaseSensitivity;
use super::node::Node;
use super::{FileAttributes, FileId};

/// Behavior knobs of a [`Vfs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TreeConfig {
    /// Ask the backend for the true casing of a name before caching it.
    /// Only consulted on case-insensitive filesystems.
    pub canonicalize_names: bool,

    /// After a child is removed, remember its name as absent.
    pub cache_removed_names: bool,

    /// Flag newly materialized children as dirty.
    pub mark_new_files_dirty: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            canonicalize_names: true,
            cache_removed_names: true,
            mark_new_files_dirty: false,
        }
    }
}

/// Errors surfaced by tree operations.
#[derive(Debug, Error)]
pub enum VfsError {
    /// The backend failed. Nothing was cached for the request.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A directory operation was attempted on a regular node.
    #[error("{0} is not a directory")]
    NotADirectory(FileId),

    /// A node's ancestor is no longer reachable from the registry.
    #[error("node {0} is not attached to the tree")]
    Detached(FileId),
}

/// Answer of [`Vfs::lookup`].
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The child exists.
    Resolved(Arc<Node>),
    /// The child does not exist.
    Negative,
}

impl Lookup {
    /// The resolved node, if any.
    #[must_use]
    pub fn into_node(self) -> Option<Arc<Node>> {
        match self {
            Self::Resolved(node) => Some(node),
            Self::Negative => None,
        }
    }

    /// Whether the child does not exist.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        matches!(self, Self::Negative)
    }
}

/// The virtual tree.
pub struct Vfs<B> {
    backend: B,
    config: TreeConfig,
    cmp: CaseSensitivity,
    root: Arc<Node>,
    /// id -> node. Weak so that children arrays stay the only owners.
    registry: scc::HashMap<FileId, Weak<Node>>,
}

impl<B: Backend> Vfs<B> {
    /// Builds a tree over `backend`, materializing only its root.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot report its root.
    pub fn new(backend: B, config: TreeConfig) -> Result<Self, VfsError> {
        let cmp = backend.case_sensitivity();
        let record = backend.root()?;
        let root = Arc::new(Node::new(
            record.id,
            record.name,
            None,
            FileAttributes::DIRECTORY,
            cmp,
        ));
        let registry = scc::HashMap::new();
        let _ = registry.insert_sync(root.id(), Arc::downgrade(&root));
        Ok(Self {
            backend,
            config,
            cmp,
            root,
            registry,
        })
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    /// The backend this tree resolves through.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Name ordering of the underlying filesystem.
    #[must_use]
    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.cmp
    }

    /// The live node with identity `id`, if it is materialized.
    #[must_use]
    pub fn node(&self, id: FileId) -> Option<Arc<Node>> {
        self.registry.read_sync(&id, |_, weak| weak.upgrade()).flatten()
    }

    fn dir_children(dir: &Node) -> Result<&DirChildren, VfsError> {
        dir.children().ok_or(VfsError::NotADirectory(dir.id()))
    }

    fn register(&self, node: &Arc<Node>) {
        self.registry.upsert_sync(node.id(), Arc::downgrade(node));
    }

    fn unregister(&self, node: &Node) {
        let _ = self.registry.remove_if_sync(&node.id(), |weak| {
            weak.upgrade()
                .is_none_or(|live| std::ptr::eq(Arc::as_ptr(&live), node))
        });
    }

    /// Unregisters `node` and every cached descendant. Negative entries hold
    /// no node and are skipped.
    fn unregister_subtree(&self, node: &Node) {
        self.unregister(node);
        if let Some(children) = node.children() {
            for child in children.resolved() {
                self.unregister_subtree(&child);
            }
        }
    }

    /// Number of identities currently in the node registry.
    #[must_use]
    pub fn registered_len(&self) -> usize {
        self.registry.len()
    }

    /// Builds a child node of `dir`. The node is not cached until it is passed
    /// to [`add_child`](Self::add_child).
    #[must_use]
    pub fn new_child(
        &self,
        dir: &Node,
        id: FileId,
        name: &str,
        attributes: FileAttributes,
    ) -> Arc<Node> {
        let child = Node::new(id, name, Some(dir.id()), attributes, self.cmp);
        if self.config.mark_new_files_dirty {
            child.mark_dirty();
        }
        Arc::new(child)
    }

    /// Answer a lookup from the cache alone. Never calls the backend.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory.
    pub fn find_child_if_cached(&self, dir: &Node, name: &str) -> Result<CachedLookup, VfsError> {
        let children = Self::dir_children(dir)?;
        if !is_valid_name(name) {
            return Ok(CachedLookup::Negative);
        }
        Ok(children.find_cached(name))
    }

    /// Resolve the child `name` of `dir`, asking the backend on a cache miss.
    ///
    /// Both answers are cached: a found child as a resolved entry, a missing
    /// one as a negative entry. Backend failures are returned and leave the
    /// cache untouched.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory or the backend fails.
    pub fn lookup(&self, dir: &Node, name: &str) -> Result<Lookup, VfsError> {
        self.find_child(dir, name, self.config.canonicalize_names)
    }

    #[instrument(name = "Vfs::find_child", skip(self, dir), fields(dir = %dir.id()))]
    fn find_child(&self, dir: &Node, name: &str, canonicalize: bool) -> Result<Lookup, VfsError> {
        let children = Self::dir_children(dir)?;
        if !is_valid_name(name) {
            return Ok(Lookup::Negative);
        }
        match children.find_cached(name) {
            CachedLookup::Resolved(node) => {
                trace!("cache hit");
                return Ok(Lookup::Resolved(node));
            }
            CachedLookup::Negative => {
                trace!("negative cache hit");
                return Ok(Lookup::Negative);
            }
            CachedLookup::Unknown => {}
        }

        // No directory lock is held from here until the re-check below.
        let query = if canonicalize && !self.cmp.is_sensitive() {
            self.backend
                .canonical_name(dir.id(), name)
                .inspect_err(|e| warn!(error = %e, "canonical name lookup failed"))?
        } else {
            name.to_owned()
        };
        let found = self
            .backend
            .resolve_child_id(dir.id(), &query, self.cmp)
            .inspect_err(|e| warn!(error = %e, "backend resolve failed"))?;
        let attributes = match found {
            Some(_) => self.backend.attributes(dir.id(), &query)?,
            None => None,
        };

        let (Some(id), Some(attributes)) = (found, attributes) else {
            debug!("backend reports no such child");
            return Ok(match children.insert_negative(name) {
                CachedLookup::Resolved(node) => Lookup::Resolved(node),
                CachedLookup::Negative | CachedLookup::Unknown => Lookup::Negative,
            });
        };

        let child = self.new_child(dir, id, &query, attributes);
        match children.insert_if_unknown(child) {
            CachedLookup::Resolved(node) => {
                self.register(&node);
                debug!(child = %node.id(), "materialized child");
                Ok(Lookup::Resolved(node))
            }
            CachedLookup::Negative | CachedLookup::Unknown => {
                debug!("child removed while resolving");
                Ok(Lookup::Negative)
            }
        }
    }

    /// Resolve a `/`-separated path relative to `dir`.
    ///
    /// Empty components and `.` are skipped. Resolution stops with
    /// [`Lookup::Negative`] at the first missing component or at a regular
    /// node that still has components left.
    ///
    /// # Errors
    ///
    /// Fails if the backend fails.
    pub fn lookup_path(&self, dir: &Arc<Node>, path: &str) -> Result<Lookup, VfsError> {
        let mut current = Arc::clone(dir);
        for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
            if !current.is_directory() {
                return Ok(Lookup::Negative);
            }
            match self.lookup(&current, component)? {
                Lookup::Resolved(next) => current = next,
                Lookup::Negative => return Ok(Lookup::Negative),
            }
        }
        Ok(Lookup::Resolved(current))
    }

    /// The cached children of `dir`, in name order. Never calls the backend.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory.
    pub fn children(&self, dir: &Node) -> Result<Vec<Arc<Node>>, VfsError> {
        Ok(Self::dir_children(dir)?.resolved())
    }

    /// Every child of `dir`, in name order.
    ///
    /// A fully loaded directory answers from the cache. Otherwise the backend
    /// listing is merged with the cached children, reusing nodes already
    /// materialized, and installed as the complete listing. If the directory
    /// changed while the listing was fetched the merged listing is returned
    /// but not installed.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory or the backend fails.
    #[instrument(name = "Vfs::refresh_children", skip(self, dir), fields(dir = %dir.id()))]
    pub fn refresh_children(&self, dir: &Node) -> Result<Vec<Arc<Node>>, VfsError> {
        let children = Self::dir_children(dir)?;
        if children.all_loaded() {
            return Ok(children.resolved());
        }

        let generation = children.generation();
        let mut listing = self
            .backend
            .list_all(dir.id())
            .inspect_err(|e| warn!(error = %e, "backend listing failed"))?;
        listing.sort_by(|a, b| self.cmp.compare(&a.name, &b.name));
        listing.dedup_by(|a, b| self.cmp.eq(&a.name, &b.name));

        let cached = children.resolved();
        let mut cached_iter = cached.iter().peekable();
        let mut merged = Vec::with_capacity(listing.len());
        for entry in &listing {
            while cached_iter
                .next_if(|node| self.cmp.compare(node.name(), &entry.name).is_lt())
                .is_some()
            {}
            let reusable = cached_iter
                .next_if(|node| self.cmp.eq(node.name(), &entry.name))
                .filter(|node| node.id() == entry.id);
            if let Some(node) = reusable {
                merged.push(Arc::clone(node));
                continue;
            }
            // Vanished between the listing and this call.
            let Some(attributes) = self.backend.attributes(dir.id(), &entry.name)? else {
                continue;
            };
            merged.push(self.new_child(dir, entry.id, &entry.name, attributes));
        }

        if children.install_listing(&merged, generation) {
            for node in &merged {
                self.register(node);
            }
            // Cached children the listing did not reuse are gone from the array.
            let kept: HashSet<*const Node> = merged.iter().map(Arc::as_ptr).collect();
            for stale in cached.iter().filter(|n| !kept.contains(&Arc::as_ptr(*n))) {
                self.unregister_subtree(stale);
            }
            debug!(count = merged.len(), "installed full listing");
        } else {
            debug!("directory changed during listing; not installing");
        }
        Ok(merged)
    }

    /// Adds `child` to `dir`, replacing a cached absence of its name. Called
    /// when the backend reports a creation.
    ///
    /// Returns the cached node, which is an existing one if a child with that
    /// name was already cached.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory.
    pub fn add_child(&self, dir: &Node, child: Arc<Node>) -> Result<Arc<Node>, VfsError> {
        let node = Self::dir_children(dir)?.insert(child);
        self.register(&node);
        Ok(node)
    }

    /// Removes `child` from `dir`. Called when the backend reports a deletion.
    ///
    /// With [`TreeConfig::cache_removed_names`] set the name is remembered as
    /// absent afterwards. Returns whether the child was cached.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory.
    pub fn remove_child(&self, dir: &Node, child: &Node) -> Result<bool, VfsError> {
        let removed =
            Self::dir_children(dir)?.remove(child, self.config.cache_removed_names);
        if removed {
            self.unregister_subtree(child);
        }
        Ok(removed)
    }

    /// Forgets every cached child of `dir`, resolved or negative, and the
    /// fully-loaded flag. The next lookup asks the backend again.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory.
    pub fn clear_children(&self, dir: &Node) -> Result<(), VfsError> {
        let children = Self::dir_children(dir)?;
        let dropped = children.resolved();
        children.clear();
        for node in &dropped {
            self.unregister_subtree(node);
        }
        Ok(())
    }

    /// Declares the cached children of `dir` to be its complete listing.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory.
    pub fn mark_all_loaded(&self, dir: &Node) -> Result<(), VfsError> {
        Self::dir_children(dir)?.mark_all_loaded();
        Ok(())
    }

    /// Names cached as absent in `dir`, in name order.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory.
    pub fn negative_names(&self, dir: &Node) -> Result<Vec<Arc<str>>, VfsError> {
        Ok(Self::dir_children(dir)?.negative_names())
    }

    /// The child of `dir` with identity `id`.
    ///
    /// Cached children are scanned first. Unless `cached_only` is set, the
    /// backend is then asked for the name behind `id` and a regular lookup
    /// runs on it; the result only counts if it resolves to `id`.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory or the backend fails.
    pub fn find_child_by_id(
        &self,
        dir: &Node,
        id: FileId,
        cached_only: bool,
    ) -> Result<Option<Arc<Node>>, VfsError> {
        let children = Self::dir_children(dir)?;
        if let Some(node) = children.find_by_id(id) {
            return Ok(Some(node));
        }
        if cached_only {
            return Ok(None);
        }
        let Some(name) = self.backend.name_of(id)? else {
            return Ok(None);
        };
        Ok(self
            .find_child(dir, &name, false)?
            .into_node()
            .filter(|node| node.id() == id))
    }

    /// Like [`lookup`](Self::lookup), but re-checks the backend instead of
    /// trusting the cache.
    ///
    /// A cached absence is verified and, if the child now exists, the child
    /// is added under its canonical name. A cached child is verified too: it
    /// is dropped if it disappeared, and replaced if it changed between file
    /// and directory.
    ///
    /// # Errors
    ///
    /// Fails if `dir` is not a directory or the backend fails.
    #[instrument(name = "Vfs::refresh_and_find_child", skip(self, dir), fields(dir = %dir.id()))]
    pub fn refresh_and_find_child(
        &self,
        dir: &Node,
        name: &str,
    ) -> Result<Option<Arc<Node>>, VfsError> {
        match self.find_child(dir, name, true)? {
            Lookup::Negative => self.materialize_created(dir, name),
            Lookup::Resolved(node) => match self.backend.attributes(dir.id(), node.name())? {
                None => {
                    debug!(child = %node.id(), "cached child is gone");
                    self.remove_child(dir, &node)?;
                    Ok(None)
                }
                Some(attributes) if attributes.is_directory() != node.is_directory() => {
                    debug!(child = %node.id(), "cached child changed kind");
                    self.remove_child(dir, &node)?;
                    self.materialize_created(dir, node.name())
                }
                Some(_) => Ok(Some(node)),
            },
        }
    }

    fn materialize_created(&self, dir: &Node, name: &str) -> Result<Option<Arc<Node>>, VfsError> {
        if !is_valid_name(name) {
            return Ok(None);
        }
        let Some(attributes) = self.backend.attributes(dir.id(), name)? else {
            return Ok(None);
        };
        let real_name = self.backend.canonical_name(dir.id(), name)?;
        let Some(id) = self
            .backend
            .resolve_child_id(dir.id(), &real_name, self.cmp)?
        else {
            return Ok(None);
        };
        let child = self.new_child(dir, id, &real_name, attributes);
        debug!(child = %id, name = %real_name, "adding created child");
        self.add_child(dir, child).map(Some)
    }

    /// `/`-separated path of `node` from the root. The root itself is `/`.
    ///
    /// # Errors
    ///
    /// Fails if an ancestor of `node` is no longer materialized.
    pub fn path_of(&self, node: &Node) -> Result<String, VfsError> {
        let mut names = Vec::new();
        let mut parent = node.parent();
        let mut name = node.shared_name();
        while let Some(parent_id) = parent {
            names.push(name);
            let ancestor = self.node(parent_id).ok_or(VfsError::Detached(parent_id))?;
            parent = ancestor.parent();
            name = ancestor.shared_name();
        }
        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}

/// Whether `name` can name a single child: non-empty, no separator or NUL,
/// and not a relative-path marker.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\0'])
}
