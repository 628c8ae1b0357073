use std::fmt;
use std::sync::Arc;

use super::children::{ChildRef, DirChildren};
use super::name_cmp::CaseSensitivity;
use super::{FileAttributes, FileId};
use crate::sync::atomic::{AtomicBool, Ordering};

/// What a node is. Only directories carry a children cache.
#[derive(Debug)]
pub enum NodeKind {
    /// A directory and its cached children.
    Directory(DirChildren),
    /// Anything that cannot have children.
    Regular,
}

/// One file or directory in the virtual tree.
///
/// The parent is referenced by id rather than by pointer; the tree's registry
/// maps it back to a node. Children are owned by the parent's
/// [`DirChildren`] array, so the tree holds no reference cycles.
pub struct Node {
    id: FileId,
    name: Arc<str>,
    parent: Option<FileId>,
    attributes: FileAttributes,
    dirty: AtomicBool,
    kind: NodeKind,
}

impl Node {
    /// Builds a node whose kind follows `attributes`: directories get an empty
    /// children cache ordered by `cmp`.
    #[must_use]
    pub fn new(
        id: FileId,
        name: impl Into<Arc<str>>,
        parent: Option<FileId>,
        attributes: FileAttributes,
        cmp: CaseSensitivity,
    ) -> Self {
        let kind = if attributes.is_directory() {
            NodeKind::Directory(DirChildren::new(cmp))
        } else {
            NodeKind::Regular
        };
        Self {
            id,
            name: name.into(),
            parent,
            attributes,
            dirty: AtomicBool::new(false),
            kind,
        }
    }

    /// Backend identity of this node.
    #[must_use]
    pub fn id(&self) -> FileId {
        self.id
    }

    /// Name of this node inside its parent.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Identity of the parent directory, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<FileId> {
        self.parent
    }

    /// Attributes reported by the backend when the node was materialized.
    #[must_use]
    pub fn attributes(&self) -> FileAttributes {
        self.attributes
    }

    /// Whether this node is a directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    /// The node's kind.
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The children cache, if this node is a directory.
    #[must_use]
    pub fn children(&self) -> Option<&DirChildren> {
        match &self.kind {
            NodeKind::Directory(children) => Some(children),
            NodeKind::Regular => None,
        }
    }

    /// Whether the node has been flagged as needing a refresh.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Flag this node as needing a refresh.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clear the refresh flag.
    pub fn mark_clean(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Flag this node and every cached descendant as needing a refresh.
    ///
    /// Only children already materialized are visited; nothing is fetched.
    pub fn mark_dirty_recursively(&self) {
        self.mark_dirty();
        let Some(children) = self.children() else {
            return;
        };
        for entry in children.snapshot().iter() {
            // Negative entries trail the array.
            let ChildRef::Resolved(child) = entry else {
                break;
            };
            child.mark_dirty_recursively();
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
