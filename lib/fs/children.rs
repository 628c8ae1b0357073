//! The children cache of one directory.
//!
//! Children live in a single array split into two zones: resolved entries
//! first, negative entries (names confirmed absent) last, each zone sorted by
//! the filesystem's [`CaseSensitivity`]. The array is never mutated in place.
//! Every structural change builds a new array and publishes it under the
//! directory's mutex, so a reader that grabbed a snapshot can search it with
//! no lock held.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::FileId;
use super::consistency::debug_assert_consistent;
use super::dual_zone::{ZoneEntry, ZoneSearch, find_in_both, negative_zone_start};
use super::name_cmp::CaseSensitivity;
use super::node::Node;
use crate::sync::atomic::{AtomicU64, Ordering};
use crate::sync::{Mutex, lock};

/// One slot of a children array.
#[derive(Debug, Clone)]
pub enum ChildRef {
    /// A child known to exist.
    Resolved(Arc<Node>),
    /// A name known not to exist in this directory.
    Negative(Arc<str>),
}

impl ChildRef {
    /// The resolved node, if this is not a negative entry.
    #[must_use]
    pub fn as_resolved(&self) -> Option<&Arc<Node>> {
        match self {
            Self::Resolved(node) => Some(node),
            Self::Negative(_) => None,
        }
    }
}

impl ZoneEntry for ChildRef {
    fn name(&self) -> &str {
        match self {
            Self::Resolved(node) => node.name(),
            Self::Negative(name) => name,
        }
    }

    fn is_negative(&self) -> bool {
        matches!(self, Self::Negative(_))
    }
}

/// Answer of a cache-only lookup.
#[derive(Debug, Clone)]
pub enum CachedLookup {
    /// The child is cached.
    Resolved(Arc<Node>),
    /// The name is known to be absent.
    Negative,
    /// The cache cannot tell; the backend has to be asked.
    Unknown,
}

struct ChildrenState {
    entries: Arc<[ChildRef]>,
    all_loaded: bool,
}

/// Copy-on-write children array of a directory.
pub struct DirChildren {
    cmp: CaseSensitivity,
    state: Mutex<ChildrenState>,
    /// Bumped on every published change, so a listing fetched without the
    /// lock can tell whether it raced with a mutation.
    generation: AtomicU64,
}

impl DirChildren {
    /// Creates an empty, not-yet-loaded children cache.
    #[must_use]
    pub fn new(cmp: CaseSensitivity) -> Self {
        Self {
            cmp,
            state: Mutex::new(ChildrenState {
                entries: Arc::from(Vec::new()),
                all_loaded: false,
            }),
            generation: AtomicU64::new(0),
        }
    }

    /// Name ordering used by this array.
    #[must_use]
    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.cmp
    }

    /// The currently published array.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[ChildRef]> {
        Arc::clone(&lock(&self.state).entries)
    }

    fn snapshot_with_flag(&self) -> (Arc<[ChildRef]>, bool) {
        let state = lock(&self.state);
        (Arc::clone(&state.entries), state.all_loaded)
    }

    /// Whether the resolved zone is a complete listing of the directory.
    #[must_use]
    pub fn all_loaded(&self) -> bool {
        lock(&self.state).all_loaded
    }

    /// Counter of published changes.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Answer a lookup for `name` from the cache alone.
    ///
    /// The search runs on a snapshot after the lock is released.
    #[must_use]
    pub fn find_cached(&self, name: &str) -> CachedLookup {
        if name.is_empty() {
            return CachedLookup::Negative;
        }
        let (entries, all_loaded) = self.snapshot_with_flag();
        Self::classify(&entries, find_in_both(&entries, name, self.cmp), all_loaded)
    }

    fn classify(entries: &[ChildRef], found: ZoneSearch, all_loaded: bool) -> CachedLookup {
        if found.negative_index().is_some() {
            return CachedLookup::Negative;
        }
        if let Some(i) = found.resolved_index()
            && let ChildRef::Resolved(node) = &entries[i]
        {
            return CachedLookup::Resolved(Arc::clone(node));
        }
        if all_loaded {
            CachedLookup::Negative
        } else {
            CachedLookup::Unknown
        }
    }

    /// The resolved zone, in name order.
    #[must_use]
    pub fn resolved(&self) -> Vec<Arc<Node>> {
        let entries = self.snapshot();
        entries[..negative_zone_start(&entries)]
            .iter()
            .filter_map(ChildRef::as_resolved)
            .cloned()
            .collect()
    }

    /// Names currently cached as absent, in name order.
    #[must_use]
    pub fn negative_names(&self) -> Vec<Arc<str>> {
        let entries = self.snapshot();
        entries[negative_zone_start(&entries)..]
            .iter()
            .filter_map(|e| match e {
                ChildRef::Negative(name) => Some(Arc::clone(name)),
                ChildRef::Resolved(_) => None,
            })
            .collect()
    }

    /// The cached child with identity `id`, if any.
    #[must_use]
    pub fn find_by_id(&self, id: FileId) -> Option<Arc<Node>> {
        self.snapshot()
            .iter()
            .filter_map(ChildRef::as_resolved)
            .find(|node| node.id() == id)
            .cloned()
    }

    /// Adds a resolved child, replacing a negative entry for the same name.
    ///
    /// If a resolved child with that name is already cached it is kept and
    /// returned; `child` is dropped. Otherwise `child` is returned.
    pub fn insert(&self, child: Arc<Node>) -> Arc<Node> {
        let mut state = lock(&self.state);
        let found = find_in_both(&state.entries, child.name(), self.cmp);
        if let Some(i) = found.resolved_index()
            && let ChildRef::Resolved(existing) = &state.entries[i]
        {
            return Arc::clone(existing);
        }

        let mut entries = Arc::clone(&state.entries);
        if let Some(i) = found.negative_index() {
            entries = excise(&entries, i);
        }
        self.publish_with(&mut state, entries, found.resolved, child)
    }

    /// Second half of the double-check protocol: caches `child` unless the
    /// array changed for its name while the backend was being queried.
    ///
    /// A concurrently cached child wins over `child`. A concurrently recorded
    /// absence (the child was deleted meanwhile) wins too, and `Negative` is
    /// returned.
    pub fn insert_if_unknown(&self, child: Arc<Node>) -> CachedLookup {
        let mut state = lock(&self.state);
        let found = find_in_both(&state.entries, child.name(), self.cmp);
        match Self::classify(&state.entries, found, state.all_loaded) {
            resolved @ CachedLookup::Resolved(_) => return resolved,
            CachedLookup::Negative if !state.all_loaded => return CachedLookup::Negative,
            // A listing installed meanwhile that misses this child predates
            // its creation; the backend answer is newer.
            CachedLookup::Negative | CachedLookup::Unknown => {}
        }
        let entries = Arc::clone(&state.entries);
        CachedLookup::Resolved(self.publish_with(&mut state, entries, found.resolved, child))
    }

    /// Records that `name` does not exist, unless the array changed for that
    /// name in the meantime.
    ///
    /// Nothing is recorded for a fully loaded directory: its resolved zone
    /// already answers every absence.
    pub fn insert_negative(&self, name: &str) -> CachedLookup {
        if name.is_empty() {
            return CachedLookup::Negative;
        }
        let mut state = lock(&self.state);
        let found = find_in_both(&state.entries, name, self.cmp);
        match Self::classify(&state.entries, found, state.all_loaded) {
            CachedLookup::Unknown => {}
            decided => return decided,
        }
        let Err(at) = found.negative else {
            return CachedLookup::Negative;
        };
        let entries = splice(&state.entries, at, ChildRef::Negative(Arc::from(name)));
        self.publish(&mut state, entries);
        trace!(name, "cached absent name");
        CachedLookup::Negative
    }

    /// Removes the cached child with `child`'s name and identity.
    ///
    /// When `cache_absence` is set and the directory is not fully loaded, the
    /// name is then recorded as negative so the next lookup for it is served
    /// from the cache. Returns whether a child was removed.
    pub fn remove(&self, child: &Node, cache_absence: bool) -> bool {
        let mut state = lock(&self.state);
        let found = find_in_both(&state.entries, child.name(), self.cmp);

        let mut entries = Arc::clone(&state.entries);
        let mut removed = false;
        if let Some(i) = found.resolved_index()
            && let ChildRef::Resolved(existing) = &entries[i]
            && existing.id() == child.id()
        {
            entries = excise(&entries, i);
            removed = true;
        }

        // A different child cached under the same name keeps it resolved.
        let still_present = !removed && found.resolved_index().is_some();
        if cache_absence
            && !still_present
            && !state.all_loaded
            && found.negative_index().is_none()
        {
            // Excising a resolved entry shifts the negative zone left.
            let at = find_in_both(&entries, child.name(), self.cmp)
                .negative
                .unwrap_or_else(|i| i);
            entries = splice(&entries, at, ChildRef::Negative(child.shared_name()));
        }

        if !Arc::ptr_eq(&entries, &state.entries) {
            self.publish(&mut state, entries);
        }
        removed
    }

    /// Marks the resolved zone as a complete listing.
    ///
    /// The negative zone is purged here rather than left for lookups to
    /// ignore, so a fully loaded array never carries negative entries.
    pub fn mark_all_loaded(&self) {
        let mut state = lock(&self.state);
        state.all_loaded = true;
        let boundary = negative_zone_start(&state.entries);
        let entries = if boundary == state.entries.len() {
            Arc::clone(&state.entries)
        } else {
            Arc::from(&state.entries[..boundary])
        };
        self.publish(&mut state, entries);
    }

    /// Installs a complete, name-sorted listing of resolved children and marks
    /// the directory fully loaded.
    ///
    /// The listing is rejected, and `false` returned, if any change was
    /// published since `expected_generation` was read: the listing may then
    /// miss that change.
    pub fn install_listing(&self, listing: &[Arc<Node>], expected_generation: u64) -> bool {
        let mut state = lock(&self.state);
        if self.generation.load(Ordering::Acquire) != expected_generation {
            return false;
        }
        state.all_loaded = true;
        let entries: Arc<[ChildRef]> = listing
            .iter()
            .map(|node| ChildRef::Resolved(Arc::clone(node)))
            .collect();
        self.publish(&mut state, entries);
        true
    }

    /// Drops every cached entry and the fully-loaded flag.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.all_loaded = false;
        self.publish(&mut state, Arc::from(Vec::new()));
    }

    fn publish_with(
        &self,
        state: &mut ChildrenState,
        entries: Arc<[ChildRef]>,
        resolved_slot: Result<usize, usize>,
        child: Arc<Node>,
    ) -> Arc<Node> {
        // The resolved insertion point is unaffected by removals from the
        // negative zone, which always sits to its right.
        let at = resolved_slot.unwrap_or_else(|i| i);
        let entries = splice(&entries, at, ChildRef::Resolved(Arc::clone(&child)));
        self.publish(state, entries);
        child
    }

    fn publish(&self, state: &mut ChildrenState, entries: Arc<[ChildRef]>) {
        debug_assert_consistent(&entries, self.cmp, state.all_loaded);
        state.entries = entries;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for DirChildren {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (entries, all_loaded) = self.snapshot_with_flag();
        f.debug_struct("DirChildren")
            .field("cmp", &self.cmp)
            .field("len", &entries.len())
            .field("all_loaded", &all_loaded)
            .finish()
    }
}

/// A copy of `entries` with `entry` inserted at `at`.
fn splice(entries: &[ChildRef], at: usize, entry: ChildRef) -> Arc<[ChildRef]> {
    let mut grown = Vec::with_capacity(entries.len() + 1);
    grown.extend_from_slice(&entries[..at]);
    grown.push(entry);
    grown.extend_from_slice(&entries[at..]);
    Arc::from(grown)
}

/// A copy of `entries` without the element at `at`.
fn excise(entries: &[ChildRef], at: usize) -> Arc<[ChildRef]> {
    let mut shrunk = Vec::with_capacity(entries.len().saturating_sub(1));
    shrunk.extend_from_slice(&entries[..at]);
    shrunk.extend_from_slice(&entries[at + 1..]);
    Arc::from(shrunk)
}
