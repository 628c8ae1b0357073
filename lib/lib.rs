//! vfs-dircache shared library.

/// Directory tree, children caches, and backends.
pub mod fs;
/// Synchronization primitives, swappable for loom models.
pub mod sync;
