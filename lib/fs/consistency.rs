//! Structural checks for two-zone children arrays.
//!
//! Mutations call [`debug_assert_consistent`] on every freshly built array
//! before publishing it. A violation is an internal defect, never a condition
//! callers can recover from, so debug builds panic on it. Release builds skip
//! the walk entirely.
//!
//! Resolved identities are always non-zero because [`FileId`](super::FileId)
//! cannot represent zero, so that invariant needs no runtime check.

use std::cmp::Ordering;

use thiserror::Error;

use super::dual_zone::ZoneEntry;
use super::name_cmp::CaseSensitivity;

/// A broken children-array invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    /// A resolved entry follows a negative one.
    #[error("resolved entry {name:?} at index {index} follows the negative zone")]
    ZoneOrder {
        /// Index of the misplaced entry.
        index: usize,
        /// Its name.
        name: String,
    },

    /// Two entries of the same zone compare equal.
    #[error("entry {name:?} at index {index} duplicates its predecessor")]
    Duplicate {
        /// Index of the second occurrence.
        index: usize,
        /// The duplicated name.
        name: String,
    },

    /// An entry sorts before its predecessor within the same zone.
    #[error("entry {name:?} at index {index} is out of order")]
    Unsorted {
        /// Index of the out-of-order entry.
        index: usize,
        /// Its name.
        name: String,
    },

    /// A name is cached as both present and absent.
    #[error("name {name:?} is cached in both zones")]
    Shadowed {
        /// The contradictory name.
        name: String,
    },

    /// The directory is fully loaded but still remembers absent names.
    #[error("fully loaded directory still holds {count} negative entries")]
    NegativeWhileLoaded {
        /// Size of the negative zone.
        count: usize,
    },
}

/// Validate zone partitioning, per-zone ordering and uniqueness, and the
/// fully-loaded rule for `entries`.
///
/// # Errors
///
/// Returns the first violation found, scanning from the front.
pub fn check<E: ZoneEntry>(
    entries: &[E],
    cmp: CaseSensitivity,
    all_loaded: bool,
) -> Result<(), ConsistencyError> {
    let boundary = entries
        .iter()
        .position(ZoneEntry::is_negative)
        .unwrap_or(entries.len());
    if let Some((offset, stray)) = entries[boundary..]
        .iter()
        .enumerate()
        .find(|(_, e)| !e.is_negative())
    {
        return Err(ConsistencyError::ZoneOrder {
            index: boundary + offset,
            name: stray.name().to_owned(),
        });
    }

    for (index, pair) in entries.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        if prev.is_negative() != cur.is_negative() {
            continue;
        }
        match cmp.compare(cur.name(), prev.name()) {
            Ordering::Greater => {}
            Ordering::Equal => {
                return Err(ConsistencyError::Duplicate {
                    index: index + 1,
                    name: cur.name().to_owned(),
                });
            }
            Ordering::Less => {
                return Err(ConsistencyError::Unsorted {
                    index: index + 1,
                    name: cur.name().to_owned(),
                });
            }
        }
    }

    let (resolved, negative) = entries.split_at(boundary);
    if all_loaded && !negative.is_empty() {
        return Err(ConsistencyError::NegativeWhileLoaded {
            count: negative.len(),
        });
    }
    if let Some(shadowed) = negative.iter().find(|n| {
        resolved
            .binary_search_by(|r| cmp.compare(r.name(), n.name()))
            .is_ok()
    }) {
        return Err(ConsistencyError::Shadowed {
            name: shadowed.name().to_owned(),
        });
    }

    Ok(())
}

/// Panics with the violation if `entries` is inconsistent. No-op in release
/// builds.
pub(crate) fn debug_assert_consistent<E: ZoneEntry>(
    entries: &[E],
    cmp: CaseSensitivity,
    all_loaded: bool,
) {
    if cfg!(debug_assertions)
        && let Err(e) = check(entries, cmp, all_loaded)
    {
        panic!("children array is inconsistent: {e}");
    }
}
