//! A children array stores resolved entries first and negative entries last,
//! each zone sorted on its own. [`find_in_both`] locates a name in both zones
//! with a single descent instead of two full binary searches.

use std::cmp::Ordering;

use super::name_cmp::CaseSensitivity;

/// An element of a two-zone array.
pub trait ZoneEntry {
    /// The name the entry is sorted by.
    fn name(&self) -> &str;

    /// Whether the entry belongs to the negative (trailing) zone.
    fn is_negative(&self) -> bool;
}

/// Position of a name in each zone.
///
/// Each field follows the [`slice::binary_search`] convention: `Ok(i)` when the
/// name is stored at index `i`, `Err(i)` with the index at which inserting it
/// keeps that zone sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneSearch {
    /// Result within the resolved zone.
    pub resolved: Result<usize, usize>,
    /// Result within the negative zone.
    pub negative: Result<usize, usize>,
}

impl ZoneSearch {
    /// Index of the name in the resolved zone, if present.
    #[must_use]
    pub fn resolved_index(&self) -> Option<usize> {
        self.resolved.ok()
    }

    /// Index of the name in the negative zone, if present.
    #[must_use]
    pub fn negative_index(&self) -> Option<usize> {
        self.negative.ok()
    }
}

/// Index of the first negative entry, or `entries.len()` if there is none.
pub fn negative_zone_start<E: ZoneEntry>(entries: &[E]) -> usize {
    entries.partition_point(|e| !e.is_negative())
}

/// Binary search for `key` inside `entries[lo..hi]`, restricted to one zone.
///
/// Entries of the other zone that fall inside the range are ordered as if they
/// sat outside it: resolved entries sort before everything negative, negative
/// entries after everything resolved.
fn search_zone<E: ZoneEntry>(
    entries: &[E],
    lo: usize,
    hi: usize,
    negative_zone: bool,
    key: &str,
    cmp: CaseSensitivity,
) -> Result<usize, usize> {
    entries[lo..hi]
        .binary_search_by(|entry| match (negative_zone, entry.is_negative()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => cmp.compare(entry.name(), key),
        })
        .map(|i| i + lo)
        .map_err(|i| i + lo)
}

/// Locates `key` in both zones of `entries`.
///
/// When the array holds a single zone this is one ordinary binary search; the
/// empty zone reports an insertion point at its natural end. When both zones
/// are present the search descends until an entry tells on which side of it
/// each zone's answer lies, then finishes with one bounded search per zone.
pub fn find_in_both<E: ZoneEntry>(entries: &[E], key: &str, cmp: CaseSensitivity) -> ZoneSearch {
    let len = entries.len();
    let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
        return ZoneSearch {
            resolved: Err(0),
            negative: Err(0),
        };
    };

    if first.is_negative() == last.is_negative() {
        let found = search_zone(entries, 0, len, first.is_negative(), key, cmp);
        return if first.is_negative() {
            ZoneSearch {
                resolved: Err(0),
                negative: found,
            }
        } else {
            ZoneSearch {
                resolved: found,
                negative: Err(len),
            }
        };
    }

    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let pivot = &entries[mid];
        let negative = pivot.is_negative();
        match (negative, cmp.compare(key, pivot.name())) {
            (true, Ordering::Equal) => {
                return ZoneSearch {
                    resolved: search_zone(entries, lo, mid, false, key, cmp),
                    negative: Ok(mid),
                };
            }
            (false, Ordering::Equal) => {
                return ZoneSearch {
                    resolved: Ok(mid),
                    negative: search_zone(entries, mid + 1, hi, true, key, cmp),
                };
            }
            // The zones' answers lie on opposite sides of `mid`.
            (false, Ordering::Less) | (true, Ordering::Greater) => {
                return ZoneSearch {
                    resolved: search_zone(entries, lo, mid, false, key, cmp),
                    negative: search_zone(entries, mid + 1, hi, true, key, cmp),
                };
            }
            (false, Ordering::Greater) => lo = mid + 1,
            (true, Ordering::Less) => hi = mid,
        }
    }

    // Everything left of `lo` is resolved and smaller than `key`, everything
    // from `lo` on is negative and larger: `lo` is the zone boundary.
    ZoneSearch {
        resolved: Err(lo),
        negative: Err(lo),
    }
}
