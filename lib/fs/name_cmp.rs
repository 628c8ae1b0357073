use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// How a filesystem orders and matches child names.
///
/// The policy is fixed per filesystem: every children array of a tree is sorted
/// with the same comparator, and the dual-zone search relies on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseSensitivity {
    /// `Foo` and `foo` are different names.
    #[default]
    Sensitive,
    /// `Foo` and `foo` name the same child.
    Insensitive,
}

impl CaseSensitivity {
    /// Orders `a` relative to `b` under this policy.
    ///
    /// The insensitive ordering compares the lowercase expansion of both names
    /// character by character, so it is total and consistent with equality.
    #[must_use]
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            Self::Sensitive => a.cmp(b),
            Self::Insensitive => a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase)),
        }
    }

    /// Whether `a` and `b` name the same child.
    #[must_use]
    pub fn eq(self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// Whether this policy distinguishes case.
    #[must_use]
    pub fn is_sensitive(self) -> bool {
        matches!(self, Self::Sensitive)
    }
}
