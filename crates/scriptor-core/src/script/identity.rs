//! Script identity: name, ordering key, content, tags and checksum.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::checksum::checksum;

/// A label attached to scripts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Create a tag with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The tag name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeySegment {
    // Field order drives the derived ordering: shorter significant digit
    // runs are smaller numbers, then digits compare lexicographically, and
    // leading zeros only break ties.
    Number {
        significant_len: usize,
        significant: String,
        raw_len: usize,
    },
    Text(String),
}

/// Ordering key derived from a script name.
///
/// Keys compare naturally: runs of digits by numeric value, everything else
/// lexicographically, so `2_users` sorts before `10_orders`. Two keys are
/// equal only when their raw text is identical.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderingKey {
    segments: Vec<KeySegment>,
    raw: String,
}

impl OrderingKey {
    /// Parse an ordering key from its raw text.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut in_digits = false;

        for c in raw.chars() {
            let is_digit = c.is_ascii_digit();
            if !current.is_empty() && is_digit != in_digits {
                segments.push(Self::segment(std::mem::take(&mut current), in_digits));
            }
            in_digits = is_digit;
            current.push(c);
        }
        if !current.is_empty() {
            segments.push(Self::segment(current, in_digits));
        }

        Self { segments, raw }
    }

    fn segment(run: String, digits: bool) -> KeySegment {
        if digits {
            let significant = run.trim_start_matches('0').to_string();
            KeySegment::Number {
                significant_len: significant.len(),
                significant,
                raw_len: run.len(),
            }
        } else {
            KeySegment::Text(run)
        }
    }

    /// The key text as extracted from the script name.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A discovered change-script. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// File name of the script.
    pub name: String,
    /// Path the script was discovered at.
    pub path: PathBuf,
    /// Position of the script in execution order.
    pub ordering_key: OrderingKey,
    /// Exact content.
    pub content: String,
    /// Tags attached by matchers and folders.
    pub tags: BTreeSet<Tag>,
    /// Checksum of `content`.
    pub checksum: String,
}

impl Script {
    /// Build a script, computing its checksum from `content`.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        ordering_key: OrderingKey,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let checksum = checksum(content.as_bytes());
        Self {
            name: name.into(),
            path: path.into(),
            ordering_key,
            content,
            tags: BTreeSet::new(),
            checksum,
        }
    }

    /// Attach tags.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Check whether the script carries any of the given tags.
    pub fn has_any_tag<'a>(&self, tags: impl IntoIterator<Item = &'a Tag>) -> bool {
        tags.into_iter().any(|t| self.tags.contains(t))
    }

    /// Path of the script as a string with `/` separators.
    pub fn path_str(&self) -> String {
        normalize_path(&self.path)
    }

    /// Execution order: ordering key, then name.
    pub fn execution_order(&self, other: &Script) -> Ordering {
        self.ordering_key
            .cmp(&other.ordering_key)
            .then_with(|| self.name.cmp(&other.name))
    }
}

pub(crate) fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
