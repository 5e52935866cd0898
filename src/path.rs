//! Dot-separated state paths.
//!
//! A path addresses a location in the nested state tree: `"a.b.c"`, with
//! `""` naming the root. Array indexers are unwrapped while parsing, so
//! `"items[2].name"` and `"items.2.name"` are the same path. Paths are parsed
//! once at the API boundary and handled as segment lists from then on.

use crate::error::{Result, StateError};
use crate::types::Relation;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// A parsed state path.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(Vec<String>);

impl Path {
    /// The root path (`""`).
    #[inline]
    pub fn root() -> Self {
        Path(Vec::new())
    }

    /// Parse a dot-separated path string.
    ///
    /// Empty segments (`"a..b"`, `".a"`, `"a."`) and malformed indexers are
    /// rejected; only the empty string itself means root.
    pub fn parse(path: &str) -> Result<Self> {
        Ok(Path(split_path(path)?))
    }

    /// Build a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path(segments.into_iter().map(Into::into).collect())
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, `None` for root.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Path without its last segment, `None` for root.
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Append one segment.
    pub fn child(&self, segment: impl Into<String>) -> Path {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Path(segments)
    }

    /// Concatenate two paths.
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Path(segments)
    }

    /// True if `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// True if `other` is a strict prefix of `self`.
    #[inline]
    pub fn is_descendant_of(&self, other: &Path) -> bool {
        other.is_ancestor_of(self)
    }

    /// How a subscriber at `self` relates to a change at `changed`.
    ///
    /// `None` when the two paths are on unrelated branches.
    pub fn relation_to(&self, changed: &Path) -> Option<Relation> {
        if self == changed {
            Some(Relation::This)
        } else if self.is_ancestor_of(changed) {
            Some(Relation::Ancestor)
        } else if self.is_descendant_of(changed) {
            Some(Relation::Descendant)
        } else {
            None
        }
    }

    /// Segments of `self` below `prefix`, if `prefix` is `self` or an ancestor.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<&[String]> {
        if self.0.starts_with(&prefix.0) {
            Some(&self.0[prefix.0.len()..])
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Split a path string into its segments.
///
/// `""` yields no segments. `"a.b[0].c"` yields `["a", "b", "0", "c"]`.
pub fn split_path(path: &str) -> Result<Vec<String>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    for part in path.split(SEPARATOR) {
        if part.is_empty() {
            return Err(StateError::invalid_path(path, "empty segment"));
        }
        split_indexers(path, part, &mut segments)?;
    }
    Ok(segments)
}

/// Split `name[1][2]` into `name`, `1`, `2`.
fn split_indexers(path: &str, part: &str, out: &mut Vec<String>) -> Result<()> {
    let (name, mut rest) = match part.find('[') {
        Some(pos) => part.split_at(pos),
        None => {
            if part.contains(']') {
                return Err(StateError::invalid_path(path, "unbalanced indexer"));
            }
            out.push(part.to_string());
            return Ok(());
        }
    };

    if name.contains(']') {
        return Err(StateError::invalid_path(path, "unbalanced indexer"));
    }
    if !name.is_empty() {
        out.push(name.to_string());
    }

    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .ok_or_else(|| StateError::invalid_path(path, "unbalanced indexer"))?;
        let end = inner
            .find(']')
            .ok_or_else(|| StateError::invalid_path(path, "unbalanced indexer"))?;
        let index = &inner[..end];
        if index.is_empty() || index.contains('[') {
            return Err(StateError::invalid_path(path, "empty indexer"));
        }
        out.push(index.to_string());
        rest = &inner[end + 1..];
    }

    Ok(())
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl TryFrom<&str> for Path {
    type Error = StateError;

    fn try_from(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Path::parse(&s).map_err(serde::de::Error::custom)
    }
}
