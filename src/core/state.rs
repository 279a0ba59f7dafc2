//! Dotted state paths.
//!
//! A process instance is always positioned on a leaf state. Because states
//! nest, the position is a path from the root graph down to that leaf,
//! written with dots: `processing.validate`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between segments of a state path.
pub const PATH_SEPARATOR: char = '.';

/// Location of a state inside a (possibly nested) state graph.
///
/// Paths serialize as their dotted string form.
///
/// # Example
///
/// ```rust
/// use statecraft::core::StatePath;
///
/// let path = StatePath::parse("processing.validate");
/// assert_eq!(path.depth(), 2);
/// assert_eq!(path.leaf(), Some("validate"));
/// assert_eq!(path.parent().to_string(), "processing");
/// assert_eq!(path.to_string(), "processing.validate");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct StatePath {
    segments: Vec<String>,
}

impl StatePath {
    /// The empty path, which addresses the root graph itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path. Empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split(PATH_SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn from_segments<I, T>(segments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Innermost segment, or `None` for the root path.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path of the enclosing state. The parent of a top-level state is the root.
    pub fn parent(&self) -> StatePath {
        self.prefix(self.depth().saturating_sub(1))
    }

    /// The first `len` segments.
    pub fn prefix(&self, len: usize) -> StatePath {
        Self {
            segments: self.segments[..len.min(self.depth())].to_vec(),
        }
    }

    /// New path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> StatePath {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// New path with every segment of `other` appended.
    pub fn join(&self, other: &StatePath) -> StatePath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Number of leading segments shared with `other`.
    pub fn common_prefix_len(&self, other: &StatePath) -> usize {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// True when `self` equals `other` or encloses it.
    pub fn contains(&self, other: &StatePath) -> bool {
        self.depth() <= other.depth() && self.common_prefix_len(other) == self.depth()
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl From<String> for StatePath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&str> for StatePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<StatePath> for String {
    fn from(path: StatePath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_dots() {
        let path = StatePath::parse("a.b.c");
        assert_eq!(path.segments(), &["a", "b", "c"]);
        assert_eq!(path.to_string(), "a.b.c");
    }

    #[test]
    fn parse_drops_empty_segments() {
        assert_eq!(StatePath::parse(".a..b."), StatePath::parse("a.b"));
        assert!(StatePath::parse("").is_root());
    }

    #[test]
    fn parent_of_top_level_is_root() {
        let path = StatePath::parse("idle");
        assert!(path.parent().is_root());
        assert!(StatePath::root().parent().is_root());
    }

    #[test]
    fn common_prefix_stops_at_first_difference() {
        let a = StatePath::parse("processing.validate.deep");
        let b = StatePath::parse("processing.ship");
        assert_eq!(a.common_prefix_len(&b), 1);
        assert_eq!(a.common_prefix_len(&a), 3);
    }

    #[test]
    fn contains_checks_ancestry() {
        let parent = StatePath::parse("processing");
        let child = StatePath::parse("processing.validate");
        assert!(parent.contains(&child));
        assert!(child.contains(&child));
        assert!(!child.contains(&parent));
        assert!(StatePath::root().contains(&child));
    }

    #[test]
    fn path_serializes_as_string() {
        let path = StatePath::parse("processing.validate");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"processing.validate\"");
        let back: StatePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
