//! Path normalization for the cache tree.
//!
//! Every path entering the server is normalized into an [`FsPath`] before it
//! touches the cache: redundant separators collapse, and the canonical key
//! carries no leading or trailing slash, so `/a//b/` and `a/b` resolve to the
//! same cache entry.

use thiserror::Error;

/// Maximum length in bytes of any path accepted from a caller.
///
/// Longer paths are rejected outright rather than truncated.
pub const MAX_PATH_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("path exceeds {MAX_PATH_LEN} bytes (got {0})")]
    TooLong(usize),

    /// `.` and `..` segments are rejected outright; cache keys must name
    /// their entry directly so a key can never alias or escape another.
    #[error("dot segment in path")]
    DotSegment,
}

/// A parsed, canonical filesystem path.
///
/// Immutable once constructed. Equality is structural equality of the
/// canonical key, so two inputs that normalize identically compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsPath {
    full: String,
    parent: Option<String>,
}

impl FsPath {
    /// Parse and normalize `text`.
    ///
    /// Fails if the input is empty (or contains only separators) or exceeds
    /// [`MAX_PATH_LEN`] bytes.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Err(PathError::Empty);
        }
        if text.len() > MAX_PATH_LEN {
            return Err(PathError::TooLong(text.len()));
        }

        let segments: Vec<&str> = text.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            // Input was all separators, e.g. "/" or "///".
            return Err(PathError::Empty);
        }
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(PathError::DotSegment);
        }

        let full = segments.join("/");
        let parent = (segments.len() > 1).then(|| segments[..segments.len() - 1].join("/"));

        Ok(Self { full, parent })
    }

    /// The canonical full-path key.
    #[must_use]
    pub fn full(&self) -> &str {
        &self.full
    }

    /// The canonical key of the containing directory, or `None` when the
    /// path has a single segment (its parent is the cache root).
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

impl std::fmt::Display for FsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_segment_has_no_parent() {
        let p = FsPath::parse("etc").unwrap();
        assert_eq!(p.full(), "etc");
        assert_eq!(p.parent(), None);
    }

    #[test]
    fn nested_path_reports_parent() {
        let p = FsPath::parse("a/b/c").unwrap();
        assert_eq!(p.full(), "a/b/c");
        assert_eq!(p.parent(), Some("a/b"));
    }

    #[test]
    fn separators_collapse() {
        let p = FsPath::parse("//a///b/").unwrap();
        assert_eq!(p.full(), "a/b");
        assert_eq!(p.parent(), Some("a"));
    }

    #[test]
    fn leading_slash_is_not_significant() {
        assert_eq!(
            FsPath::parse("/srv/motd").unwrap(),
            FsPath::parse("srv/motd").unwrap()
        );
    }

    #[test]
    fn empty_input_rejected() {
        assert_eq!(FsPath::parse(""), Err(PathError::Empty));
    }

    #[test]
    fn all_separator_input_rejected() {
        assert_eq!(FsPath::parse("///"), Err(PathError::Empty));
    }

    #[test]
    fn over_length_input_rejected() {
        let long = "x".repeat(MAX_PATH_LEN + 1);
        assert_eq!(
            FsPath::parse(&long),
            Err(PathError::TooLong(MAX_PATH_LEN + 1))
        );
    }

    #[test]
    fn dot_segments_rejected() {
        assert_eq!(FsPath::parse("a/./b"), Err(PathError::DotSegment));
        assert_eq!(FsPath::parse("../etc"), Err(PathError::DotSegment));
    }

    #[test]
    fn exactly_max_length_accepted() {
        let path = "y".repeat(MAX_PATH_LEN);
        assert!(FsPath::parse(&path).is_ok());
    }
}
