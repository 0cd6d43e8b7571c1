//! Path and pattern normalization.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// The wildcard segment.
pub const WILDCARD: &str = "*";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{[^{}/]*\}$").expect("Invalid placeholder regex"));

/// Splits a path into its non-empty segments.
///
/// Leading, trailing and repeated slashes as well as surrounding spaces are
/// ignored, so `" /users//42/ "` yields `["users", "42"]`.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches(|c: char| c == '/' || c.is_whitespace())
        .split('/')
        .filter(|s| !s.is_empty())
}

/// Normalizes a request path: `"/users//42/"` becomes `"users/42"`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

/// A normalized route pattern.
///
/// Pattern syntax:
/// - `users` - literal segment
/// - `*` - wildcard, captures one segment
/// - `{id}` - named placeholder, normalized to `*` (the name is not kept)
///
/// # Example
///
/// ```
/// use switchyard::PathPattern;
///
/// let pattern = PathPattern::new("/posts/{id}/comments/*/");
/// assert_eq!(pattern.as_str(), "posts/*/comments/*");
/// assert_eq!(pattern.wildcards(), 2);
/// assert!(!pattern.is_static());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern {
    pattern: String,
    segments: Vec<String>,
    wildcards: usize,
}

impl PathPattern {
    /// Parses and normalizes a pattern string.
    pub fn new(pattern: &str) -> Self {
        let segments: Vec<String> = segments(pattern)
            .map(|s| {
                if PLACEHOLDER.is_match(s) {
                    WILDCARD.to_string()
                } else {
                    s.to_string()
                }
            })
            .collect();
        Self::from_segments(segments)
    }

    fn from_segments(segments: Vec<String>) -> Self {
        let wildcards = segments.iter().filter(|s| *s == WILDCARD).count();
        Self {
            pattern: segments.join("/"),
            segments,
            wildcards,
        }
    }

    /// Returns the normalized pattern string.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Returns the normalized segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the number of wildcard segments.
    pub const fn wildcards(&self) -> usize {
        self.wildcards
    }

    /// Returns `true` when the pattern has no wildcard.
    pub const fn is_static(&self) -> bool {
        self.wildcards == 0
    }

    /// Returns `true` when `prefix` matches the leading segments of this pattern.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Appends the segments of `suffix`.
    #[must_use]
    pub fn join(&self, suffix: &Self) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(suffix.segments.iter().cloned());
        Self::from_segments(segments)
    }

    /// Removes `prefix` from the front of the pattern, if present.
    pub fn strip_prefix(&self, prefix: &Self) -> Option<Self> {
        self.segments
            .strip_prefix(prefix.segments.as_slice())
            .map(|rest| Self::from_segments(rest.to_vec()))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = PathPattern::new("/users/");
        assert_eq!(pattern.as_str(), "users");
        assert!(pattern.is_static());
    }

    #[test]
    fn test_named_placeholders_become_wildcards() {
        assert_eq!(PathPattern::new("/user/{id}").as_str(), "user/*");
        assert_eq!(PathPattern::new("/user/{client.id}").as_str(), "user/*");
        assert_eq!(PathPattern::new("/user/{.}").as_str(), "user/*");
        assert_eq!(
            PathPattern::new("/user/{id}/{action}").as_str(),
            PathPattern::new("/user/*/*").as_str()
        );
    }

    #[test]
    fn test_partial_placeholder_is_literal() {
        let pattern = PathPattern::new("/files/v{version}");
        assert_eq!(pattern.as_str(), "files/v{version}");
        assert_eq!(pattern.wildcards(), 0);
    }

    #[test]
    fn test_root_pattern() {
        let pattern = PathPattern::new(" / ");
        assert_eq!(pattern.as_str(), "");
        assert!(pattern.segments().is_empty());
        assert_eq!(pattern.to_string(), "/");
    }

    #[test]
    fn test_prefix_operations() {
        let base = PathPattern::new("dashboard");
        let full = PathPattern::new("/dashboard/stats/*");
        assert!(full.starts_with(&base));
        assert!(!base.starts_with(&full));
        assert_eq!(full.strip_prefix(&base).unwrap().as_str(), "stats/*");
        assert!(base.strip_prefix(&full).is_none());
        assert_eq!(base.join(&PathPattern::new("profile")).as_str(), "dashboard/profile");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(" /users//42/ "), "users/42");
        assert_eq!(normalize_path("/"), "");
        assert_eq!(segments("a/b/c").count(), 3);
    }
}
