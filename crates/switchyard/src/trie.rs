//! Segment trie used to match request paths against wildcard patterns.

use std::collections::HashMap;

use crate::path::WILDCARD;

/// A trie node keyed by path segment.
///
/// Literal children are looked up by exact segment. A node has at most one
/// wildcard child, shared by every pattern with `*` at that depth.
#[derive(Debug, Clone)]
pub struct Node<T> {
    children: HashMap<String, Node<T>>,
    wildcard: Option<Box<Node<T>>>,
    route: Option<T>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            wildcard: None,
            route: None,
        }
    }
}

impl<T: Copy> Node<T> {
    /// Creates an empty root node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a route at the node reached by `segments`, replacing any
    /// route already stored there.
    pub fn insert<S: AsRef<str>>(&mut self, segments: &[S], route: T) {
        let mut node = self;
        for segment in segments {
            let segment = segment.as_ref();
            node = if segment == WILDCARD {
                node.wildcard.get_or_insert_with(Box::default)
            } else {
                node.children.entry(segment.to_string()).or_default()
            };
        }
        node.route = Some(route);
    }

    /// Matches `segments` and returns the route together with the captured
    /// segments.
    ///
    /// Literal children are tried before the wildcard child. When no child
    /// matches and the current node holds a route, the unmatched segments are
    /// appended to the captures.
    pub fn find(&self, segments: &[&str]) -> Option<(T, Vec<String>)> {
        let mut captured = Vec::new();
        self.find_into(segments, &mut captured)
            .map(|route| (route, captured))
    }

    fn find_into(&self, segments: &[&str], captured: &mut Vec<String>) -> Option<T> {
        let Some((first, rest)) = segments.split_first() else {
            return self.route.or_else(|| self.trailing_wildcard());
        };

        let mark = captured.len();
        if let Some(child) = self.children.get(*first) {
            if let Some(route) = child.find_into(rest, captured) {
                return Some(route);
            }
            captured.truncate(mark);
        }

        if let Some(child) = &self.wildcard {
            captured.push((*first).to_string());
            if let Some(route) = child.find_into(rest, captured) {
                return Some(route);
            }
            captured.truncate(mark);
        }

        let route = self.route?;
        captured.extend(segments.iter().map(|s| (*s).to_string()));
        Some(route)
    }

    // Path exhausted: follow wildcard-only links to a route, leaving the
    // trailing parameters uncaptured.
    fn trailing_wildcard(&self) -> Option<T> {
        let mut node = self.wildcard.as_deref()?;
        loop {
            if let Some(route) = node.route {
                return Some(route);
            }
            node = node.wildcard.as_deref()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathPattern;

    fn trie(patterns: &[&str]) -> Node<usize> {
        let mut root = Node::new();
        for (id, pattern) in patterns.iter().enumerate() {
            root.insert(PathPattern::new(pattern).segments(), id);
        }
        root
    }

    fn find(root: &Node<usize>, path: &str) -> Option<(usize, Vec<String>)> {
        let segments: Vec<&str> = crate::path::segments(path).collect();
        root.find(&segments)
    }

    #[test]
    fn test_literal_match() {
        let root = trie(&["users", "users/list", "posts/recent"]);
        assert_eq!(find(&root, "/users/list"), Some((1, vec![])));
        assert_eq!(find(&root, "/posts/recent"), Some((2, vec![])));
        assert_eq!(find(&root, "/posts"), None);
    }

    #[test]
    fn test_wildcard_capture() {
        let root = trie(&["wild/*/wild"]);
        assert_eq!(
            find(&root, "/wild/something/wild"),
            Some((0, vec!["something".to_string()]))
        );
        assert_eq!(find(&root, "/wild/something"), None);
    }

    #[test]
    fn test_literal_wins_over_wildcard() {
        let root = trie(&["user/*", "user/me"]);
        assert_eq!(find(&root, "user/me"), Some((1, vec![])));
        assert_eq!(find(&root, "user/42"), Some((0, vec!["42".to_string()])));
    }

    #[test]
    fn test_backtracks_from_dead_literal_branch() {
        let root = trie(&["a/b/c", "a/*/d"]);
        assert_eq!(find(&root, "a/b/d"), Some((1, vec!["b".to_string()])));
    }

    #[test]
    fn test_leftover_segments_are_captured() {
        let root = trie(&["files"]);
        assert_eq!(
            find(&root, "files/docs/readme.md"),
            Some((0, vec!["docs".to_string(), "readme.md".to_string()]))
        );
    }

    #[test]
    fn test_failed_branch_rolls_back_captures() {
        let root = trie(&["a/*/x", "a"]);
        assert_eq!(
            find(&root, "a/b/y"),
            Some((1, vec!["b".to_string(), "y".to_string()]))
        );
    }

    #[test]
    fn test_trailing_wildcards_are_optional() {
        let root = trie(&["stats/*/details/*/*"]);
        assert_eq!(
            find(&root, "stats/1/details/2"),
            Some((0, vec!["1".to_string(), "2".to_string()]))
        );
        assert_eq!(find(&root, "stats/1"), None);
    }

    #[test]
    fn test_insert_replaces_route() {
        let mut root = trie(&["user/*"]);
        root.insert(PathPattern::new("user/{id}").segments(), 7);
        assert_eq!(find(&root, "user/3").map(|(id, _)| id), Some(7));
    }
}
