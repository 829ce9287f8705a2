//! Structural cache keys.
//!
//! A [`QueryKey`] is an ordered sequence of string segments. Two keys built
//! from equal segments are the same key, so every query issued with
//! `["post", "42"]` shares one cache entry and one in-flight fetch.
//! Invalidation matches by prefix: invalidating `["posts"]` hits
//! `["posts"]`, `["posts", "page", "2"]`, and so on.

use std::fmt;

/// Structural identifier grouping queries that share one cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Appends a segment, e.g. `QueryKey::from("post").join(post_id)`.
    #[must_use]
    pub fn join(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// `true` when `prefix` is a (non-strict) prefix of this key.
    #[must_use]
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl From<&str> for QueryKey {
    fn from(segment: &str) -> Self {
        Self(vec![segment.to_string()])
    }
}

impl From<String> for QueryKey {
    fn from(segment: String) -> Self {
        Self(vec![segment])
    }
}

impl<S: Into<String>> FromIterator<S> for QueryKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = QueryKey::new(["post", "42"]);
        let b = QueryKey::from("post").join("42");
        assert_eq!(a, b);

        let c = QueryKey::new(["post", "43"]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_prefix_matching() {
        let posts = QueryKey::from("posts");
        let paged = QueryKey::new(["posts", "page", "2"]);
        let profile = QueryKey::from("profile");

        assert!(paged.starts_with(&posts));
        assert!(posts.starts_with(&posts), "a key is its own prefix");
        assert!(!profile.starts_with(&posts));
        assert!(!posts.starts_with(&paged), "prefix must not be longer");
    }

    #[test]
    fn test_segment_boundaries_matter() {
        // "postscript" must not match the "posts" prefix.
        let other = QueryKey::from("postscript");
        assert!(!other.starts_with(&QueryKey::from("posts")));
    }

    #[test]
    fn test_display() {
        let key = QueryKey::new(["userPosts", "7"]);
        assert_eq!(key.to_string(), "userPosts/7");
    }
}
