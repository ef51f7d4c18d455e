//! Dot-delimited root-to-node key paths.
//!
//! Every operation here works on whole components. Raw substring matching
//! would confuse key `2` with key `22`, so prefix tests always check that the
//! prefix ends on a separator and splicing removes exactly one component.

use std::fmt;
use std::str::FromStr;

use arbor_types::{NodeKey, TypeError};

/// Path of keys from a root down to a node, inclusive, e.g. `"1.5.22"`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterializedPath(String);

impl MaterializedPath {
    pub const SEPARATOR: char = '.';

    /// The path of a root node.
    pub fn root(key: NodeKey) -> Self {
        Self(key.to_string())
    }

    /// The path of `key` as a child of this path.
    pub fn child(&self, key: NodeKey) -> Self {
        Self(format!("{}{}{}", self.0, Self::SEPARATOR, key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Keys from the root down to the node.
    pub fn components(&self) -> impl DoubleEndedIterator<Item = NodeKey> + '_ {
        // Paths are only built from keys, so every component parses.
        self.0
            .split(Self::SEPARATOR)
            .filter_map(|component| component.parse().ok())
    }

    /// Number of components; a root has depth 1.
    pub fn depth(&self) -> usize {
        self.0.split(Self::SEPARATOR).count()
    }

    /// The node this path leads to.
    pub fn leaf(&self) -> Option<NodeKey> {
        self.components().next_back()
    }

    /// The second-to-last component, `None` for a root.
    pub fn parent_key(&self) -> Option<NodeKey> {
        self.components().rev().nth(1)
    }

    /// Ancestors nearest first, excluding the node itself.
    pub fn ancestors(&self) -> Vec<NodeKey> {
        self.components().rev().skip(1).collect()
    }

    /// Whether `self` lies strictly below `other`.
    pub fn is_strict_descendant_of(&self, other: &MaterializedPath) -> bool {
        self.0.len() > other.0.len()
            && self.0.starts_with(&other.0)
            && self.0[other.0.len()..].starts_with(Self::SEPARATOR)
    }

    /// Half-open string range holding exactly the strict descendants of this
    /// path in an ordered index: `["P.", "P/")`, since `/` follows `.`.
    pub fn descendant_range(&self) -> std::ops::Range<String> {
        format!("{}{}", self.0, Self::SEPARATOR)..format!("{}/", self.0)
    }

    /// This path with the component `key` spliced out.
    pub fn without_component(&self, key: NodeKey) -> Self {
        let mut removed = false;
        let kept: Vec<&str> = self
            .0
            .split(Self::SEPARATOR)
            .filter(|component| {
                if !removed && component.parse::<NodeKey>().ok() == Some(key) {
                    removed = true;
                    false
                } else {
                    true
                }
            })
            .collect();
        Self(kept.join("."))
    }

    /// Replace the leading `old_prefix` with `new_prefix`.
    ///
    /// Returns `None` unless this path is `old_prefix` itself or lies
    /// strictly below it.
    pub fn rebase(
        &self,
        old_prefix: &MaterializedPath,
        new_prefix: &MaterializedPath,
    ) -> Option<MaterializedPath> {
        if self == old_prefix {
            return Some(new_prefix.clone());
        }
        if !self.is_strict_descendant_of(old_prefix) {
            return None;
        }
        Some(Self(format!(
            "{}{}",
            new_prefix.0,
            &self.0[old_prefix.0.len()..]
        )))
    }
}

impl FromStr for MaterializedPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for component in s.split(Self::SEPARATOR) {
            component.parse::<NodeKey>()?;
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Debug for MaterializedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaterializedPath({})", self.0)
    }
}

impl fmt::Display for MaterializedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> MaterializedPath {
        s.parse().unwrap()
    }

    fn k(raw: u64) -> NodeKey {
        NodeKey::new(raw)
    }

    #[test]
    fn build_from_keys() {
        let path = MaterializedPath::root(k(1)).child(k(5)).child(k(22));
        assert_eq!(path.as_str(), "1.5.22");
        assert_eq!(path.depth(), 3);
        assert_eq!(path.leaf(), Some(k(22)));
        assert_eq!(path.parent_key(), Some(k(5)));
        assert_eq!(path.ancestors(), vec![k(5), k(1)]);
    }

    #[test]
    fn root_has_no_parent() {
        let root = MaterializedPath::root(k(7));
        assert_eq!(root.parent_key(), None);
        assert!(root.ancestors().is_empty());
    }

    #[test]
    fn descendant_test_respects_component_boundaries() {
        assert!(p("2.3").is_strict_descendant_of(&p("2")));
        assert!(!p("22.3").is_strict_descendant_of(&p("2")));
        assert!(!p("2").is_strict_descendant_of(&p("2")));
        assert!(p("1.2.3").is_strict_descendant_of(&p("1.2")));
        assert!(!p("1.22").is_strict_descendant_of(&p("1.2")));
    }

    #[test]
    fn descendant_range_excludes_numeric_siblings() {
        let range = p("1.2").descendant_range();
        let inside = |s: &str| range.contains(&s.to_string());
        assert!(inside("1.2.3"));
        assert!(inside("1.2.99.4"));
        assert!(!inside("1.2"));
        assert!(!inside("1.22"));
        assert!(!inside("1.22.3"));
        assert!(!inside("1.3"));
    }

    #[test]
    fn splice_removes_whole_component_only() {
        assert_eq!(p("1.22.2.5").without_component(k(2)), p("1.22.5"));
        assert_eq!(p("2.22").without_component(k(2)), p("22"));
        assert_eq!(p("12.2.21").without_component(k(2)), p("12.21"));
    }

    #[test]
    fn rebase_swaps_prefix_on_boundary() {
        let old = p("1.2");
        let new = p("4.2");
        assert_eq!(p("1.2").rebase(&old, &new), Some(p("4.2")));
        assert_eq!(p("1.2.3.9").rebase(&old, &new), Some(p("4.2.3.9")));
        assert_eq!(p("1.22.3").rebase(&old, &new), None);
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        assert!("".parse::<MaterializedPath>().is_err());
        assert!("1..2".parse::<MaterializedPath>().is_err());
        assert!("1.x".parse::<MaterializedPath>().is_err());
    }
}
