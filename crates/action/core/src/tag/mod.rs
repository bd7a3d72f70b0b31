//! Hierarchical gameplay tags.
//!
//! Tags are dot-separated identifiers (`Phase.Action.Begin`) used for phase
//! names, event names and state markers. Only equality and hierarchy
//! containment are meaningful: `State.Stunned.Hard` matches `State.Stunned`.

mod count;
pub mod names;

pub use count::TagCountContainer;

use std::fmt;
use std::sync::Arc;

/// Opaque hierarchical identifier. Cloning is cheap.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameplayTag(Arc<str>);

impl GameplayTag {
    /// Creates a tag from its dotted name. Surrounding whitespace is trimmed.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref().trim()))
    }

    /// The empty tag. Never matches anything, including itself as a parent.
    pub fn empty() -> Self {
        Self(Arc::from(""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    /// Returns true if `self` equals `parent` or lives underneath it.
    pub fn matches_tag(&self, parent: &GameplayTag) -> bool {
        if !self.is_valid() || !parent.is_valid() {
            return false;
        }
        let me = self.as_str();
        let parent = parent.as_str();
        me == parent
            || (me.len() > parent.len()
                && me.starts_with(parent)
                && me.as_bytes()[parent.len()] == b'.')
    }

    /// The immediate parent tag, if any (`A.B.C` -> `A.B`).
    pub fn parent(&self) -> Option<GameplayTag> {
        self.as_str()
            .rsplit_once('.')
            .map(|(parent, _)| GameplayTag::new(parent))
    }
}

impl Default for GameplayTag {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for GameplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.as_str())
    }
}

impl fmt::Display for GameplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for GameplayTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for GameplayTag {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for GameplayTag {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for GameplayTag {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for GameplayTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for GameplayTag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = <String as serde::Deserialize>::deserialize(deserializer)?;
        Ok(GameplayTag::new(name))
    }
}

/// Ordered set of explicit tags.
///
/// Queries are hierarchical: a container holding `State.Stunned.Hard`
/// answers `has_tag(State.Stunned)` with true. Use [`Self::has_tag_exact`]
/// for strict membership.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TagContainer {
    tags: Vec<GameplayTag>,
}

impl TagContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag. Invalid tags and duplicates are ignored.
    pub fn add(&mut self, tag: GameplayTag) {
        if tag.is_valid() && !self.has_tag_exact(&tag) {
            self.tags.push(tag);
        }
    }

    /// Builder form of [`Self::add`].
    #[must_use]
    pub fn with(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.add(tag.into());
        self
    }

    pub fn remove(&mut self, tag: &GameplayTag) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        before != self.tags.len()
    }

    pub fn has_tag(&self, query: &GameplayTag) -> bool {
        self.tags.iter().any(|t| t.matches_tag(query))
    }

    pub fn has_tag_exact(&self, query: &GameplayTag) -> bool {
        self.tags.iter().any(|t| t == query)
    }

    /// True if any tag of `other` is matched by this container.
    /// An empty `other` never matches.
    pub fn has_any(&self, other: &TagContainer) -> bool {
        other.iter().any(|t| self.has_tag(t))
    }

    /// True if every tag of `other` is matched. An empty `other` always matches.
    pub fn has_all(&self, other: &TagContainer) -> bool {
        other.iter().all(|t| self.has_tag(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameplayTag> + '_ {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<GameplayTag> for TagContainer {
    fn from_iter<I: IntoIterator<Item = GameplayTag>>(iter: I) -> Self {
        let mut container = TagContainer::new();
        for tag in iter {
            container.add(tag);
        }
        container
    }
}

impl<'a> IntoIterator for &'a TagContainer {
    type Item = &'a GameplayTag;
    type IntoIter = std::slice::Iter<'a, GameplayTag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl fmt::Display for TagContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{tag}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_parent_and_self() {
        let tag = GameplayTag::new("State.Stunned.Hard");
        assert!(tag.matches_tag(&GameplayTag::new("State.Stunned")));
        assert!(tag.matches_tag(&GameplayTag::new("State")));
        assert!(tag.matches_tag(&tag.clone()));
    }

    #[test]
    fn does_not_match_name_prefix_without_separator() {
        let tag = GameplayTag::new("State.StunnedHard");
        assert!(!tag.matches_tag(&GameplayTag::new("State.Stunned")));
        assert!(!GameplayTag::new("State").matches_tag(&GameplayTag::new("State.Stunned")));
    }

    #[test]
    fn empty_tag_never_matches() {
        assert!(!GameplayTag::empty().matches_tag(&GameplayTag::empty()));
        assert!(!GameplayTag::new("A").matches_tag(&GameplayTag::empty()));
    }

    #[test]
    fn container_queries_are_hierarchical() {
        let container = TagContainer::new()
            .with("Action.Skill.Cryoseism")
            .with("State.Casting");

        assert!(container.has_tag(&"Action.Skill".into()));
        assert!(!container.has_tag_exact(&"Action.Skill".into()));
        assert!(container.has_any(&TagContainer::new().with("State").with("Other")));
        assert!(!container.has_all(&TagContainer::new().with("State").with("Other")));
        assert!(container.has_all(&TagContainer::new()));
        assert!(!container.has_any(&TagContainer::new()));
    }

    #[test]
    fn container_ignores_duplicates_and_invalid() {
        let mut container = TagContainer::new();
        container.add("A.B".into());
        container.add("A.B".into());
        container.add(GameplayTag::empty());
        assert_eq!(container.len(), 1);
        assert!(container.remove(&"A.B".into()));
        assert!(container.is_empty());
    }

    #[test]
    fn parent_walks_one_level() {
        assert_eq!(
            GameplayTag::new("Phase.Action.Begin").parent(),
            Some(GameplayTag::new("Phase.Action"))
        );
        assert_eq!(GameplayTag::new("Phase").parent(), None);
    }
}
