use std::collections::BTreeMap;

use super::{GameplayTag, TagContainer};

/// Tag set with stack counts.
///
/// A tag stays present while its count is positive. The owner's loose tag
/// state and each action's granted-tag ledger are both kept in this form so
/// that removal undoes exactly what was added.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TagCountContainer {
    counts: BTreeMap<GameplayTag, u32>,
}

impl TagCountContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` stacks and returns the new count.
    pub fn add_stack(&mut self, tag: &GameplayTag, count: u32) -> u32 {
        if !tag.is_valid() || count == 0 {
            return self.count(tag);
        }
        let entry = self.counts.entry(tag.clone()).or_insert(0);
        *entry = entry.saturating_add(count);
        *entry
    }

    /// Removes up to `count` stacks and returns the remaining count.
    pub fn remove_stack(&mut self, tag: &GameplayTag, count: u32) -> u32 {
        let Some(entry) = self.counts.get_mut(tag) else {
            return 0;
        };
        *entry = entry.saturating_sub(count);
        let remaining = *entry;
        if remaining == 0 {
            self.counts.remove(tag);
        }
        remaining
    }

    /// Exact stack count for `tag` (no hierarchy).
    pub fn count(&self, tag: &GameplayTag) -> u32 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    /// True if any held tag matches `query` hierarchically.
    pub fn has_matching_tag(&self, query: &GameplayTag) -> bool {
        self.counts.keys().any(|t| t.matches_tag(query))
    }

    pub fn has_any(&self, query: &TagContainer) -> bool {
        query.iter().any(|t| self.has_matching_tag(t))
    }

    pub fn has_all(&self, query: &TagContainer) -> bool {
        query.iter().all(|t| self.has_matching_tag(t))
    }

    /// Tags of `query` that are currently matched.
    pub fn matching(&self, query: &TagContainer) -> TagContainer {
        query
            .iter()
            .filter(|t| self.has_matching_tag(t))
            .cloned()
            .collect()
    }

    /// Tags of `query` that are currently missing.
    pub fn missing(&self, query: &TagContainer) -> TagContainer {
        query
            .iter()
            .filter(|t| !self.has_matching_tag(t))
            .cloned()
            .collect()
    }

    pub fn explicit_tags(&self) -> TagContainer {
        self.counts.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GameplayTag, u32)> + '_ {
        self.counts.iter().map(|(tag, count)| (tag, *count))
    }

    /// Removes every entry, yielding `(tag, count)` pairs.
    pub fn drain(&mut self) -> impl Iterator<Item = (GameplayTag, u32)> {
        std::mem::take(&mut self.counts).into_iter()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_accumulate_and_drain_to_zero() {
        let tag = GameplayTag::new("State.Casting");
        let mut tags = TagCountContainer::new();

        assert_eq!(tags.add_stack(&tag, 2), 2);
        assert_eq!(tags.add_stack(&tag, 1), 3);
        assert_eq!(tags.remove_stack(&tag, 2), 1);
        assert!(tags.has_matching_tag(&"State".into()));
        assert_eq!(tags.remove_stack(&tag, 5), 0);
        assert!(tags.is_empty());
    }

    #[test]
    fn removing_unknown_tag_is_harmless() {
        let mut tags = TagCountContainer::new();
        assert_eq!(tags.remove_stack(&"Missing".into(), 1), 0);
        assert_eq!(tags.add_stack(&GameplayTag::empty(), 3), 0);
    }

    #[test]
    fn matching_and_missing_split_query() {
        let mut tags = TagCountContainer::new();
        tags.add_stack(&"State.Stunned.Hard".into(), 1);
        let query = TagContainer::new().with("State.Stunned").with("State.Rooted");

        assert_eq!(tags.matching(&query), TagContainer::new().with("State.Stunned"));
        assert_eq!(tags.missing(&query), TagContainer::new().with("State.Rooted"));
        assert!(tags.has_any(&query));
        assert!(!tags.has_all(&query));
    }
}
