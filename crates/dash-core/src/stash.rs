//! Transient holding area for layout nodes detached during an editing session
//!
//! Entries are drained FIFO per key: every `put` appends one entry holding the
//! nodes of a single removal, `take_one` hands back the oldest entry. A key whose
//! queue runs empty is deleted, so taking from it again is a plain `None`.

use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::layout::{Item, Section};
use crate::refs::{LocalId, StashKey};

/// Nodes detached by one removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StashedNodes {
    Section(Section),
    Items(Vec<Item>),
}

impl StashedNodes {
    pub fn item_count(&self) -> usize {
        match self {
            StashedNodes::Section(section) => section.items.len(),
            StashedNodes::Items(items) => items.len(),
        }
    }

    pub fn collect_local_ids<'a>(&'a self, out: &mut Vec<&'a LocalId>) {
        let items = match self {
            StashedNodes::Section(section) => &section.items,
            StashedNodes::Items(items) => items,
        };
        for item in items {
            item.collect_local_ids(out);
        }
    }

    /// The stashed items in their original order; a stashed section yields its items
    pub fn into_items(self) -> Vec<Item> {
        match self {
            StashedNodes::Section(section) => section.items,
            StashedNodes::Items(items) => items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stash {
    entries: IndexMap<StashKey, VecDeque<StashedNodes>>,
}

impl Stash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry under `key`. Never overwrites earlier entries.
    pub fn put(&mut self, key: StashKey, nodes: StashedNodes) {
        tracing::debug!("Stashing {} items under '{}'", nodes.item_count(), key);
        self.entries.entry(key).or_default().push_back(nodes);
    }

    /// Remove and return the oldest entry under `key`
    pub fn take_one(&mut self, key: &StashKey) -> Option<StashedNodes> {
        let queue = self.entries.get_mut(key)?;
        let taken = queue.pop_front();
        if queue.is_empty() {
            tracing::debug!("Stash key '{}' drained", key);
            self.entries.shift_remove(key);
        }
        taken
    }

    pub fn peek(&self, key: &StashKey) -> Option<&StashedNodes> {
        self.entries.get(key).and_then(|queue| queue.front())
    }

    /// Remove one key, or every key when `key` is `None`
    pub fn clear(&mut self, key: Option<&StashKey>) {
        match key {
            Some(key) => {
                self.entries.shift_remove(key);
            }
            None => self.entries.clear(),
        }
    }

    pub fn contains(&self, key: &StashKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &StashKey> {
        self.entries.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry of every key, oldest first per key
    pub fn entries(&self) -> impl Iterator<Item = (&StashKey, &StashedNodes)> {
        self.entries
            .iter()
            .flat_map(|(key, queue)| queue.iter().map(move |nodes| (key, nodes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Item, ItemSize};
    use crate::widget::Widget;

    fn item(id: &str) -> Item {
        Item::new(ItemSize::xl(6, Some(10)), Widget::rich_text(id, "text"))
    }

    #[test]
    fn test_put_accumulates_and_drains_fifo() {
        let mut stash = Stash::new();
        let key = StashKey::from("k");
        stash.put(key.clone(), StashedNodes::Items(vec![item("a")]));
        stash.put(key.clone(), StashedNodes::Items(vec![item("b")]));
        assert_eq!(stash.entries().count(), 2);

        let first = stash.take_one(&key).unwrap().into_items();
        assert_eq!(first[0].widget_id().unwrap().as_str(), "a");
        let second = stash.take_one(&key).unwrap().into_items();
        assert_eq!(second[0].widget_id().unwrap().as_str(), "b");
    }

    #[test]
    fn test_drained_key_is_removed() {
        let mut stash = Stash::new();
        let key = StashKey::from("k");
        stash.put(key.clone(), StashedNodes::Items(vec![item("a")]));
        assert!(stash.take_one(&key).is_some());
        assert!(!stash.contains(&key));
        assert!(stash.take_one(&key).is_none());
        assert!(stash.take_one(&StashKey::from("never")).is_none());
    }

    #[test]
    fn test_clear() {
        let mut stash = Stash::new();
        stash.put(StashKey::from("a"), StashedNodes::Items(vec![item("a")]));
        stash.put(StashKey::from("b"), StashedNodes::Items(vec![item("b")]));
        stash.clear(Some(&StashKey::from("a")));
        assert_eq!(stash.keys().count(), 1);
        stash.clear(None);
        assert!(stash.is_empty());
    }
}
