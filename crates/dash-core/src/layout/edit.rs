//! Structural edits of the layout tree
//!
//! Every edit works on copies of the layout and stash and returns them together
//! with the deltas describing what happened, in the order it happened. The
//! caller decides whether to adopt the new values; a failed edit leaves nothing
//! behind.

use serde::{Deserialize, Serialize};

use super::{Item, ItemSize, Layout, LayoutError, LayoutScope, Section, SectionHeader, GRID_COLUMNS};
use crate::refs::StashKey;
use crate::stash::{Stash, StashedNodes};

/// Where an inserted item comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemSource {
    Item(Item),
    /// Oldest stash entry under the key; expands to all of its items
    Stash(StashKey),
}

impl From<Item> for ItemSource {
    fn from(item: Item) -> Self {
        ItemSource::Item(item)
    }
}

impl From<StashKey> for ItemSource {
    fn from(key: StashKey) -> Self {
        ItemSource::Stash(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutOp {
    InsertSection {
        index: i64,
        header: SectionHeader,
        items: Vec<ItemSource>,
    },
    RemoveSection {
        index: usize,
        stash: Option<StashKey>,
    },
    MoveSection {
        from: usize,
        to: i64,
    },
    ChangeSectionHeader {
        index: usize,
        header: SectionHeader,
        merge: bool,
    },
    InsertItems {
        section: usize,
        index: i64,
        items: Vec<ItemSource>,
    },
    RemoveItem {
        section: usize,
        index: usize,
        stash: Option<StashKey>,
        /// Also remove the section when this was its last item
        eager: bool,
    },
    ReplaceItem {
        section: usize,
        index: usize,
        item: ItemSource,
        stash: Option<StashKey>,
    },
    MoveItem {
        from_section: usize,
        from_index: usize,
        /// `-1` selects the last section
        to_section: i64,
        to_index: i64,
    },
    ResizeHeight {
        section: usize,
        items: Vec<usize>,
        height: u32,
    },
    ResizeWidth {
        section: usize,
        index: usize,
        width: u32,
    },
}

/// What one edit changed. Indices refer to the layout after the edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LayoutDelta {
    ItemsStashed {
        key: StashKey,
        count: usize,
    },
    StashDrained {
        key: StashKey,
    },
    SectionInserted {
        index: usize,
        section: Section,
    },
    SectionRemoved {
        index: usize,
        section: Section,
        stashed_to: Option<StashKey>,
    },
    SectionMoved {
        from: usize,
        to: usize,
    },
    SectionHeaderChanged {
        index: usize,
        header: SectionHeader,
    },
    ItemsInserted {
        section: usize,
        index: usize,
        items: Vec<Item>,
    },
    ItemRemoved {
        section: usize,
        index: usize,
        item: Item,
        stashed_to: Option<StashKey>,
    },
    ItemReplaced {
        section: usize,
        index: usize,
        previous: Item,
        items: Vec<Item>,
        stashed_to: Option<StashKey>,
    },
    ItemMoved {
        from_section: usize,
        from_index: usize,
        to_section: usize,
        to_index: usize,
    },
    ItemsResized {
        section: usize,
        items: Vec<usize>,
        sizes: Vec<ItemSize>,
    },
}

/// Result of a successful edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEdit {
    pub layout: Layout,
    pub stash: Stash,
    pub deltas: Vec<LayoutDelta>,
}

impl Layout {
    /// Apply `op` to the layout addressed by `scope`, returning the new root layout and stash
    pub fn apply(&self, scope: &LayoutScope, stash: &Stash, op: LayoutOp) -> Result<LayoutEdit, LayoutError> {
        let mut root = self.clone();
        let mut stash = stash.clone();
        let target = root
            .scope_mut(scope)
            .ok_or_else(|| LayoutError::UnknownScope(scope.clone()))?;

        let mut editor = Editor {
            layout: target,
            stash: &mut stash,
            deltas: Vec::new(),
            drawn_from: Vec::new(),
        };
        editor.run(op)?;
        let deltas = editor.finish();

        Ok(LayoutEdit {
            layout: root,
            stash,
            deltas,
        })
    }

    pub fn insert_section(
        &self,
        stash: &Stash,
        index: i64,
        header: SectionHeader,
        items: Vec<ItemSource>,
    ) -> Result<LayoutEdit, LayoutError> {
        self.apply(&LayoutScope::Root, stash, LayoutOp::InsertSection { index, header, items })
    }

    pub fn remove_section(&self, stash: &Stash, index: usize, key: Option<StashKey>) -> Result<LayoutEdit, LayoutError> {
        self.apply(&LayoutScope::Root, stash, LayoutOp::RemoveSection { index, stash: key })
    }

    pub fn insert_items(
        &self,
        stash: &Stash,
        section: usize,
        index: i64,
        items: Vec<ItemSource>,
    ) -> Result<LayoutEdit, LayoutError> {
        self.apply(&LayoutScope::Root, stash, LayoutOp::InsertItems { section, index, items })
    }

    pub fn remove_item(
        &self,
        stash: &Stash,
        section: usize,
        index: usize,
        key: Option<StashKey>,
    ) -> Result<LayoutEdit, LayoutError> {
        self.apply(
            &LayoutScope::Root,
            stash,
            LayoutOp::RemoveItem {
                section,
                index,
                stash: key,
                eager: false,
            },
        )
    }

    pub fn replace_item(
        &self,
        stash: &Stash,
        section: usize,
        index: usize,
        item: ItemSource,
        key: Option<StashKey>,
    ) -> Result<LayoutEdit, LayoutError> {
        self.apply(
            &LayoutScope::Root,
            stash,
            LayoutOp::ReplaceItem {
                section,
                index,
                item,
                stash: key,
            },
        )
    }

    pub fn move_item(
        &self,
        from_section: usize,
        from_index: usize,
        to_section: i64,
        to_index: i64,
    ) -> Result<LayoutEdit, LayoutError> {
        // moves never touch the stash
        self.apply(
            &LayoutScope::Root,
            &Stash::new(),
            LayoutOp::MoveItem {
                from_section,
                from_index,
                to_section,
                to_index,
            },
        )
    }
}

struct Editor<'a> {
    layout: &'a mut Layout,
    stash: &'a mut Stash,
    deltas: Vec<LayoutDelta>,
    drawn_from: Vec<StashKey>,
}

impl Editor<'_> {
    fn run(&mut self, op: LayoutOp) -> Result<(), LayoutError> {
        match op {
            LayoutOp::InsertSection { index, header, items } => {
                let at = insert_position(index, self.layout.sections.len()).ok_or(LayoutError::InvalidSectionIndex {
                    index,
                    len: self.layout.sections.len(),
                })?;
                let items = self.materialize(items)?;
                let section = Section::new(header, items);
                self.layout.sections.insert(at, section.clone());
                self.deltas.push(LayoutDelta::SectionInserted { index: at, section });
            }

            LayoutOp::RemoveSection { index, stash } => {
                self.check_section(index)?;
                let section = self.layout.sections.remove(index);
                if let Some(key) = &stash {
                    self.stash_nodes(key, StashedNodes::Section(section.clone()));
                }
                self.deltas.push(LayoutDelta::SectionRemoved {
                    index,
                    section,
                    stashed_to: stash,
                });
            }

            LayoutOp::MoveSection { from, to } => {
                self.check_section(from)?;
                let len = self.layout.sections.len();
                let to_index = insert_position(to, len - 1).ok_or(LayoutError::InvalidSectionIndex { index: to, len })?;
                let section = self.layout.sections.remove(from);
                self.layout.sections.insert(to_index, section);
                self.deltas.push(LayoutDelta::SectionMoved { from, to: to_index });
            }

            LayoutOp::ChangeSectionHeader { index, header, merge } => {
                self.check_section(index)?;
                let section = &mut self.layout.sections[index];
                section.header = if merge {
                    section.header.merged_with(&header)
                } else {
                    header
                };
                self.deltas.push(LayoutDelta::SectionHeaderChanged {
                    index,
                    header: section.header.clone(),
                });
            }

            LayoutOp::InsertItems { section, index, items } => {
                self.check_section(section)?;
                let len = self.layout.sections[section].items.len();
                let at = insert_position(index, len).ok_or(LayoutError::InvalidItemIndex { section, index, len })?;
                let items = self.materialize(items)?;
                let target = &mut self.layout.sections[section].items;
                let tail = target.split_off(at);
                target.extend(items.iter().cloned());
                target.extend(tail);
                self.deltas.push(LayoutDelta::ItemsInserted { section, index: at, items });
            }

            LayoutOp::RemoveItem {
                section,
                index,
                stash,
                eager,
            } => {
                self.check_item(section, index)?;
                let item = self.layout.sections[section].items.remove(index);
                if let Some(key) = &stash {
                    self.stash_nodes(key, StashedNodes::Items(vec![item.clone()]));
                }
                self.deltas.push(LayoutDelta::ItemRemoved {
                    section,
                    index,
                    item,
                    stashed_to: stash,
                });
                if eager && self.layout.sections[section].items.is_empty() {
                    let emptied = self.layout.sections.remove(section);
                    self.deltas.push(LayoutDelta::SectionRemoved {
                        index: section,
                        section: emptied,
                        stashed_to: None,
                    });
                }
            }

            LayoutOp::ReplaceItem { section, index, item, stash } => {
                self.check_item(section, index)?;
                // sources are drained before the replaced item is stashed
                let items = self.materialize(vec![item])?;
                let target = &mut self.layout.sections[section].items;
                let previous = target.remove(index);
                let tail = target.split_off(index);
                target.extend(items.iter().cloned());
                target.extend(tail);
                if let Some(key) = &stash {
                    self.stash_nodes(key, StashedNodes::Items(vec![previous.clone()]));
                }
                self.deltas.push(LayoutDelta::ItemReplaced {
                    section,
                    index,
                    previous,
                    items,
                    stashed_to: stash,
                });
            }

            LayoutOp::MoveItem {
                from_section,
                from_index,
                to_section,
                to_index,
            } => {
                self.check_item(from_section, from_index)?;
                let sections = self.layout.sections.len();
                let to_section = match to_section {
                    -1 => sections - 1,
                    index if index >= 0 && (index as usize) < sections => index as usize,
                    index => return Err(LayoutError::InvalidSectionIndex { index, len: sections }),
                };
                let mut dest_len = self.layout.sections[to_section].items.len();
                if from_section == to_section {
                    dest_len -= 1;
                }
                let at = insert_position(to_index, dest_len).ok_or(LayoutError::InvalidItemIndex {
                    section: to_section,
                    index: to_index,
                    len: dest_len,
                })?;
                let item = self.layout.sections[from_section].items.remove(from_index);
                self.layout.sections[to_section].items.insert(at, item);
                self.deltas.push(LayoutDelta::ItemMoved {
                    from_section,
                    from_index,
                    to_section,
                    to_index: at,
                });
            }

            LayoutOp::ResizeHeight { section, items, height } => {
                if height == 0 {
                    return Err(LayoutError::InvalidSize("height must be at least 1".into()));
                }
                if items.is_empty() {
                    return Err(LayoutError::InvalidSize("no items to resize".into()));
                }
                for &index in &items {
                    self.check_item(section, index)?;
                }
                let target = &mut self.layout.sections[section].items;
                let sizes = items
                    .iter()
                    .map(|&index| {
                        target[index].size.xl.grid_height = Some(height);
                        target[index].size
                    })
                    .collect();
                self.deltas.push(LayoutDelta::ItemsResized { section, items, sizes });
            }

            LayoutOp::ResizeWidth { section, index, width } => {
                if !(1..=GRID_COLUMNS).contains(&width) {
                    return Err(LayoutError::InvalidSize(format!(
                        "width {} outside 1..={}",
                        width, GRID_COLUMNS
                    )));
                }
                self.check_item(section, index)?;
                let item = &mut self.layout.sections[section].items[index];
                item.size.xl.grid_width = width;
                self.deltas.push(LayoutDelta::ItemsResized {
                    section,
                    items: vec![index],
                    sizes: vec![item.size],
                });
            }
        }
        Ok(())
    }

    fn check_section(&self, index: usize) -> Result<(), LayoutError> {
        if index < self.layout.sections.len() {
            Ok(())
        } else {
            Err(LayoutError::InvalidSectionIndex {
                index: index as i64,
                len: self.layout.sections.len(),
            })
        }
    }

    fn check_item(&self, section: usize, index: usize) -> Result<(), LayoutError> {
        self.check_section(section)?;
        let len = self.layout.sections[section].items.len();
        if index < len {
            Ok(())
        } else {
            Err(LayoutError::InvalidItemIndex {
                section,
                index: index as i64,
                len,
            })
        }
    }

    /// Turn item sources into items, draining one stash entry per stash source
    fn materialize(&mut self, sources: Vec<ItemSource>) -> Result<Vec<Item>, LayoutError> {
        let mut items = Vec::new();
        for source in sources {
            match source {
                ItemSource::Item(item) => items.push(item),
                ItemSource::Stash(key) => {
                    let nodes = self
                        .stash
                        .take_one(&key)
                        .ok_or_else(|| LayoutError::UnknownStashKey(key.clone()))?;
                    items.extend(nodes.into_items());
                    if !self.drawn_from.contains(&key) {
                        self.drawn_from.push(key);
                    }
                }
            }
        }
        Ok(items)
    }

    fn stash_nodes(&mut self, key: &StashKey, nodes: StashedNodes) {
        self.deltas.push(LayoutDelta::ItemsStashed {
            key: key.clone(),
            count: nodes.item_count(),
        });
        self.stash.put(key.clone(), nodes);
    }

    /// Deltas in emission order: stash stores lead the structural delta, drains trail it
    fn finish(self) -> Vec<LayoutDelta> {
        let (stashed, structural): (Vec<_>, Vec<_>) = self
            .deltas
            .into_iter()
            .partition(|d| matches!(d, LayoutDelta::ItemsStashed { .. }));
        let drained = self
            .drawn_from
            .into_iter()
            .filter(|key| !self.stash.contains(key))
            .map(|key| LayoutDelta::StashDrained { key });
        stashed.into_iter().chain(structural).chain(drained).collect()
    }
}

/// Resolve an insertion index against a list of `len` elements; `-1` appends
fn insert_position(index: i64, len: usize) -> Option<usize> {
    match index {
        -1 => Some(len),
        i if i >= 0 && (i as usize) <= len => Some(i as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::LocalId;
    use crate::widget::Widget;
    use proptest::prelude::*;

    fn item(id: &str) -> Item {
        Item::new(ItemSize::xl(4, Some(10)), Widget::rich_text(id, "text"))
    }

    fn section(prefix: &str, count: usize) -> Section {
        Section::new(
            SectionHeader::titled(prefix),
            (0..count).map(|i| item(&format!("{}{}", prefix, i))).collect(),
        )
    }

    fn ids(items: &[Item]) -> Vec<String> {
        items.iter().filter_map(Item::widget_id).map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_stashed_section_reinserted_in_order() {
        let layout = Layout::new(vec![section("s", 6)]);
        let key = StashKey::from("stashA");

        let removed = layout.remove_section(&Stash::new(), 0, Some(key.clone())).unwrap();
        assert!(removed.layout.sections.is_empty());
        assert!(matches!(removed.deltas[0], LayoutDelta::ItemsStashed { count: 6, .. }));

        let inserted = removed
            .layout
            .insert_section(&removed.stash, -1, SectionHeader::titled("New"), vec![ItemSource::Stash(key.clone())])
            .unwrap();
        let last = inserted.layout.sections.last().unwrap();
        assert_eq!(last.header.title.as_deref(), Some("New"));
        assert_eq!(ids(&last.items), vec!["s0", "s1", "s2", "s3", "s4", "s5"]);
        assert!(inserted.stash.is_empty());
        assert_eq!(
            inserted.deltas.last(),
            Some(&LayoutDelta::StashDrained { key })
        );
    }

    #[test]
    fn test_stashed_item_appended_to_other_section() {
        let layout = Layout::new(vec![section("a", 2), section("b", 3), section("c", 2)]);
        let key = StashKey::from("stashB");

        let removed = layout.remove_item(&Stash::new(), 2, 0, Some(key.clone())).unwrap();
        let inserted = removed
            .layout
            .insert_items(&removed.stash, 1, -1, vec![ItemSource::Stash(key)])
            .unwrap();

        assert_eq!(ids(&inserted.layout.sections[1].items), vec!["b0", "b1", "b2", "c0"]);
        assert_eq!(ids(&inserted.layout.sections[2].items), vec!["c1"]);
    }

    #[test]
    fn test_missing_stash_key_rejected() {
        let layout = Layout::new(vec![section("a", 1)]);
        let err = layout
            .insert_items(&Stash::new(), 0, 0, vec![ItemSource::Stash(StashKey::from("nope"))])
            .unwrap_err();
        assert_eq!(err, LayoutError::UnknownStashKey(StashKey::from("nope")));
    }

    #[test]
    fn test_insert_index_bounds() {
        let layout = Layout::new(vec![section("a", 2)]);
        let stash = Stash::new();
        assert!(layout.insert_section(&stash, 1, SectionHeader::default(), vec![]).is_ok());
        assert!(matches!(
            layout.insert_section(&stash, 2, SectionHeader::default(), vec![]),
            Err(LayoutError::InvalidSectionIndex { index: 2, len: 1 })
        ));
        assert!(layout.insert_section(&stash, -2, SectionHeader::default(), vec![]).is_err());
        assert!(layout.remove_section(&stash, 1, None).is_err());
        assert!(layout.insert_items(&stash, 0, 3, vec![item("x").into()]).is_err());
    }

    #[test]
    fn test_move_within_section_reindexes() {
        let layout = Layout::new(vec![section("a", 4)]);

        let moved = layout.move_item(0, 0, 0, 2).unwrap();
        assert_eq!(ids(&moved.layout.sections[0].items), vec!["a1", "a2", "a0", "a3"]);

        let to_end = layout.move_item(0, 1, 0, -1).unwrap();
        assert_eq!(ids(&to_end.layout.sections[0].items), vec!["a0", "a2", "a3", "a1"]);

        // four items, three left after removal
        assert!(layout.move_item(0, 0, 0, 4).is_err());
    }

    #[test]
    fn test_move_across_sections() {
        let layout = Layout::new(vec![section("a", 2), section("b", 1)]);
        let moved = layout.move_item(0, 1, 1, 0).unwrap();
        assert_eq!(ids(&moved.layout.sections[0].items), vec!["a0"]);
        assert_eq!(ids(&moved.layout.sections[1].items), vec!["a1", "b0"]);
        assert_eq!(moved.deltas.len(), 1);
        assert!(moved.stash.is_empty());

        let to_last = layout.move_item(0, 0, -1, -1).unwrap();
        assert_eq!(ids(&to_last.layout.sections[1].items), vec!["b0", "a0"]);
        assert!(matches!(
            to_last.deltas[0],
            LayoutDelta::ItemMoved { to_section: 1, to_index: 1, .. }
        ));
        assert!(matches!(
            layout.move_item(0, 0, -2, 0),
            Err(LayoutError::InvalidSectionIndex { index: -2, len: 2 })
        ));
        assert!(layout.move_item(0, 0, 2, 0).is_err());
    }

    #[test]
    fn test_eager_remove_drops_emptied_section() {
        let layout = Layout::new(vec![section("a", 1), section("b", 2)]);
        let stash = Stash::new();
        let remove = |section, eager| LayoutOp::RemoveItem {
            section,
            index: 0,
            stash: Some(StashKey::from("k")),
            eager,
        };

        let edit = layout.apply(&LayoutScope::Root, &stash, remove(0, true)).unwrap();
        assert_eq!(edit.layout.sections.len(), 1);
        assert_eq!(ids(&edit.layout.sections[0].items), vec!["b0", "b1"]);
        assert!(matches!(edit.deltas[0], LayoutDelta::ItemsStashed { count: 1, .. }));
        assert!(matches!(edit.deltas[1], LayoutDelta::ItemRemoved { section: 0, .. }));
        match &edit.deltas[2] {
            LayoutDelta::SectionRemoved { index, section, stashed_to } => {
                assert_eq!(*index, 0);
                assert!(section.items.is_empty());
                assert!(stashed_to.is_none());
            }
            other => panic!("unexpected delta {:?}", other),
        }

        // a section with items left stays
        let edit = layout.apply(&LayoutScope::Root, &stash, remove(1, true)).unwrap();
        assert_eq!(edit.layout.sections.len(), 2);
        assert_eq!(edit.deltas.len(), 2);

        let edit = layout.apply(&LayoutScope::Root, &stash, remove(0, false)).unwrap();
        assert_eq!(edit.layout.sections.len(), 2);
        assert!(edit.layout.sections[0].items.is_empty());
    }

    #[test]
    fn test_replace_drains_before_stashing() {
        let layout = Layout::new(vec![section("a", 2)]);
        let key = StashKey::from("k");
        let mut stash = Stash::new();
        stash.put(key.clone(), StashedNodes::Items(vec![item("fresh")]));

        let edit = layout
            .replace_item(&stash, 0, 1, ItemSource::Stash(key.clone()), Some(key.clone()))
            .unwrap();
        assert_eq!(ids(&edit.layout.sections[0].items), vec!["a0", "fresh"]);
        let restashed = edit.stash.peek(&key).cloned().unwrap().into_items();
        assert_eq!(ids(&restashed), vec!["a1"]);

        // key is populated again, so no drain is reported
        assert!(matches!(edit.deltas[0], LayoutDelta::ItemsStashed { .. }));
        assert!(matches!(edit.deltas[1], LayoutDelta::ItemReplaced { .. }));
        assert_eq!(edit.deltas.len(), 2);
    }

    #[test]
    fn test_move_section_and_header() {
        let layout = Layout::new(vec![section("a", 1), section("b", 1), section("c", 1)]);
        let edit = layout
            .apply(&LayoutScope::Root, &Stash::new(), LayoutOp::MoveSection { from: 0, to: -1 })
            .unwrap();
        let titles: Vec<_> = edit.layout.sections.iter().map(|s| s.header.title.clone().unwrap()).collect();
        assert_eq!(titles, vec!["b", "c", "a"]);

        let header = SectionHeader {
            title: None,
            description: Some("details".into()),
        };
        let edit = layout
            .apply(
                &LayoutScope::Root,
                &Stash::new(),
                LayoutOp::ChangeSectionHeader { index: 1, header, merge: true },
            )
            .unwrap();
        assert_eq!(edit.layout.sections[1].header.title.as_deref(), Some("b"));
        assert_eq!(edit.layout.sections[1].header.description.as_deref(), Some("details"));
    }

    #[test]
    fn test_resize_validation() {
        let layout = Layout::new(vec![section("a", 3)]);
        let stash = Stash::new();
        let width = |width| LayoutOp::ResizeWidth { section: 0, index: 0, width };
        assert!(layout.apply(&LayoutScope::Root, &stash, width(0)).is_err());
        assert!(layout.apply(&LayoutScope::Root, &stash, width(13)).is_err());

        let edit = layout.apply(&LayoutScope::Root, &stash, width(12)).unwrap();
        assert_eq!(edit.layout.sections[0].items[0].size.xl.grid_width, 12);

        let edit = layout
            .apply(
                &LayoutScope::Root,
                &stash,
                LayoutOp::ResizeHeight { section: 0, items: vec![0, 2], height: 20 },
            )
            .unwrap();
        let heights: Vec<_> = edit.layout.sections[0].items.iter().map(|i| i.size.xl.grid_height).collect();
        assert_eq!(heights, vec![Some(20), Some(10), Some(20)]);
    }

    #[test]
    fn test_container_scope() {
        let inner = Layout::new(vec![section("in", 1)]);
        let layout = Layout::new(vec![Section::new(
            SectionHeader::default(),
            vec![Item::new(ItemSize::xl(12, None), Widget::container("box", inner))],
        )]);
        let scope = LayoutScope::Container(LocalId::from("box"));
        let edit = layout
            .apply(
                &scope,
                &Stash::new(),
                LayoutOp::InsertItems { section: 0, index: -1, items: vec![item("added").into()] },
            )
            .unwrap();
        let nested = edit.layout.scope(&scope).unwrap();
        assert_eq!(ids(&nested.sections[0].items), vec!["in0", "added"]);
        // the root is untouched structurally
        assert_eq!(edit.layout.sections[0].items.len(), 1);

        let missing = LayoutScope::Container(LocalId::from("nope"));
        assert_eq!(
            layout.apply(&missing, &Stash::new(), LayoutOp::RemoveSection { index: 0, stash: None }),
            Err(LayoutError::UnknownScope(missing.clone()))
        );
    }

    #[test]
    fn test_failed_edit_leaves_inputs_alone() {
        let layout = Layout::new(vec![section("a", 2)]);
        let mut stash = Stash::new();
        stash.put(StashKey::from("k"), StashedNodes::Items(vec![item("z")]));
        let before = (layout.clone(), stash.clone());

        // drains "k" and then fails on the second, missing key
        let result = layout.insert_items(
            &stash,
            0,
            0,
            vec![StashKey::from("k").into(), StashKey::from("missing").into()],
        );
        assert!(result.is_err());
        assert_eq!((layout, stash), before);
    }

    proptest! {
        #[test]
        fn prop_stash_conserves_items(
            counts in prop::collection::vec(0usize..6, 1..5),
            pick in 0usize..5,
            repeats in 1usize..3,
        ) {
            let sections: Vec<Section> = counts
                .iter()
                .enumerate()
                .map(|(i, &n)| section(&format!("s{}-", i), n))
                .collect();
            let mut layout = Layout::new(sections);
            let mut stash = Stash::new();
            let key = StashKey::from("k");

            let mut removed_ids = Vec::new();
            for _ in 0..repeats {
                if layout.sections.is_empty() {
                    break;
                }
                let index = pick % layout.sections.len();
                removed_ids.push(ids(&layout.sections[index].items));
                let edit = layout.remove_section(&stash, index, Some(key.clone())).unwrap();
                layout = edit.layout;
                stash = edit.stash;
            }

            for expected in removed_ids {
                let edit = layout
                    .insert_section(&stash, -1, SectionHeader::titled("New"), vec![ItemSource::Stash(key.clone())])
                    .unwrap();
                layout = edit.layout;
                stash = edit.stash;
                let last = layout.sections.last().unwrap();
                prop_assert_eq!(ids(&last.items), expected);
            }

            prop_assert!(stash.is_empty());
            prop_assert!(stash.take_one(&key).is_none());
            prop_assert!(layout.duplicate_local_ids().is_empty());
        }
    }
}
