//! Dashboard layout tree: sections of sized items, each holding at most one widget
//!
//! Container widgets own a nested [`Layout`], so the tree is recursive. Structural
//! queries walk it depth-first; mutations live in [`edit`] and never touch the
//! value they are called on.

pub mod edit;
pub mod size;

pub use edit::{ItemSource, LayoutDelta, LayoutEdit, LayoutOp};
pub use size::{GridSize, ItemSize, ScreenSize, GRID_COLUMNS};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::refs::{LocalId, StashKey};
use crate::widget::{FilterSettings, FilterTarget, Widget, WidgetKind};

/// Errors raised by structural layout edits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Section index {index} out of range (sections: {len})")]
    InvalidSectionIndex { index: i64, len: usize },

    #[error("Item index {index} out of range in section {section} (items: {len})")]
    InvalidItemIndex { section: usize, index: i64, len: usize },

    #[error("Stash key '{0}' is absent or empty")]
    UnknownStashKey(StashKey),

    #[error("No container widget for scope {0:?}")]
    UnknownScope(LayoutScope),

    #[error("Invalid item size: {0}")]
    InvalidSize(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectionHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SectionHeader {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: None,
        }
    }

    /// Fields set in `other` win, the rest are kept
    pub fn merged_with(&self, other: &SectionHeader) -> SectionHeader {
        SectionHeader {
            title: other.title.clone().or_else(|| self.title.clone()),
            description: other.description.clone().or_else(|| self.description.clone()),
        }
    }
}

/// One grid cell. An item without a widget is a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub size: ItemSize,
    pub widget: Option<Widget>,
}

impl Item {
    pub fn new(size: ItemSize, widget: Widget) -> Self {
        Self {
            size,
            widget: Some(widget),
        }
    }

    pub fn placeholder(size: ItemSize) -> Self {
        Self { size, widget: None }
    }

    pub fn widget_id(&self) -> Option<&LocalId> {
        self.widget.as_ref().map(Widget::local_id)
    }

    pub fn collect_local_ids<'a>(&'a self, out: &mut Vec<&'a LocalId>) {
        if let Some(widget) = &self.widget {
            widget.collect_local_ids(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub header: SectionHeader,
    pub items: Vec<Item>,
}

impl Section {
    pub fn new(header: SectionHeader, items: Vec<Item>) -> Self {
        Self { header, items }
    }

    /// Grid rows the items occupy at `screen`, as item indices
    pub fn rendered_rows(&self, screen: ScreenSize) -> Vec<Vec<usize>> {
        size::rendered_rows(&self.items, screen)
    }
}

/// Which layout a structural command addresses
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutScope {
    /// Layout of the active tab
    #[default]
    Root,
    /// Nested layout of the container widget with this local identifier
    Container(LocalId),
}

/// Position of a widget, relative to the layout that directly holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetLocation {
    pub scope: LayoutScope,
    pub section: usize,
    pub item: usize,
    /// Set when the identifier belongs to a visualization switcher entry
    pub switcher_entry: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Layout {
    pub sections: Vec<Section>,
}

impl Layout {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn item(&self, section: usize, item: usize) -> Option<&Item> {
        self.sections.get(section)?.items.get(item)
    }

    /// Every widget, depth-first, including widgets of nested containers
    pub fn widgets(&self) -> Vec<&Widget> {
        let mut out = Vec::new();
        self.collect_widgets(&mut out);
        out
    }

    fn collect_widgets<'a>(&'a self, out: &mut Vec<&'a Widget>) {
        for widget in self.sections.iter().flat_map(|s| s.items.iter()).filter_map(|i| i.widget.as_ref()) {
            out.push(widget);
            if let Some(nested) = widget.nested_layout() {
                nested.collect_widgets(out);
            }
        }
    }

    /// Every local identifier in the tree, switcher entries included
    pub fn local_ids(&self) -> Vec<&LocalId> {
        let mut out = Vec::new();
        self.collect_local_ids(&mut out);
        out
    }

    pub fn collect_local_ids<'a>(&'a self, out: &mut Vec<&'a LocalId>) {
        for item in self.sections.iter().flat_map(|s| s.items.iter()) {
            item.collect_local_ids(out);
        }
    }

    /// Every widget or switcher entry that receives dashboard filters
    pub fn filter_targets(&self) -> Vec<FilterTarget<'_>> {
        let mut out = Vec::new();
        self.collect_filter_targets(&mut out);
        out
    }

    pub fn collect_filter_targets<'a>(&'a self, out: &mut Vec<FilterTarget<'a>>) {
        for widget in self.sections.iter().flat_map(|s| s.items.iter()).filter_map(|i| i.widget.as_ref()) {
            widget.collect_filter_targets(out);
        }
    }

    pub fn filter_target(&self, id: &LocalId) -> Option<FilterTarget<'_>> {
        self.filter_targets().into_iter().find(|t| t.local_id == id)
    }

    /// Locate a widget or switcher entry anywhere in the tree
    pub fn find_widget(&self, id: &LocalId) -> Option<WidgetLocation> {
        self.find_in_scope(id, &LayoutScope::Root)
    }

    fn find_in_scope(&self, id: &LocalId, scope: &LayoutScope) -> Option<WidgetLocation> {
        for (section_index, section) in self.sections.iter().enumerate() {
            for (item_index, item) in section.items.iter().enumerate() {
                let Some(widget) = &item.widget else { continue };
                let here = |switcher_entry| WidgetLocation {
                    scope: scope.clone(),
                    section: section_index,
                    item: item_index,
                    switcher_entry,
                };
                if widget.local_id() == id {
                    return Some(here(None));
                }
                match &widget.kind {
                    WidgetKind::VisualizationSwitcher(switcher) => {
                        if let Some(entry) = switcher.visualizations.iter().position(|v| &v.header.local_id == id) {
                            return Some(here(Some(entry)));
                        }
                    }
                    WidgetKind::Container(container) => {
                        let nested_scope = LayoutScope::Container(widget.local_id().clone());
                        if let Some(found) = container.layout.find_in_scope(id, &nested_scope) {
                            return Some(found);
                        }
                    }
                    WidgetKind::Kpi(_) | WidgetKind::Insight(_) | WidgetKind::RichText(_) => {}
                }
            }
        }
        None
    }

    pub fn contains(&self, id: &LocalId) -> bool {
        self.find_widget(id).is_some()
    }

    /// The widget with this local identifier (switcher entries are not widgets)
    pub fn widget(&self, id: &LocalId) -> Option<&Widget> {
        self.widgets().into_iter().find(|w| w.local_id() == id)
    }

    pub fn widget_mut(&mut self, id: &LocalId) -> Option<&mut Widget> {
        for item in self.sections.iter_mut().flat_map(|s| s.items.iter_mut()) {
            let Some(widget) = item.widget.as_mut() else { continue };
            if widget.local_id() == id {
                return Some(widget);
            }
            if let Some(found) = widget.nested_layout_mut().and_then(|nested| nested.widget_mut(id)) {
                return Some(found);
            }
        }
        None
    }

    /// Filter settings of the widget or switcher entry with `id`
    pub fn filter_settings_mut(&mut self, id: &LocalId) -> Option<&mut FilterSettings> {
        self.sections
            .iter_mut()
            .flat_map(|s| s.items.iter_mut())
            .filter_map(|i| i.widget.as_mut())
            .find_map(|widget| widget.filter_settings_for_mut(id))
    }

    /// The layout addressed by `scope`
    pub fn scope(&self, scope: &LayoutScope) -> Option<&Layout> {
        match scope {
            LayoutScope::Root => Some(self),
            LayoutScope::Container(id) => self.widget(id)?.nested_layout(),
        }
    }

    pub fn scope_mut(&mut self, scope: &LayoutScope) -> Option<&mut Layout> {
        match scope {
            LayoutScope::Root => Some(self),
            LayoutScope::Container(id) => self.widget_mut(id)?.nested_layout_mut(),
        }
    }

    /// Size of an item at a breakpoint, falling back to the implicit size
    pub fn resolved_size(&self, section: usize, item: usize, screen: ScreenSize) -> Option<GridSize> {
        self.item(section, item).map(|item| item.size.for_screen(screen))
    }

    /// Local identifiers that occur more than once, in first-duplicate order
    pub fn duplicate_local_ids(&self) -> Vec<LocalId> {
        duplicates(self.local_ids())
    }
}

pub(crate) fn duplicates<'a>(ids: impl IntoIterator<Item = &'a LocalId>) -> Vec<LocalId> {
    let mut seen = ahash::AHashSet::new();
    let mut dupes = Vec::new();
    for id in ids {
        if !seen.insert(id) && !dupes.contains(id) {
            dupes.push(id.clone());
        }
    }
    dupes
}
