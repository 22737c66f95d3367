//! Commands accepted by the dispatcher
//!
//! A command is an intent: nothing in it has been validated yet. Every command
//! carries a correlation id that the events it causes are tagged with.

use serde::{Deserialize, Serialize};

use dash_core::{
    AttributeFilter, AttributeSelection, CorrelationId, DateGranularity, DateRange, FilterId, FilterItem,
    FilterParent, FilterReference, FilterSettings, Item, ItemSource, LayoutOp, LayoutScope, LocalId, ObjRef,
    SectionHeader, StashKey, TabId,
};

/// How far back an undo goes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UndoPoint {
    /// The most recent undoable command
    #[default]
    Last,
    /// The `n` most recent undoable commands
    Steps(usize),
    /// Back to and including the command with this correlation id
    ToCorrelation(CorrelationId),
}

/// Edit of one widget's filter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum FilterSettingsOp {
    Replace { settings: FilterSettings },
    EnableDateFilter { data_set: ObjRef },
    DisableDateFilter,
    /// Replace every attribute ignore, keeping date ignores
    ReplaceAttributeIgnores { display_forms: Vec<ObjRef> },
    IgnoreAttributeFilter { display_form: ObjRef },
    UnignoreAttributeFilter { display_form: ObjRef },
}

/// Preconditions a deferred command captured before it suspended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandGuard {
    /// No structural change and the same active tab
    Unchanged { layout_version: u64, active_tab: TabId },
    /// The widget is still in the active tab
    WidgetPresent { widget: LocalId, active_tab: TabId },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase", deny_unknown_fields)]
pub enum CommandPayload {
    AddLayoutSection {
        #[serde(default)]
        scope: LayoutScope,
        index: i64,
        #[serde(default)]
        header: SectionHeader,
        #[serde(default)]
        items: Vec<ItemSource>,
    },
    RemoveLayoutSection {
        #[serde(default)]
        scope: LayoutScope,
        index: usize,
        #[serde(default)]
        stash: Option<StashKey>,
    },
    MoveLayoutSection {
        #[serde(default)]
        scope: LayoutScope,
        index: usize,
        to: i64,
    },
    ChangeLayoutSectionHeader {
        #[serde(default)]
        scope: LayoutScope,
        index: usize,
        header: SectionHeader,
        #[serde(default)]
        merge: bool,
    },
    AddSectionItems {
        #[serde(default)]
        scope: LayoutScope,
        section: usize,
        index: i64,
        items: Vec<ItemSource>,
    },
    RemoveSectionItem {
        #[serde(default)]
        scope: LayoutScope,
        section: usize,
        index: usize,
        #[serde(default)]
        stash: Option<StashKey>,
        /// Remove the section too when the item was its last one
        #[serde(default)]
        eager: bool,
    },
    ReplaceSectionItem {
        #[serde(default)]
        scope: LayoutScope,
        section: usize,
        index: usize,
        item: ItemSource,
        #[serde(default)]
        stash: Option<StashKey>,
    },
    MoveSectionItem {
        #[serde(default)]
        scope: LayoutScope,
        section: usize,
        index: usize,
        /// `-1` moves to the last section
        to_section: i64,
        to_index: i64,
    },
    ResizeHeightOfItems {
        #[serde(default)]
        scope: LayoutScope,
        section: usize,
        items: Vec<usize>,
        height: u32,
    },
    ResizeWidthOfItem {
        #[serde(default)]
        scope: LayoutScope,
        section: usize,
        index: usize,
        width: u32,
    },
    UndoLayoutChanges {
        #[serde(default)]
        undo_point: UndoPoint,
        #[serde(default = "default_true")]
        redoable: bool,
    },
    RedoLayoutChanges,

    AddAttributeFilter {
        index: i64,
        filter: AttributeFilter,
        /// Add to the active tab's local filters instead of the common ones
        #[serde(default)]
        tab_local: bool,
    },
    RemoveAttributeFilter {
        filter: FilterId,
    },
    MoveAttributeFilter {
        filter: FilterId,
        index: i64,
    },
    ChangeFilterSelection {
        filter: FilterId,
        selection: AttributeSelection,
    },
    ChangeDateFilterSelection {
        #[serde(default)]
        data_set: Option<ObjRef>,
        granularity: DateGranularity,
        range: DateRange,
        #[serde(default)]
        tab_local: bool,
    },
    SetAttributeFilterParents {
        filter: FilterId,
        parents: Vec<FilterParent>,
    },
    ChangeFilterContextSelection {
        filters: Vec<FilterItem>,
    },

    SetFilterIgnoreList {
        widget: LocalId,
        ignore: Vec<FilterReference>,
    },
    ChangeWidgetFilterSettings {
        widget: LocalId,
        operation: FilterSettingsOp,
    },
    ChangeWidgetInsight {
        widget: LocalId,
        insight: ObjRef,
    },
    SwitchActiveTab {
        tab: TabId,
    },
}

fn default_true() -> bool {
    true
}

impl CommandPayload {
    /// Stable name used in logs and rejection events
    pub fn kind(&self) -> &'static str {
        match self {
            CommandPayload::AddLayoutSection { .. } => "AddLayoutSection",
            CommandPayload::RemoveLayoutSection { .. } => "RemoveLayoutSection",
            CommandPayload::MoveLayoutSection { .. } => "MoveLayoutSection",
            CommandPayload::ChangeLayoutSectionHeader { .. } => "ChangeLayoutSectionHeader",
            CommandPayload::AddSectionItems { .. } => "AddSectionItems",
            CommandPayload::RemoveSectionItem { .. } => "RemoveSectionItem",
            CommandPayload::ReplaceSectionItem { .. } => "ReplaceSectionItem",
            CommandPayload::MoveSectionItem { .. } => "MoveSectionItem",
            CommandPayload::ResizeHeightOfItems { .. } => "ResizeHeightOfItems",
            CommandPayload::ResizeWidthOfItem { .. } => "ResizeWidthOfItem",
            CommandPayload::UndoLayoutChanges { .. } => "UndoLayoutChanges",
            CommandPayload::RedoLayoutChanges => "RedoLayoutChanges",
            CommandPayload::AddAttributeFilter { .. } => "AddAttributeFilter",
            CommandPayload::RemoveAttributeFilter { .. } => "RemoveAttributeFilter",
            CommandPayload::MoveAttributeFilter { .. } => "MoveAttributeFilter",
            CommandPayload::ChangeFilterSelection { .. } => "ChangeFilterSelection",
            CommandPayload::ChangeDateFilterSelection { .. } => "ChangeDateFilterSelection",
            CommandPayload::SetAttributeFilterParents { .. } => "SetAttributeFilterParents",
            CommandPayload::ChangeFilterContextSelection { .. } => "ChangeFilterContextSelection",
            CommandPayload::SetFilterIgnoreList { .. } => "SetFilterIgnoreList",
            CommandPayload::ChangeWidgetFilterSettings { .. } => "ChangeWidgetFilterSettings",
            CommandPayload::ChangeWidgetInsight { .. } => "ChangeWidgetInsight",
            CommandPayload::SwitchActiveTab { .. } => "SwitchActiveTab",
        }
    }

    /// Structural edit this command maps to, if it is a plain layout command
    pub fn layout_op(&self) -> Option<(LayoutScope, LayoutOp)> {
        let (scope, op) = match self {
            CommandPayload::AddLayoutSection {
                scope,
                index,
                header,
                items,
            } => (
                scope,
                LayoutOp::InsertSection {
                    index: *index,
                    header: header.clone(),
                    items: items.clone(),
                },
            ),
            CommandPayload::RemoveLayoutSection { scope, index, stash } => (
                scope,
                LayoutOp::RemoveSection {
                    index: *index,
                    stash: stash.clone(),
                },
            ),
            CommandPayload::MoveLayoutSection { scope, index, to } => {
                (scope, LayoutOp::MoveSection { from: *index, to: *to })
            }
            CommandPayload::ChangeLayoutSectionHeader {
                scope,
                index,
                header,
                merge,
            } => (
                scope,
                LayoutOp::ChangeSectionHeader {
                    index: *index,
                    header: header.clone(),
                    merge: *merge,
                },
            ),
            CommandPayload::AddSectionItems {
                scope,
                section,
                index,
                items,
            } => (
                scope,
                LayoutOp::InsertItems {
                    section: *section,
                    index: *index,
                    items: items.clone(),
                },
            ),
            CommandPayload::RemoveSectionItem {
                scope,
                section,
                index,
                stash,
                eager,
            } => (
                scope,
                LayoutOp::RemoveItem {
                    section: *section,
                    index: *index,
                    stash: stash.clone(),
                    eager: *eager,
                },
            ),
            CommandPayload::ReplaceSectionItem {
                scope,
                section,
                index,
                item,
                stash,
            } => (
                scope,
                LayoutOp::ReplaceItem {
                    section: *section,
                    index: *index,
                    item: item.clone(),
                    stash: stash.clone(),
                },
            ),
            CommandPayload::MoveSectionItem {
                scope,
                section,
                index,
                to_section,
                to_index,
            } => (
                scope,
                LayoutOp::MoveItem {
                    from_section: *section,
                    from_index: *index,
                    to_section: *to_section,
                    to_index: *to_index,
                },
            ),
            CommandPayload::ResizeHeightOfItems {
                scope,
                section,
                items,
                height,
            } => (
                scope,
                LayoutOp::ResizeHeight {
                    section: *section,
                    items: items.clone(),
                    height: *height,
                },
            ),
            CommandPayload::ResizeWidthOfItem {
                scope,
                section,
                index,
                width,
            } => (
                scope,
                LayoutOp::ResizeWidth {
                    section: *section,
                    index: *index,
                    width: *width,
                },
            ),
            _ => return None,
        };
        Some((scope.clone(), op))
    }
}

/// A command with its correlation id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    #[serde(default = "CorrelationId::generate")]
    pub correlation_id: CorrelationId,
    #[serde(flatten)]
    pub payload: CommandPayload,
    #[serde(skip)]
    pub guard: Option<CommandGuard>,
}

impl Command {
    pub fn new(payload: CommandPayload) -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            payload,
            guard: None,
        }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_guard(mut self, guard: CommandGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    // Layout

    pub fn add_layout_section(index: i64, header: SectionHeader, items: Vec<ItemSource>) -> Self {
        Self::new(CommandPayload::AddLayoutSection {
            scope: LayoutScope::Root,
            index,
            header,
            items,
        })
    }

    pub fn remove_layout_section(index: usize, stash: Option<StashKey>) -> Self {
        Self::new(CommandPayload::RemoveLayoutSection {
            scope: LayoutScope::Root,
            index,
            stash,
        })
    }

    pub fn move_layout_section(index: usize, to: i64) -> Self {
        Self::new(CommandPayload::MoveLayoutSection {
            scope: LayoutScope::Root,
            index,
            to,
        })
    }

    pub fn change_layout_section_header(index: usize, header: SectionHeader, merge: bool) -> Self {
        Self::new(CommandPayload::ChangeLayoutSectionHeader {
            scope: LayoutScope::Root,
            index,
            header,
            merge,
        })
    }

    pub fn add_section_items(section: usize, index: i64, items: Vec<ItemSource>) -> Self {
        Self::new(CommandPayload::AddSectionItems {
            scope: LayoutScope::Root,
            section,
            index,
            items,
        })
    }

    /// Convenience for inserting a single new item
    pub fn add_section_item(section: usize, index: i64, item: Item) -> Self {
        Self::add_section_items(section, index, vec![ItemSource::Item(item)])
    }

    pub fn remove_section_item(section: usize, index: usize, stash: Option<StashKey>) -> Self {
        Self::new(CommandPayload::RemoveSectionItem {
            scope: LayoutScope::Root,
            section,
            index,
            stash,
            eager: false,
        })
    }

    /// Remove an item and, if it was the only one, its section as well
    pub fn eager_remove_section_item(section: usize, index: usize, stash: Option<StashKey>) -> Self {
        Self::new(CommandPayload::RemoveSectionItem {
            scope: LayoutScope::Root,
            section,
            index,
            stash,
            eager: true,
        })
    }

    pub fn replace_section_item(section: usize, index: usize, item: ItemSource, stash: Option<StashKey>) -> Self {
        Self::new(CommandPayload::ReplaceSectionItem {
            scope: LayoutScope::Root,
            section,
            index,
            item,
            stash,
        })
    }

    pub fn move_section_item(section: usize, index: usize, to_section: i64, to_index: i64) -> Self {
        Self::new(CommandPayload::MoveSectionItem {
            scope: LayoutScope::Root,
            section,
            index,
            to_section,
            to_index,
        })
    }

    pub fn resize_height_of_items(section: usize, items: Vec<usize>, height: u32) -> Self {
        Self::new(CommandPayload::ResizeHeightOfItems {
            scope: LayoutScope::Root,
            section,
            items,
            height,
        })
    }

    pub fn resize_width_of_item(section: usize, index: usize, width: u32) -> Self {
        Self::new(CommandPayload::ResizeWidthOfItem {
            scope: LayoutScope::Root,
            section,
            index,
            width,
        })
    }

    /// Address the nested layout of a container instead of the tab root.
    /// Has no effect on commands that are not layout commands.
    pub fn in_scope(mut self, new_scope: LayoutScope) -> Self {
        match &mut self.payload {
            CommandPayload::AddLayoutSection { scope, .. }
            | CommandPayload::RemoveLayoutSection { scope, .. }
            | CommandPayload::MoveLayoutSection { scope, .. }
            | CommandPayload::ChangeLayoutSectionHeader { scope, .. }
            | CommandPayload::AddSectionItems { scope, .. }
            | CommandPayload::RemoveSectionItem { scope, .. }
            | CommandPayload::ReplaceSectionItem { scope, .. }
            | CommandPayload::MoveSectionItem { scope, .. }
            | CommandPayload::ResizeHeightOfItems { scope, .. }
            | CommandPayload::ResizeWidthOfItem { scope, .. } => *scope = new_scope,
            _ => {}
        }
        self
    }

    pub fn undo_layout_changes(undo_point: UndoPoint, redoable: bool) -> Self {
        Self::new(CommandPayload::UndoLayoutChanges { undo_point, redoable })
    }

    pub fn redo_layout_changes() -> Self {
        Self::new(CommandPayload::RedoLayoutChanges)
    }

    // Filters

    pub fn add_attribute_filter(index: i64, filter: AttributeFilter) -> Self {
        Self::new(CommandPayload::AddAttributeFilter {
            index,
            filter,
            tab_local: false,
        })
    }

    pub fn remove_attribute_filter(filter: impl Into<FilterId>) -> Self {
        Self::new(CommandPayload::RemoveAttributeFilter { filter: filter.into() })
    }

    pub fn move_attribute_filter(filter: impl Into<FilterId>, index: i64) -> Self {
        Self::new(CommandPayload::MoveAttributeFilter {
            filter: filter.into(),
            index,
        })
    }

    pub fn change_filter_selection(filter: impl Into<FilterId>, selection: AttributeSelection) -> Self {
        Self::new(CommandPayload::ChangeFilterSelection {
            filter: filter.into(),
            selection,
        })
    }

    pub fn change_date_filter_selection(
        data_set: Option<ObjRef>,
        granularity: DateGranularity,
        range: DateRange,
    ) -> Self {
        Self::new(CommandPayload::ChangeDateFilterSelection {
            data_set,
            granularity,
            range,
            tab_local: false,
        })
    }

    pub fn set_attribute_filter_parents(filter: impl Into<FilterId>, parents: Vec<FilterParent>) -> Self {
        Self::new(CommandPayload::SetAttributeFilterParents {
            filter: filter.into(),
            parents,
        })
    }

    pub fn change_filter_context_selection(filters: Vec<FilterItem>) -> Self {
        Self::new(CommandPayload::ChangeFilterContextSelection { filters })
    }

    // Widgets and tabs

    pub fn set_filter_ignore_list(widget: impl Into<LocalId>, ignore: Vec<FilterReference>) -> Self {
        Self::new(CommandPayload::SetFilterIgnoreList {
            widget: widget.into(),
            ignore,
        })
    }

    pub fn change_widget_filter_settings(widget: impl Into<LocalId>, operation: FilterSettingsOp) -> Self {
        Self::new(CommandPayload::ChangeWidgetFilterSettings {
            widget: widget.into(),
            operation,
        })
    }

    pub fn change_widget_insight(widget: impl Into<LocalId>, insight: ObjRef) -> Self {
        Self::new(CommandPayload::ChangeWidgetInsight {
            widget: widget.into(),
            insight,
        })
    }

    pub fn switch_active_tab(tab: impl Into<TabId>) -> Self {
        Self::new(CommandPayload::SwitchActiveTab { tab: tab.into() })
    }
}
