//! Command handlers
//!
//! A handler validates a command against the current state and, when it is
//! acceptable, returns the complete next state with the events describing the
//! change. Handlers work on copies; the dispatcher decides whether to commit.

mod filters;
mod layout;
mod tabs;
mod widgets;

use dash_core::{DashboardEvent, DashboardState, LocalId};
use dash_filters::Catalog;

use crate::command::CommandPayload;
use crate::config::DispatcherConfig;
use crate::error::CommandError;
use crate::history::UndoHistory;

/// Read-only inputs of a handler
pub(crate) struct HandlerContext<'a> {
    pub state: &'a DashboardState,
    pub catalog: &'a Catalog,
    pub config: &'a DispatcherConfig,
    pub history: &'a UndoHistory,
}

/// Which widgets need their effective filters resolved again
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Recompute {
    Nothing,
    /// These widgets or switcher entries, if they are in the active tab
    Widgets(Vec<LocalId>),
    /// Every filter target of the active tab
    ActiveTab,
}

#[derive(Debug)]
pub(crate) enum HistoryChange {
    Keep,
    /// Record the command as undoable
    Record,
    /// Adopt this history (undo and redo)
    Replace(UndoHistory),
}

/// Outcome of a handler that accepted its command
#[derive(Debug)]
pub(crate) struct Applied {
    pub state: DashboardState,
    pub events: Vec<DashboardEvent>,
    pub recompute: Recompute,
    pub history: HistoryChange,
}

pub(crate) fn apply(ctx: &HandlerContext<'_>, payload: &CommandPayload) -> Result<Applied, CommandError> {
    if let Some((scope, op)) = payload.layout_op() {
        return layout::apply_layout_op(ctx, scope, op);
    }
    match payload {
        CommandPayload::UndoLayoutChanges { undo_point, redoable } => layout::undo(ctx, undo_point, *redoable),
        CommandPayload::RedoLayoutChanges => layout::redo(ctx),

        CommandPayload::AddAttributeFilter {
            index,
            filter,
            tab_local,
        } => filters::add_attribute_filter(ctx, *index, filter, *tab_local),
        CommandPayload::RemoveAttributeFilter { filter } => filters::remove_attribute_filter(ctx, filter),
        CommandPayload::MoveAttributeFilter { filter, index } => filters::move_attribute_filter(ctx, filter, *index),
        CommandPayload::ChangeFilterSelection { filter, selection } => {
            filters::change_filter_selection(ctx, filter, selection)
        }
        CommandPayload::ChangeDateFilterSelection {
            data_set,
            granularity,
            range,
            tab_local,
        } => filters::change_date_filter_selection(ctx, data_set.as_ref(), *granularity, range, *tab_local),
        CommandPayload::SetAttributeFilterParents { filter, parents } => {
            filters::set_attribute_filter_parents(ctx, filter, parents)
        }
        CommandPayload::ChangeFilterContextSelection { filters: items } => {
            filters::change_filter_context_selection(ctx, items)
        }

        CommandPayload::SetFilterIgnoreList { widget, ignore } => widgets::set_filter_ignore_list(ctx, widget, ignore),
        CommandPayload::ChangeWidgetFilterSettings { widget, operation } => {
            widgets::change_filter_settings(ctx, widget, operation)
        }
        CommandPayload::ChangeWidgetInsight { widget, insight } => widgets::change_insight(ctx, widget, insight),
        CommandPayload::SwitchActiveTab { tab } => tabs::switch_active_tab(ctx, tab),

        CommandPayload::AddLayoutSection { .. }
        | CommandPayload::RemoveLayoutSection { .. }
        | CommandPayload::MoveLayoutSection { .. }
        | CommandPayload::ChangeLayoutSectionHeader { .. }
        | CommandPayload::AddSectionItems { .. }
        | CommandPayload::RemoveSectionItem { .. }
        | CommandPayload::ReplaceSectionItem { .. }
        | CommandPayload::MoveSectionItem { .. }
        | CommandPayload::ResizeHeightOfItems { .. }
        | CommandPayload::ResizeWidthOfItem { .. } => unreachable!("layout commands are handled above"),
    }
}
