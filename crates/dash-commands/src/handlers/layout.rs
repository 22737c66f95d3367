//! Structural layout commands, undo and redo

use ahash::AHashSet;

use dash_core::{
    DashboardEvent, Item, ItemSource, LayoutDelta, LayoutOp, LayoutScope, LocalId, WidgetKind,
};

use super::{Applied, HandlerContext, HistoryChange, Recompute};
use crate::command::UndoPoint;
use crate::config::IdConflictPolicy;
use crate::error::CommandError;
use crate::history::LayoutSnapshot;

pub(super) fn apply_layout_op(
    ctx: &HandlerContext<'_>,
    scope: LayoutScope,
    op: LayoutOp,
) -> Result<Applied, CommandError> {
    let op = check_new_ids(ctx, op)?;

    let mut state = ctx.state.clone();
    let edit = state
        .dashboard
        .active_tab()
        .layout
        .apply(&scope, &state.stash, op)?;
    state.dashboard.active_tab_mut().layout = edit.layout;
    state.stash = edit.stash;
    state.layout_version += 1;

    let mut added = Vec::new();
    for delta in &edit.deltas {
        let items: &[Item] = match delta {
            LayoutDelta::SectionInserted { section, .. } => &section.items,
            LayoutDelta::ItemsInserted { items, .. } | LayoutDelta::ItemReplaced { items, .. } => items,
            _ => continue,
        };
        let mut ids = Vec::new();
        for item in items {
            item.collect_local_ids(&mut ids);
        }
        added.extend(ids.into_iter().cloned());
    }

    let events = edit
        .deltas
        .into_iter()
        .map(|delta| DashboardEvent::from_delta(&scope, delta))
        .collect();

    Ok(Applied {
        state,
        events,
        recompute: if added.is_empty() {
            Recompute::Nothing
        } else {
            Recompute::Widgets(added)
        },
        history: HistoryChange::Record,
    })
}

/// Reject or rename new items whose identifiers are already taken in any tab or the stash
fn check_new_ids(ctx: &HandlerContext<'_>, op: LayoutOp) -> Result<LayoutOp, CommandError> {
    let mut taken: AHashSet<LocalId> = ctx.state.dashboard.local_ids().into_iter().cloned().collect();
    for (_, nodes) in ctx.state.stash.entries() {
        let mut ids = Vec::new();
        nodes.collect_local_ids(&mut ids);
        taken.extend(ids.into_iter().cloned());
    }
    let policy = ctx.config.id_conflict;

    let mut check = |source: &mut ItemSource| -> Result<(), CommandError> {
        match source {
            ItemSource::Item(item) => claim_ids(item, &mut taken, policy),
            ItemSource::Stash(_) => Ok(()),
        }
    };

    let mut op = op;
    match &mut op {
        LayoutOp::InsertSection { items, .. } | LayoutOp::InsertItems { items, .. } => {
            for source in items.iter_mut() {
                check(source)?;
            }
        }
        LayoutOp::ReplaceItem { item, .. } => check(item)?,
        _ => {}
    }
    Ok(op)
}

fn claim_ids(item: &mut Item, taken: &mut AHashSet<LocalId>, policy: IdConflictPolicy) -> Result<(), CommandError> {
    let Some(widget) = item.widget.as_mut() else {
        return Ok(());
    };
    claim(&mut widget.header.local_id, taken, policy)?;
    match &mut widget.kind {
        WidgetKind::VisualizationSwitcher(switcher) => {
            for entry in &mut switcher.visualizations {
                claim(&mut entry.header.local_id, taken, policy)?;
            }
        }
        WidgetKind::Container(container) => {
            for nested in container.layout.sections.iter_mut().flat_map(|s| s.items.iter_mut()) {
                claim_ids(nested, taken, policy)?;
            }
        }
        WidgetKind::Kpi(_) | WidgetKind::Insight(_) | WidgetKind::RichText(_) => {}
    }
    Ok(())
}

fn claim(id: &mut LocalId, taken: &mut AHashSet<LocalId>, policy: IdConflictPolicy) -> Result<(), CommandError> {
    if taken.contains(id) {
        match policy {
            IdConflictPolicy::Reject => return Err(CommandError::DuplicateLocalId(id.clone())),
            IdConflictPolicy::Regenerate => {
                let fresh = LocalId::generate();
                tracing::debug!("Local identifier '{}' is taken, using '{}'", id, fresh);
                *id = fresh;
            }
        }
    }
    taken.insert(id.clone());
    Ok(())
}

pub(super) fn undo(ctx: &HandlerContext<'_>, point: &UndoPoint, redoable: bool) -> Result<Applied, CommandError> {
    let mut history = ctx.history.clone();
    let undone = history.undo(point, redoable)?;

    let mut state = ctx.state.clone();
    undone.restore.restore_into(&mut state);
    state.layout_version += 1;

    Ok(Applied {
        state,
        events: vec![DashboardEvent::LayoutChangesUndone {
            undone: undone.undone,
            redoable,
        }],
        recompute: Recompute::ActiveTab,
        history: HistoryChange::Replace(history),
    })
}

pub(super) fn redo(ctx: &HandlerContext<'_>) -> Result<Applied, CommandError> {
    let mut history = ctx.history.clone();
    let (snapshot, redone): (LayoutSnapshot, _) = history.redo()?;

    let mut state = ctx.state.clone();
    snapshot.restore_into(&mut state);
    state.layout_version += 1;

    Ok(Applied {
        state,
        events: vec![DashboardEvent::LayoutChangesRedone { redone: vec![redone] }],
        recompute: Recompute::ActiveTab,
        history: HistoryChange::Replace(history),
    })
}
