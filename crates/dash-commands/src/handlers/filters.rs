//! Filter context commands
//!
//! Attribute filters live either in the common context or in the active tab's
//! local context. Commands that address an existing filter edit it where it is
//! defined, tab-local first since local filters shadow common ones.

use dash_core::{
    AttributeFilter, AttributeSelection, Dashboard, DashboardEvent, DateFilter, DateGranularity, DateRange,
    FilterContext, FilterContextError, FilterId, FilterItem, FilterParent, FilterReference, ObjRef,
};
use dash_filters::DependencyResolver;

use super::{Applied, HandlerContext, HistoryChange, Recompute};
use crate::error::CommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Common,
    ActiveTab,
}

fn owner_of(dashboard: &Dashboard, id: &FilterId) -> Result<Owner, CommandError> {
    if dashboard.active_tab().filters.attribute_filter(id).is_some() {
        Ok(Owner::ActiveTab)
    } else if dashboard.common_filters.attribute_filter(id).is_some() {
        Ok(Owner::Common)
    } else {
        Err(FilterContextError::UnknownFilter(id.clone()).into())
    }
}

fn context_mut(dashboard: &mut Dashboard, owner: Owner) -> &mut FilterContext {
    match owner {
        Owner::Common => &mut dashboard.common_filters,
        Owner::ActiveTab => &mut dashboard.active_tab_mut().filters,
    }
}

/// Wrap up a filter change: bump the filter version and re-resolve the active tab
fn filters_changed(mut state: dash_core::DashboardState, events: Vec<DashboardEvent>) -> Applied {
    state.filters_version += 1;
    Applied {
        state,
        events,
        recompute: Recompute::ActiveTab,
        history: HistoryChange::Keep,
    }
}

pub(super) fn add_attribute_filter(
    ctx: &HandlerContext<'_>,
    index: i64,
    filter: &AttributeFilter,
    tab_local: bool,
) -> Result<Applied, CommandError> {
    let mut state = ctx.state.clone();
    let owner = if tab_local { Owner::ActiveTab } else { Owner::Common };
    let position = context_mut(&mut state.dashboard, owner).add_attribute_filter(index, filter.clone())?;
    tracing::debug!("Added attribute filter '{}' at {}", filter.local_id, position);

    Ok(filters_changed(
        state,
        vec![DashboardEvent::FilterAdded {
            index: position,
            filter: filter.clone(),
        }],
    ))
}

pub(super) fn remove_attribute_filter(ctx: &HandlerContext<'_>, id: &FilterId) -> Result<Applied, CommandError> {
    let mut state = ctx.state.clone();
    let owner = owner_of(&state.dashboard, id)?;
    let removed = context_mut(&mut state.dashboard, owner).remove_attribute_filter(id)?;

    let mut events = vec![DashboardEvent::FilterRemoved {
        filter: removed.clone(),
    }];
    let reference = FilterReference::attribute(removed.display_form.clone());
    let common = state.dashboard.common_filters.clone();

    for tab in state.dashboard.tabs_mut() {
        // a tab that still sees a filter on the same display form keeps its ignores
        let merged = FilterContext::merged(&common, &tab.filters);
        if merged.attribute_filter_by_display_form(&removed.display_form).is_some() {
            continue;
        }
        let targets: Vec<_> = tab
            .layout
            .filter_targets()
            .into_iter()
            .filter(|t| t.settings.ignores(&reference))
            .map(|t| t.local_id.clone())
            .collect();
        for widget in targets {
            if let Some(settings) = tab.layout.filter_settings_mut(&widget) {
                settings.ignore_dashboard_filters.retain(|r| r != &reference);
                events.push(DashboardEvent::WidgetFilterSettingsChanged {
                    widget,
                    settings: settings.clone(),
                });
            }
        }
    }

    Ok(filters_changed(state, events))
}

pub(super) fn move_attribute_filter(
    ctx: &HandlerContext<'_>,
    id: &FilterId,
    index: i64,
) -> Result<Applied, CommandError> {
    let mut state = ctx.state.clone();
    let owner = owner_of(&state.dashboard, id)?;
    let context = context_mut(&mut state.dashboard, owner);
    let from = context
        .attribute_filters()
        .position(|f| &f.local_id == id)
        .ok_or_else(|| FilterContextError::UnknownFilter(id.clone()))?;
    let to = context.move_attribute_filter(id, index)?;

    Ok(filters_changed(
        state,
        vec![DashboardEvent::FilterMoved {
            filter: id.clone(),
            from,
            to,
        }],
    ))
}

pub(super) fn change_filter_selection(
    ctx: &HandlerContext<'_>,
    id: &FilterId,
    selection: &AttributeSelection,
) -> Result<Applied, CommandError> {
    let mut state = ctx.state.clone();
    let owner = owner_of(&state.dashboard, id)?;
    let changed = set_selection(context_mut(&mut state.dashboard, owner), id, selection)?;
    Ok(filters_changed(state, vec![DashboardEvent::FilterChanged { filter: changed }]))
}

fn set_selection(
    context: &mut FilterContext,
    id: &FilterId,
    selection: &AttributeSelection,
) -> Result<FilterItem, CommandError> {
    context.set_attribute_selection(id, selection.clone())?;
    context
        .attribute_filter(id)
        .map(|f| FilterItem::Attribute(f.clone()))
        .ok_or_else(|| FilterContextError::UnknownFilter(id.clone()).into())
}

pub(super) fn change_date_filter_selection(
    ctx: &HandlerContext<'_>,
    data_set: Option<&ObjRef>,
    granularity: DateGranularity,
    range: &DateRange,
    tab_local: bool,
) -> Result<Applied, CommandError> {
    if let Some(data_set) = data_set {
        if ctx.catalog.date_data_set(data_set).is_none() {
            return Err(CommandError::UnknownDateDataSet(data_set.clone()));
        }
    }
    let mut state = ctx.state.clone();
    let changed = upsert_date(&mut state.dashboard, data_set, granularity, range, tab_local);
    Ok(filters_changed(state, vec![DashboardEvent::FilterChanged { filter: changed }]))
}

fn upsert_date(
    dashboard: &mut Dashboard,
    data_set: Option<&ObjRef>,
    granularity: DateGranularity,
    range: &DateRange,
    tab_local: bool,
) -> FilterItem {
    let owner = if tab_local || dashboard.active_tab().filters.date_filter(data_set).is_some() {
        Owner::ActiveTab
    } else {
        Owner::Common
    };
    let context = context_mut(dashboard, owner);
    let local_id = context.date_filter(data_set).and_then(|f| f.local_id.clone());
    let filter = DateFilter {
        local_id,
        data_set: data_set.cloned(),
        granularity,
        range: range.clone(),
    };
    context.upsert_date_filter(filter.clone());
    FilterItem::Date(filter)
}

pub(super) fn set_attribute_filter_parents(
    ctx: &HandlerContext<'_>,
    id: &FilterId,
    parents: &[FilterParent],
) -> Result<Applied, CommandError> {
    let mut state = ctx.state.clone();
    let owner = owner_of(&state.dashboard, id)?;
    let context = context_mut(&mut state.dashboard, owner);
    context.set_attribute_parents(id, parents.to_vec())?;
    let changed = context
        .attribute_filter(id)
        .map(|f| FilterItem::Attribute(f.clone()))
        .ok_or_else(|| FilterContextError::UnknownFilter(id.clone()))?;

    // common links reach every tab, where overrides can close a cycle the active tab never sees
    let dashboard = &state.dashboard;
    let tabs = match owner {
        Owner::Common => dashboard.tabs(),
        Owner::ActiveTab => std::slice::from_ref(dashboard.active_tab()),
    };
    for tab in tabs {
        let merged = FilterContext::merged(&dashboard.common_filters, &tab.filters);
        DependencyResolver::new(&merged, ctx.catalog).check_acyclic(id)?;
    }

    Ok(filters_changed(state, vec![DashboardEvent::FilterChanged { filter: changed }]))
}

/// Apply several selections at once. Attribute filters are matched by local
/// identifier, then by display form; date filters by dataset.
pub(super) fn change_filter_context_selection(
    ctx: &HandlerContext<'_>,
    items: &[FilterItem],
) -> Result<Applied, CommandError> {
    let mut state = ctx.state.clone();
    let mut events = Vec::new();

    for item in items {
        let changed = match item {
            FilterItem::Attribute(filter) => {
                let id = if owner_of(&state.dashboard, &filter.local_id).is_ok() {
                    filter.local_id.clone()
                } else {
                    state
                        .dashboard
                        .active_filter_context()
                        .attribute_filter_by_display_form(&filter.display_form)
                        .map(|f| f.local_id.clone())
                        .ok_or_else(|| FilterContextError::UnknownFilter(filter.local_id.clone()))?
                };
                let owner = owner_of(&state.dashboard, &id)?;
                set_selection(context_mut(&mut state.dashboard, owner), &id, &filter.selection)?
            }
            FilterItem::Date(filter) => {
                if let Some(data_set) = &filter.data_set {
                    if ctx.catalog.date_data_set(data_set).is_none() {
                        return Err(CommandError::UnknownDateDataSet(data_set.clone()));
                    }
                }
                upsert_date(
                    &mut state.dashboard,
                    filter.data_set.as_ref(),
                    filter.granularity,
                    &filter.range,
                    false,
                )
            }
        };
        events.push(DashboardEvent::FilterChanged { filter: changed });
    }

    events.push(DashboardEvent::FilterContextChanged {
        filters: state.dashboard.active_filter_context(),
    });
    Ok(filters_changed(state, events))
}
