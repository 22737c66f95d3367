//! Widget level commands: filter settings and insight binding

use dash_core::{
    DashboardEvent, DashboardState, FilterContext, FilterReference, FilterSettings, LocalId, ObjRef, WidgetKind,
};

use super::{Applied, HandlerContext, HistoryChange, Recompute};
use crate::command::FilterSettingsOp;
use crate::error::CommandError;

fn check_reference(context: &FilterContext, reference: &FilterReference) -> Result<(), CommandError> {
    if context.items().iter().any(|item| reference.matches(item)) {
        Ok(())
    } else {
        Err(CommandError::UnknownFilterReference(reference.clone()))
    }
}

fn check_display_form(context: &FilterContext, display_form: &ObjRef) -> Result<(), CommandError> {
    if context.attribute_filter_by_display_form(display_form).is_some() {
        Ok(())
    } else {
        Err(CommandError::UnusedDisplayForm(display_form.clone()))
    }
}

fn check_data_set(ctx: &HandlerContext<'_>, data_set: &ObjRef) -> Result<(), CommandError> {
    match ctx.catalog.date_data_set(data_set) {
        Some(_) => Ok(()),
        None => Err(CommandError::UnknownDateDataSet(data_set.clone())),
    }
}

/// Current filter settings of a widget in the active tab
fn current_settings(state: &DashboardState, widget: &LocalId) -> Result<FilterSettings, CommandError> {
    let layout = &state.dashboard.active_tab().layout;
    match layout.filter_target(widget) {
        Some(target) => Ok(target.settings.clone()),
        None if layout.contains(widget) => Err(CommandError::NotFilterable(widget.clone())),
        None => Err(CommandError::UnknownWidget(widget.clone())),
    }
}

fn store_settings(ctx: &HandlerContext<'_>, widget: &LocalId, settings: FilterSettings) -> Result<Applied, CommandError> {
    let mut state = ctx.state.clone();
    let slot = state
        .dashboard
        .active_tab_mut()
        .layout
        .filter_settings_mut(widget)
        .ok_or_else(|| CommandError::UnknownWidget(widget.clone()))?;
    *slot = settings.clone();

    Ok(Applied {
        state,
        events: vec![DashboardEvent::WidgetFilterSettingsChanged {
            widget: widget.clone(),
            settings,
        }],
        recompute: Recompute::Widgets(vec![widget.clone()]),
        history: HistoryChange::Record,
    })
}

pub(super) fn set_filter_ignore_list(
    ctx: &HandlerContext<'_>,
    widget: &LocalId,
    ignore: &[FilterReference],
) -> Result<Applied, CommandError> {
    let mut settings = current_settings(ctx.state, widget)?;
    let context = ctx.state.dashboard.active_filter_context();

    let mut list: Vec<FilterReference> = Vec::with_capacity(ignore.len());
    for reference in ignore {
        check_reference(&context, reference)?;
        if !list.contains(reference) {
            list.push(reference.clone());
        }
    }
    settings.ignore_dashboard_filters = list;
    store_settings(ctx, widget, settings)
}

pub(super) fn change_filter_settings(
    ctx: &HandlerContext<'_>,
    widget: &LocalId,
    operation: &FilterSettingsOp,
) -> Result<Applied, CommandError> {
    let mut settings = current_settings(ctx.state, widget)?;
    let context = ctx.state.dashboard.active_filter_context();

    match operation {
        FilterSettingsOp::Replace { settings: replacement } => {
            if let Some(data_set) = &replacement.date_data_set {
                check_data_set(ctx, data_set)?;
            }
            for reference in &replacement.ignore_dashboard_filters {
                check_reference(&context, reference)?;
            }
            settings = replacement.clone();
        }
        FilterSettingsOp::EnableDateFilter { data_set } => {
            check_data_set(ctx, data_set)?;
            settings.date_data_set = Some(data_set.clone());
        }
        FilterSettingsOp::DisableDateFilter => settings.date_data_set = None,
        FilterSettingsOp::ReplaceAttributeIgnores { display_forms } => {
            for display_form in display_forms {
                check_display_form(&context, display_form)?;
            }
            settings
                .ignore_dashboard_filters
                .retain(|r| matches!(r, FilterReference::Date { .. }));
            for display_form in display_forms {
                let reference = FilterReference::attribute(display_form.clone());
                if !settings.ignores(&reference) {
                    settings.ignore_dashboard_filters.push(reference);
                }
            }
        }
        FilterSettingsOp::IgnoreAttributeFilter { display_form } => {
            check_display_form(&context, display_form)?;
            let reference = FilterReference::attribute(display_form.clone());
            if !settings.ignores(&reference) {
                settings.ignore_dashboard_filters.push(reference);
            }
        }
        FilterSettingsOp::UnignoreAttributeFilter { display_form } => {
            check_display_form(&context, display_form)?;
            let reference = FilterReference::attribute(display_form.clone());
            settings.ignore_dashboard_filters.retain(|r| r != &reference);
        }
    }

    store_settings(ctx, widget, settings)
}

pub(super) fn change_insight(
    ctx: &HandlerContext<'_>,
    widget: &LocalId,
    insight: &ObjRef,
) -> Result<Applied, CommandError> {
    let mut state = ctx.state.clone();
    let target = state
        .dashboard
        .active_tab_mut()
        .layout
        .widget_mut(widget)
        .ok_or_else(|| CommandError::UnknownWidget(widget.clone()))?;
    match &mut target.kind {
        WidgetKind::Insight(content) => content.insight = insight.clone(),
        _ => return Err(CommandError::NotAnInsightWidget(widget.clone())),
    }

    Ok(Applied {
        state,
        events: vec![DashboardEvent::WidgetInsightChanged {
            widget: widget.clone(),
            insight: insight.clone(),
        }],
        recompute: Recompute::Widgets(vec![widget.clone()]),
        history: HistoryChange::Record,
    })
}
