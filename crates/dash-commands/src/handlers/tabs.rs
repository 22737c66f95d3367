use dash_core::{DashboardEvent, TabId};

use super::{Applied, HandlerContext, HistoryChange, Recompute};
use crate::error::CommandError;

pub(super) fn switch_active_tab(ctx: &HandlerContext<'_>, tab: &TabId) -> Result<Applied, CommandError> {
    let mut state = ctx.state.clone();
    let previous = state.dashboard.switch_to(tab)?;
    // the active filter context is a different one now
    state.filters_version += 1;

    Ok(Applied {
        state,
        events: vec![DashboardEvent::ActiveTabSwitched {
            previous,
            current: tab.clone(),
        }],
        recompute: Recompute::ActiveTab,
        history: HistoryChange::Keep,
    })
}
