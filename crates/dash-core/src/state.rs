//! Dashboard state owned by the dispatcher and handed out as immutable snapshots

use std::sync::Arc;

use thiserror::Error;

use crate::layout::duplicates;
use crate::refs::LocalId;
use crate::stash::Stash;
use crate::tabs::Dashboard;

/// Broken structural invariant; indicates a defect in an edit, not bad input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("Local identifiers are not unique: {0:?}")]
    DuplicateLocalIds(Vec<LocalId>),

    #[error("Active tab {active} out of range (tabs: {len})")]
    ActiveTabOutOfRange { active: usize, len: usize },

    #[error("Stash holds a widget that is still in the layout: {0}")]
    StashedWidgetInLayout(LocalId),
}

/// Layout tree, stash and filters of one dashboard plus their version counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardState {
    pub dashboard: Dashboard,
    pub stash: Stash,
    /// Bumped on every structural mutation; deferred work compares against it
    pub layout_version: u64,
    /// Bumped whenever the effective filter inputs of the active tab change
    pub filters_version: u64,
}

impl DashboardState {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard,
            stash: Stash::new(),
            layout_version: 0,
            filters_version: 0,
        }
    }

    /// Check the invariants every committed state must hold
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let tabs = self.dashboard.tabs();
        if self.dashboard.active_index() >= tabs.len() {
            return Err(InvariantError::ActiveTabOutOfRange {
                active: self.dashboard.active_index(),
                len: tabs.len(),
            });
        }

        let ids = self.dashboard.local_ids();
        let dupes = duplicates(ids.iter().copied());
        if !dupes.is_empty() {
            return Err(InvariantError::DuplicateLocalIds(dupes));
        }

        let mut stashed = Vec::new();
        for (_, nodes) in self.stash.entries() {
            nodes.collect_local_ids(&mut stashed);
        }
        if let Some(id) = stashed.into_iter().find(|id| ids.contains(id)) {
            return Err(InvariantError::StashedWidgetInLayout(id.clone()));
        }
        Ok(())
    }

    /// Freeze the current state for readers
    pub fn snapshot(&self) -> Arc<DashboardState> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterContext;
    use crate::layout::{Item, ItemSize, Layout, Section, SectionHeader};
    use crate::refs::StashKey;
    use crate::stash::StashedNodes;
    use crate::tabs::DashboardTab;
    use crate::widget::Widget;

    fn item(id: &str) -> Item {
        Item::new(ItemSize::xl(6, None), Widget::rich_text(id, ""))
    }

    fn layout(ids: &[&str]) -> Layout {
        Layout::new(vec![Section::new(SectionHeader::default(), ids.iter().map(|id| item(id)).collect())])
    }

    #[test]
    fn test_ids_unique_across_tabs() {
        let dashboard = Dashboard::new(
            "d",
            FilterContext::empty(),
            vec![
                DashboardTab::new("t1", "", layout(&["a", "b"])),
                DashboardTab::new("t2", "", layout(&["c", "a"])),
            ],
        )
        .unwrap();
        let state = DashboardState::new(dashboard);
        assert_eq!(
            state.check_invariants(),
            Err(InvariantError::DuplicateLocalIds(vec![LocalId::from("a")]))
        );
    }

    #[test]
    fn test_stashed_widget_must_be_detached() {
        let mut state = DashboardState::new(Dashboard::single("d", layout(&["a"]), FilterContext::empty()));
        assert!(state.check_invariants().is_ok());

        state.stash.put(StashKey::from("k"), StashedNodes::Items(vec![item("a")]));
        assert_eq!(
            state.check_invariants(),
            Err(InvariantError::StashedWidgetInLayout(LocalId::from("a")))
        );
    }
}
