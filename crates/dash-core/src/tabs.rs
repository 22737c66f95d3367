//! Dashboard made of tabs, each with its own layout and tab-local filters

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filters::FilterContext;
use crate::layout::Layout;
use crate::refs::{LocalId, ObjRef, TabId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TabError {
    #[error("Dashboard has no tabs")]
    NoTabs,

    #[error("Tab '{0}' does not exist")]
    UnknownTab(TabId),

    #[error("Tab '{0}' is defined more than once")]
    DuplicateTab(TabId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardTab {
    pub id: TabId,
    pub title: String,
    pub layout: Layout,
    /// Tab-local filters; they override common filters with the same identity
    pub filters: FilterContext,
}

impl DashboardTab {
    pub fn new(id: impl Into<TabId>, title: impl Into<String>, layout: Layout) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            layout,
            filters: FilterContext::empty(),
        }
    }

    pub fn with_filters(mut self, filters: FilterContext) -> Self {
        self.filters = filters;
        self
    }
}

/// In-memory dashboard. Inactive tabs keep their full state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub obj_ref: Option<ObjRef>,
    pub title: String,
    pub description: String,
    /// Filters shared by every tab
    pub common_filters: FilterContext,
    tabs: Vec<DashboardTab>,
    active_tab: usize,
}

impl Dashboard {
    /// Create a dashboard with the first tab active
    pub fn new(
        title: impl Into<String>,
        common_filters: FilterContext,
        tabs: Vec<DashboardTab>,
    ) -> Result<Self, TabError> {
        if tabs.is_empty() {
            return Err(TabError::NoTabs);
        }
        for (i, tab) in tabs.iter().enumerate() {
            if tabs[..i].iter().any(|t| t.id == tab.id) {
                return Err(TabError::DuplicateTab(tab.id.clone()));
            }
        }
        Ok(Self {
            obj_ref: None,
            title: title.into(),
            description: String::new(),
            common_filters,
            tabs,
            active_tab: 0,
        })
    }

    /// Dashboard without explicit tabs: one implicit tab holding the layout
    pub fn single(title: impl Into<String>, layout: Layout, filters: FilterContext) -> Self {
        Self {
            obj_ref: None,
            title: title.into(),
            description: String::new(),
            common_filters: filters,
            tabs: vec![DashboardTab::new("default", "", layout)],
            active_tab: 0,
        }
    }

    pub fn tabs(&self) -> &[DashboardTab] {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut [DashboardTab] {
        &mut self.tabs
    }

    pub fn active_index(&self) -> usize {
        self.active_tab
    }

    pub fn active_tab(&self) -> &DashboardTab {
        &self.tabs[self.active_tab]
    }

    pub fn active_tab_mut(&mut self) -> &mut DashboardTab {
        &mut self.tabs[self.active_tab]
    }

    pub fn tab(&self, id: &TabId) -> Option<&DashboardTab> {
        self.tabs.iter().find(|t| &t.id == id)
    }

    /// Make `id` the active tab; returns the previously active tab id
    pub fn switch_to(&mut self, id: &TabId) -> Result<TabId, TabError> {
        let index = self
            .tabs
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| TabError::UnknownTab(id.clone()))?;
        let previous = self.tabs[self.active_tab].id.clone();
        self.active_tab = index;
        Ok(previous)
    }

    /// Common filters flattened with the active tab's local filters
    pub fn active_filter_context(&self) -> FilterContext {
        FilterContext::merged(&self.common_filters, &self.active_tab().filters)
    }

    /// Local identifiers of every tab, in tab order
    pub fn local_ids(&self) -> Vec<&LocalId> {
        let mut out = Vec::new();
        for tab in &self.tabs {
            tab.layout.collect_local_ids(&mut out);
        }
        out
    }

    /// Replace every tab layout at once, keeping filters and the active tab
    pub fn restore_layouts(&mut self, layouts: Vec<Layout>) {
        for (tab, layout) in self.tabs.iter_mut().zip(layouts) {
            tab.layout = layout;
        }
    }

    pub fn layouts(&self) -> Vec<Layout> {
        self.tabs.iter().map(|t| t.layout.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{AttributeFilter, AttributeSelection, FilterItem};

    fn context(filters: Vec<AttributeFilter>) -> FilterContext {
        FilterContext::new(filters.into_iter().map(FilterItem::Attribute).collect()).unwrap()
    }

    #[test]
    fn test_switch_keeps_inactive_state() {
        let mut dashboard = Dashboard::new(
            "Sales",
            FilterContext::empty(),
            vec![
                DashboardTab::new("t1", "One", Layout::default()),
                DashboardTab::new("t2", "Two", Layout::default()),
            ],
        )
        .unwrap();
        dashboard.active_tab_mut().title = "Renamed".into();

        let previous = dashboard.switch_to(&TabId::from("t2")).unwrap();
        assert_eq!(previous, TabId::from("t1"));
        assert_eq!(dashboard.active_tab().title, "Two");
        assert_eq!(dashboard.tab(&TabId::from("t1")).unwrap().title, "Renamed");

        assert_eq!(
            dashboard.switch_to(&TabId::from("t9")),
            Err(TabError::UnknownTab(TabId::from("t9")))
        );
        assert_eq!(dashboard.active_index(), 1);
    }

    #[test]
    fn test_tab_filters_override_common() {
        let region = ObjRef::id("label.region");
        let common = context(vec![
            AttributeFilter::new("f1", region.clone()),
            AttributeFilter::new("f2", ObjRef::id("label.product")),
        ]);
        let local = context(vec![
            AttributeFilter::new("f1", region.clone()).with_selection(AttributeSelection::positive(["EU"])),
            AttributeFilter::new("f3", ObjRef::id("label.channel")),
        ]);
        let dashboard = Dashboard::new(
            "d",
            common,
            vec![DashboardTab::new("t", "", Layout::default()).with_filters(local)],
        )
        .unwrap();

        let merged = dashboard.active_filter_context();
        let ids: Vec<_> = merged.attribute_filters().map(|f| f.local_id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);
        assert!(merged.attribute_filter_by_display_form(&region).unwrap().selection.contains("EU"));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_tabs() {
        assert_eq!(Dashboard::new("d", FilterContext::empty(), vec![]), Err(TabError::NoTabs));
        let tabs = vec![
            DashboardTab::new("t", "", Layout::default()),
            DashboardTab::new("t", "", Layout::default()),
        ];
        assert_eq!(
            Dashboard::new("d", FilterContext::empty(), tabs),
            Err(TabError::DuplicateTab(TabId::from("t")))
        );
    }
}
