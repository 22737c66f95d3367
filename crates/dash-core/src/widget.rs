//! Widgets placed in layout items

use serde::{Deserialize, Serialize};

use crate::filters::FilterReference;
use crate::layout::Layout;
use crate::refs::{LocalId, ObjRef};

/// Identity and labels shared by every widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetHeader {
    pub local_id: LocalId,
    /// Durable reference, assigned by the backend on first save
    pub obj_ref: Option<ObjRef>,
    pub title: String,
    pub description: String,
}

impl WidgetHeader {
    pub fn new(local_id: impl Into<LocalId>) -> Self {
        Self {
            local_id: local_id.into(),
            obj_ref: None,
            title: String::new(),
            description: String::new(),
        }
    }
}

/// Which dashboard filters apply to a widget
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSettings {
    pub ignore_dashboard_filters: Vec<FilterReference>,
    /// Date dataset the dashboard date filter binds to; `None` disables date filtering
    pub date_data_set: Option<ObjRef>,
}

impl FilterSettings {
    pub fn with_date_data_set(data_set: ObjRef) -> Self {
        Self {
            ignore_dashboard_filters: Vec::new(),
            date_data_set: Some(data_set),
        }
    }

    pub fn ignores(&self, reference: &FilterReference) -> bool {
        self.ignore_dashboard_filters.contains(reference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiWidget {
    pub measure: ObjRef,
    pub filters: FilterSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightWidget {
    pub insight: ObjRef,
    pub filters: FilterSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichTextWidget {
    pub content: String,
    pub filters: FilterSettings,
}

/// One visualization inside a visualization switcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitcherEntry {
    pub header: WidgetHeader,
    pub insight: InsightWidget,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisualizationSwitcherWidget {
    pub visualizations: Vec<SwitcherEntry>,
}

/// Container widget owning a nested layout
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContainerWidget {
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetKind {
    Kpi(KpiWidget),
    Insight(InsightWidget),
    RichText(RichTextWidget),
    VisualizationSwitcher(VisualizationSwitcherWidget),
    Container(ContainerWidget),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    pub header: WidgetHeader,
    pub kind: WidgetKind,
}

/// Where the date semantics of a filterable widget come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource<'a> {
    Insight(&'a ObjRef),
    Measure(&'a ObjRef),
    /// Widget without analytical content of its own (rich text)
    Unbound,
}

/// A widget, or switcher entry, that runs a query and therefore receives filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterTarget<'a> {
    pub local_id: &'a LocalId,
    pub settings: &'a FilterSettings,
    pub source: DateSource<'a>,
}

impl Widget {
    pub fn new(header: WidgetHeader, kind: WidgetKind) -> Self {
        Self { header, kind }
    }

    pub fn kpi(local_id: impl Into<LocalId>, measure: ObjRef) -> Self {
        Self::new(
            WidgetHeader::new(local_id),
            WidgetKind::Kpi(KpiWidget {
                measure,
                filters: FilterSettings::default(),
            }),
        )
    }

    pub fn insight(local_id: impl Into<LocalId>, insight: ObjRef) -> Self {
        Self::new(
            WidgetHeader::new(local_id),
            WidgetKind::Insight(InsightWidget {
                insight,
                filters: FilterSettings::default(),
            }),
        )
    }

    pub fn rich_text(local_id: impl Into<LocalId>, content: impl Into<String>) -> Self {
        Self::new(
            WidgetHeader::new(local_id),
            WidgetKind::RichText(RichTextWidget {
                content: content.into(),
                filters: FilterSettings::default(),
            }),
        )
    }

    pub fn switcher(local_id: impl Into<LocalId>, visualizations: Vec<SwitcherEntry>) -> Self {
        Self::new(
            WidgetHeader::new(local_id),
            WidgetKind::VisualizationSwitcher(VisualizationSwitcherWidget { visualizations }),
        )
    }

    pub fn container(local_id: impl Into<LocalId>, layout: Layout) -> Self {
        Self::new(WidgetHeader::new(local_id), WidgetKind::Container(ContainerWidget { layout }))
    }

    pub fn with_filters(mut self, settings: FilterSettings) -> Self {
        if let Some(filters) = self.filter_settings_mut() {
            *filters = settings;
        }
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.header.title = title.into();
        self
    }

    pub fn local_id(&self) -> &LocalId {
        &self.header.local_id
    }

    /// Stable type tag used in logs and persisted documents
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            WidgetKind::Kpi(_) => "kpi",
            WidgetKind::Insight(_) => "insight",
            WidgetKind::RichText(_) => "richText",
            WidgetKind::VisualizationSwitcher(_) => "visualizationSwitcher",
            WidgetKind::Container(_) => "container",
        }
    }

    /// Filter settings of the widget itself. Switchers and containers have none;
    /// their entries or nested widgets carry their own.
    pub fn filter_settings(&self) -> Option<&FilterSettings> {
        match &self.kind {
            WidgetKind::Kpi(kpi) => Some(&kpi.filters),
            WidgetKind::Insight(insight) => Some(&insight.filters),
            WidgetKind::RichText(text) => Some(&text.filters),
            WidgetKind::VisualizationSwitcher(_) | WidgetKind::Container(_) => None,
        }
    }

    pub fn filter_settings_mut(&mut self) -> Option<&mut FilterSettings> {
        match &mut self.kind {
            WidgetKind::Kpi(kpi) => Some(&mut kpi.filters),
            WidgetKind::Insight(insight) => Some(&mut insight.filters),
            WidgetKind::RichText(text) => Some(&mut text.filters),
            WidgetKind::VisualizationSwitcher(_) | WidgetKind::Container(_) => None,
        }
    }

    pub fn nested_layout(&self) -> Option<&Layout> {
        match &self.kind {
            WidgetKind::Container(container) => Some(&container.layout),
            _ => None,
        }
    }

    pub fn nested_layout_mut(&mut self) -> Option<&mut Layout> {
        match &mut self.kind {
            WidgetKind::Container(container) => Some(&mut container.layout),
            _ => None,
        }
    }

    /// Every local identifier owned by this widget, depth-first
    pub fn collect_local_ids<'a>(&'a self, out: &mut Vec<&'a LocalId>) {
        out.push(&self.header.local_id);
        match &self.kind {
            WidgetKind::VisualizationSwitcher(switcher) => {
                out.extend(switcher.visualizations.iter().map(|v| &v.header.local_id));
            }
            WidgetKind::Container(container) => container.layout.collect_local_ids(out),
            WidgetKind::Kpi(_) | WidgetKind::Insight(_) | WidgetKind::RichText(_) => {}
        }
    }

    /// Filter targets owned by this widget, depth-first
    pub fn collect_filter_targets<'a>(&'a self, out: &mut Vec<FilterTarget<'a>>) {
        let local_id = &self.header.local_id;
        match &self.kind {
            WidgetKind::Kpi(kpi) => out.push(FilterTarget {
                local_id,
                settings: &kpi.filters,
                source: DateSource::Measure(&kpi.measure),
            }),
            WidgetKind::Insight(insight) => out.push(FilterTarget {
                local_id,
                settings: &insight.filters,
                source: DateSource::Insight(&insight.insight),
            }),
            WidgetKind::RichText(text) => out.push(FilterTarget {
                local_id,
                settings: &text.filters,
                source: DateSource::Unbound,
            }),
            WidgetKind::VisualizationSwitcher(switcher) => {
                out.extend(switcher.visualizations.iter().map(|entry| FilterTarget {
                    local_id: &entry.header.local_id,
                    settings: &entry.insight.filters,
                    source: DateSource::Insight(&entry.insight.insight),
                }));
            }
            WidgetKind::Container(container) => container.layout.collect_filter_targets(out),
        }
    }

    /// Mutable filter settings of the widget or switcher entry with `id`, searching nested layouts
    pub fn filter_settings_for_mut(&mut self, id: &LocalId) -> Option<&mut FilterSettings> {
        if &self.header.local_id == id {
            return self.filter_settings_mut();
        }
        match &mut self.kind {
            WidgetKind::VisualizationSwitcher(switcher) => switcher
                .visualizations
                .iter_mut()
                .find(|entry| &entry.header.local_id == id)
                .map(|entry| &mut entry.insight.filters),
            WidgetKind::Container(container) => container.layout.filter_settings_mut(id),
            WidgetKind::Kpi(_) | WidgetKind::Insight(_) | WidgetKind::RichText(_) => None,
        }
    }
}

impl SwitcherEntry {
    pub fn new(local_id: impl Into<LocalId>, insight: ObjRef) -> Self {
        Self {
            header: WidgetHeader::new(local_id),
            insight: InsightWidget {
                insight,
                filters: FilterSettings::default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switcher_exposes_entries_as_targets() {
        let widget = Widget::switcher(
            "sw",
            vec![
                SwitcherEntry::new("sw-1", ObjRef::id("insight.a")),
                SwitcherEntry::new("sw-2", ObjRef::id("insight.b")),
            ],
        );
        let mut targets = Vec::new();
        widget.collect_filter_targets(&mut targets);
        let ids: Vec<_> = targets.iter().map(|t| t.local_id.as_str()).collect();
        assert_eq!(ids, vec!["sw-1", "sw-2"]);
        assert!(widget.filter_settings().is_none());

        let mut ids = Vec::new();
        widget.collect_local_ids(&mut ids);
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_with_filters_ignored_for_containers() {
        let widget = Widget::container("c", Layout::default())
            .with_filters(FilterSettings::with_date_data_set(ObjRef::id("dt")));
        assert!(widget.filter_settings().is_none());
        assert_eq!(widget.type_name(), "container");
    }
}
