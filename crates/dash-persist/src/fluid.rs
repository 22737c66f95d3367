//! "Fluid" schema: `dashboard.content.tabs[].layout.fluidLayout.rows[].columns[]`
//!
//! Rows map to sections and columns to items. Widgets are externally tagged
//! (`{"visualizationWidget": {...}}`, `{"kpi": {...}}`) and ignore lists hold
//! wrapped references such as `{"attributeFilterReference": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dash_core::{
    Dashboard, DashboardTab, FilterReference, FilterSettings, GridSize, Item, ItemSize, Layout, LocalId, ObjRef,
    Section, SectionHeader, SwitcherEntry, TabId, Widget, WidgetHeader, WidgetKind,
};
use dash_core::widget::{ContainerWidget, InsightWidget, KpiWidget, RichTextWidget, VisualizationSwitcherWidget};

use crate::filters::{decode_filters, encode_filters, FilterDto};
use crate::{build_dashboard, DocumentCodec, PersistError};

#[derive(Debug, Serialize, Deserialize)]
struct FluidDocument {
    dashboard: FluidDashboard,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FluidDashboard {
    meta: FluidMeta,
    content: FluidContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FluidMeta {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    obj_ref: Option<ObjRef>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FluidContent {
    #[serde(default)]
    filter_context: FluidFilterContext,
    tabs: Vec<FluidTab>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FluidFilterContext {
    #[serde(default)]
    filters: Vec<FilterDto>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FluidTab {
    identifier: TabId,
    #[serde(default)]
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter_context: Option<FluidFilterContext>,
    layout: FluidLayout,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FluidLayout {
    fluid_layout: FluidRows,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FluidRows {
    #[serde(default)]
    rows: Vec<FluidRow>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FluidRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<SectionHeader>,
    #[serde(default)]
    columns: Vec<FluidColumn>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FluidColumn {
    size: FluidSize,
    /// `None` for an empty placeholder column
    #[serde(default)]
    content: Option<FluidColumnContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FluidColumnContent {
    widget: FluidWidget,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct FluidGrid {
    width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FluidSize {
    xl: FluidGrid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lg: Option<FluidGrid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    md: Option<FluidGrid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sm: Option<FluidGrid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    xs: Option<FluidGrid>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum FluidWidget {
    VisualizationWidget(FluidVisualization),
    Kpi(FluidKpi),
    RichText(FluidRichText),
    VisualizationSwitcher(FluidSwitcher),
    Container(FluidContainer),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FluidWidgetMeta {
    local_identifier: LocalId,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    obj_ref: Option<ObjRef>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum FluidReference {
    AttributeFilterReference {
        #[serde(rename = "displayForm")]
        display_form: ObjRef,
    },
    DateFilterReference {
        #[serde(rename = "dataSet", default, skip_serializing_if = "Option::is_none")]
        data_set: Option<ObjRef>,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FluidFilterSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ignore_dashboard_filters: Vec<FluidReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_data_set: Option<ObjRef>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FluidVisualization {
    #[serde(flatten)]
    meta: FluidWidgetMeta,
    vis_obj: ObjRef,
    #[serde(flatten)]
    filters: FluidFilterSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct FluidKpi {
    #[serde(flatten)]
    meta: FluidWidgetMeta,
    metric: ObjRef,
    #[serde(flatten)]
    filters: FluidFilterSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct FluidRichText {
    #[serde(flatten)]
    meta: FluidWidgetMeta,
    #[serde(default)]
    content: String,
    #[serde(flatten)]
    filters: FluidFilterSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct FluidSwitcher {
    #[serde(flatten)]
    meta: FluidWidgetMeta,
    #[serde(default)]
    visualizations: Vec<FluidVisualization>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FluidContainer {
    #[serde(flatten)]
    meta: FluidWidgetMeta,
    layout: FluidLayout,
}

/// Codec for the rows/columns schema
#[derive(Debug, Clone, Copy, Default)]
pub struct FluidCodec;

impl DocumentCodec for FluidCodec {
    fn decode(&self, document: Value) -> Result<Dashboard, PersistError> {
        let FluidDocument { dashboard } = serde_json::from_value(document)?;
        let common = decode_filters(dashboard.content.filter_context.filters)?;

        let mut tabs = Vec::with_capacity(dashboard.content.tabs.len());
        for tab in dashboard.content.tabs {
            let filters = decode_filters(tab.filter_context.unwrap_or_default().filters)?;
            tabs.push(DashboardTab::new(tab.identifier, tab.title, decode_layout(tab.layout)).with_filters(filters));
        }

        build_dashboard(
            dashboard.meta.obj_ref,
            dashboard.meta.title,
            dashboard.meta.summary,
            common,
            tabs,
        )
    }

    fn encode(&self, dashboard: &Dashboard) -> Result<Value, PersistError> {
        let tabs = dashboard
            .tabs()
            .iter()
            .map(|tab| FluidTab {
                identifier: tab.id.clone(),
                title: tab.title.clone(),
                filter_context: (!tab.filters.is_empty()).then(|| FluidFilterContext {
                    filters: encode_filters(&tab.filters),
                }),
                layout: encode_layout(&tab.layout),
            })
            .collect();

        let document = FluidDocument {
            dashboard: FluidDashboard {
                meta: FluidMeta {
                    obj_ref: dashboard.obj_ref.clone(),
                    title: dashboard.title.clone(),
                    summary: dashboard.description.clone(),
                },
                content: FluidContent {
                    filter_context: FluidFilterContext {
                        filters: encode_filters(&dashboard.common_filters),
                    },
                    tabs,
                },
            },
        };
        Ok(serde_json::to_value(document)?)
    }
}

fn decode_layout(layout: FluidLayout) -> Layout {
    let sections = layout
        .fluid_layout
        .rows
        .into_iter()
        .map(|row| {
            let items = row
                .columns
                .into_iter()
                .map(|column| Item {
                    size: decode_size(&column.size),
                    widget: column.content.map(|c| decode_widget(c.widget)),
                })
                .collect();
            Section::new(row.header.unwrap_or_default(), items)
        })
        .collect();
    Layout::new(sections)
}

fn encode_layout(layout: &Layout) -> FluidLayout {
    let rows = layout
        .sections
        .iter()
        .map(|section| FluidRow {
            header: (section.header != SectionHeader::default()).then(|| section.header.clone()),
            columns: section
                .items
                .iter()
                .map(|item| FluidColumn {
                    size: encode_size(&item.size),
                    content: item.widget.as_ref().map(|w| FluidColumnContent {
                        widget: encode_widget(w),
                    }),
                })
                .collect(),
        })
        .collect();
    FluidLayout {
        fluid_layout: FluidRows { rows },
    }
}

fn decode_size(size: &FluidSize) -> ItemSize {
    let grid = |g: FluidGrid| GridSize::new(g.width, g.height);
    ItemSize {
        xl: grid(size.xl),
        lg: size.lg.map(grid),
        md: size.md.map(grid),
        sm: size.sm.map(grid),
        xs: size.xs.map(grid),
    }
}

fn encode_size(size: &ItemSize) -> FluidSize {
    let grid = |g: GridSize| FluidGrid {
        width: g.grid_width,
        height: g.grid_height,
    };
    FluidSize {
        xl: grid(size.xl),
        lg: size.lg.map(grid),
        md: size.md.map(grid),
        sm: size.sm.map(grid),
        xs: size.xs.map(grid),
    }
}

fn decode_header(meta: FluidWidgetMeta) -> WidgetHeader {
    WidgetHeader {
        local_id: meta.local_identifier,
        obj_ref: meta.obj_ref,
        title: meta.title,
        description: meta.summary,
    }
}

fn encode_header(header: &WidgetHeader) -> FluidWidgetMeta {
    FluidWidgetMeta {
        local_identifier: header.local_id.clone(),
        obj_ref: header.obj_ref.clone(),
        title: header.title.clone(),
        summary: header.description.clone(),
    }
}

fn decode_settings(settings: FluidFilterSettings) -> FilterSettings {
    FilterSettings {
        ignore_dashboard_filters: settings
            .ignore_dashboard_filters
            .into_iter()
            .map(|reference| match reference {
                FluidReference::AttributeFilterReference { display_form } => FilterReference::attribute(display_form),
                FluidReference::DateFilterReference { data_set } => FilterReference::Date { data_set },
            })
            .collect(),
        date_data_set: settings.date_data_set,
    }
}

fn encode_settings(settings: &FilterSettings) -> FluidFilterSettings {
    FluidFilterSettings {
        ignore_dashboard_filters: settings
            .ignore_dashboard_filters
            .iter()
            .map(|reference| match reference {
                FilterReference::Attribute { display_form } => FluidReference::AttributeFilterReference {
                    display_form: display_form.clone(),
                },
                FilterReference::Date { data_set } => FluidReference::DateFilterReference {
                    data_set: data_set.clone(),
                },
            })
            .collect(),
        date_data_set: settings.date_data_set.clone(),
    }
}

fn decode_visualization(vis: FluidVisualization) -> (WidgetHeader, InsightWidget) {
    let insight = InsightWidget {
        insight: vis.vis_obj,
        filters: decode_settings(vis.filters),
    };
    (decode_header(vis.meta), insight)
}

fn encode_visualization(header: &WidgetHeader, insight: &InsightWidget) -> FluidVisualization {
    FluidVisualization {
        meta: encode_header(header),
        vis_obj: insight.insight.clone(),
        filters: encode_settings(&insight.filters),
    }
}

fn decode_widget(widget: FluidWidget) -> Widget {
    match widget {
        FluidWidget::VisualizationWidget(vis) => {
            let (header, insight) = decode_visualization(vis);
            Widget::new(header, WidgetKind::Insight(insight))
        }
        FluidWidget::Kpi(kpi) => Widget::new(
            decode_header(kpi.meta),
            WidgetKind::Kpi(KpiWidget {
                measure: kpi.metric,
                filters: decode_settings(kpi.filters),
            }),
        ),
        FluidWidget::RichText(text) => Widget::new(
            decode_header(text.meta),
            WidgetKind::RichText(RichTextWidget {
                content: text.content,
                filters: decode_settings(text.filters),
            }),
        ),
        FluidWidget::VisualizationSwitcher(switcher) => {
            let visualizations = switcher
                .visualizations
                .into_iter()
                .map(|vis| {
                    let (header, insight) = decode_visualization(vis);
                    SwitcherEntry { header, insight }
                })
                .collect();
            Widget::new(
                decode_header(switcher.meta),
                WidgetKind::VisualizationSwitcher(VisualizationSwitcherWidget { visualizations }),
            )
        }
        FluidWidget::Container(container) => Widget::new(
            decode_header(container.meta),
            WidgetKind::Container(ContainerWidget {
                layout: decode_layout(container.layout),
            }),
        ),
    }
}

fn encode_widget(widget: &Widget) -> FluidWidget {
    let meta = encode_header(&widget.header);
    match &widget.kind {
        WidgetKind::Insight(insight) => FluidWidget::VisualizationWidget(encode_visualization(&widget.header, insight)),
        WidgetKind::Kpi(kpi) => FluidWidget::Kpi(FluidKpi {
            meta,
            metric: kpi.measure.clone(),
            filters: encode_settings(&kpi.filters),
        }),
        WidgetKind::RichText(text) => FluidWidget::RichText(FluidRichText {
            meta,
            content: text.content.clone(),
            filters: encode_settings(&text.filters),
        }),
        WidgetKind::VisualizationSwitcher(switcher) => FluidWidget::VisualizationSwitcher(FluidSwitcher {
            meta,
            visualizations: switcher
                .visualizations
                .iter()
                .map(|entry| encode_visualization(&entry.header, &entry.insight))
                .collect(),
        }),
        WidgetKind::Container(container) => FluidWidget::Container(FluidContainer {
            meta,
            layout: encode_layout(&container.layout),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_rows_and_columns() {
        let document = json!({
            "dashboard": {
                "meta": {"title": "Sales", "ref": {"uri": "/gdc/md/p/obj/12"}},
                "content": {
                    "filterContext": {"filters": [
                        {"dateFilter": {"granularity": "GDC.time.year", "type": "relative", "from": -1, "to": 0}}
                    ]},
                    "tabs": [{
                        "identifier": "main",
                        "layout": {"fluidLayout": {"rows": [{
                            "header": {"title": "Overview"},
                            "columns": [
                                {"size": {"xl": {"width": 6, "height": 10}},
                                 "content": {"widget": {"visualizationWidget": {
                                     "localIdentifier": "w1", "title": "Revenue",
                                     "visObj": {"identifier": "insight.sales"},
                                     "ignoreDashboardFilters": [
                                         {"attributeFilterReference": {"displayForm": {"identifier": "label.region"}}}
                                     ],
                                     "dateDataSet": {"identifier": "dt.created"}
                                 }}}},
                                {"size": {"xl": {"width": 6}}}
                            ]
                        }]}}
                    }]
                }
            }
        });

        let dashboard = FluidCodec.decode(document).unwrap();
        assert_eq!(dashboard.obj_ref, Some(ObjRef::uri("/gdc/md/p/obj/12")));
        assert!(dashboard.common_filters.common_date_filter().is_some());

        let layout = &dashboard.active_tab().layout;
        assert_eq!(layout.sections[0].header.title.as_deref(), Some("Overview"));
        assert_eq!(layout.sections[0].items.len(), 2);
        assert!(layout.sections[0].items[1].widget.is_none());

        let widget = layout.widget(&LocalId::from("w1")).unwrap();
        assert_eq!(widget.header.title, "Revenue");
        let settings = widget.filter_settings().unwrap();
        assert!(settings.ignores(&FilterReference::attribute(ObjRef::id("label.region"))));
        assert_eq!(settings.date_data_set, Some(ObjRef::id("dt.created")));
        assert_eq!(layout.sections[0].items[0].size.xl, GridSize::new(6, Some(10)));
    }

    #[test]
    fn test_encode_uses_wrapped_widgets() {
        let dashboard = Dashboard::single(
            "Ops",
            Layout::new(vec![Section::new(
                SectionHeader::default(),
                vec![Item::new(ItemSize::xl(12, None), Widget::kpi("k1", ObjRef::id("measure.count")))],
            )]),
            dash_core::FilterContext::empty(),
        );
        let value = FluidCodec.encode(&dashboard).unwrap();
        let row = &value["dashboard"]["content"]["tabs"][0]["layout"]["fluidLayout"]["rows"][0];
        assert!(row.get("header").is_none());
        assert_eq!(row["columns"][0]["content"]["widget"]["kpi"]["metric"], json!({"identifier": "measure.count"}));
        assert_eq!(row["columns"][0]["size"]["xl"], json!({"width": 12}));
    }
}
