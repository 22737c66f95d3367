//! "Sections" schema: `data.attributes.content.tabs[].layout.sections[].items[]`
//!
//! Widgets carry a `type` tag. Nested containers embed their sections directly.
//! The dashboard is addressed by a string `id`, so only identifier refs can be
//! stored at the document root.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dash_core::widget::{ContainerWidget, InsightWidget, KpiWidget, RichTextWidget, VisualizationSwitcherWidget};
use dash_core::{
    Dashboard, DashboardTab, FilterReference, FilterSettings, Item, ItemSize, Layout, LocalId, ObjRef, Section,
    SectionHeader, SwitcherEntry, TabId, Widget, WidgetHeader, WidgetKind,
};

use crate::filters::{decode_filters, encode_filters, FilterDto};
use crate::{build_dashboard, DocumentCodec, PersistError};

const DOCUMENT_TYPE: &str = "analyticalDashboard";

#[derive(Debug, Serialize, Deserialize)]
struct SectionsDocument {
    data: SectionsData,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionsData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type", default = "document_type")]
    kind: String,
    attributes: SectionsAttributes,
}

fn document_type() -> String {
    DOCUMENT_TYPE.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionsAttributes {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    content: SectionsContent,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionsContent {
    #[serde(default)]
    filters: Vec<FilterDto>,
    tabs: Vec<SectionsTab>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectionsTab {
    local_identifier: TabId,
    #[serde(default)]
    title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    filters: Vec<FilterDto>,
    layout: SectionsLayout,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SectionsLayout {
    #[serde(default)]
    sections: Vec<SectionsSection>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<SectionHeader>,
    #[serde(default)]
    items: Vec<SectionsItem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionsItem {
    size: ItemSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    widget: Option<SectionsWidget>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum SectionsWidget {
    Insight(SectionsInsight),
    Kpi(SectionsKpi),
    RichText(SectionsRichText),
    VisualizationSwitcher(SectionsSwitcher),
    #[serde(rename = "IDashboardLayout")]
    Container(SectionsContainer),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectionsWidgetMeta {
    local_identifier: LocalId,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    obj_ref: Option<ObjRef>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum SectionsReference {
    #[serde(rename_all = "camelCase")]
    AttributeFilterReference { display_form: ObjRef },
    #[serde(rename_all = "camelCase")]
    DateFilterReference {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_set: Option<ObjRef>,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectionsFilterSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ignore_dashboard_filters: Vec<SectionsReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_data_set: Option<ObjRef>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionsInsight {
    #[serde(flatten)]
    meta: SectionsWidgetMeta,
    insight: ObjRef,
    #[serde(flatten)]
    filters: SectionsFilterSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionsKpi {
    #[serde(flatten)]
    meta: SectionsWidgetMeta,
    metric: ObjRef,
    #[serde(flatten)]
    filters: SectionsFilterSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionsRichText {
    #[serde(flatten)]
    meta: SectionsWidgetMeta,
    #[serde(default)]
    content: String,
    #[serde(flatten)]
    filters: SectionsFilterSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionsSwitcher {
    #[serde(flatten)]
    meta: SectionsWidgetMeta,
    #[serde(default)]
    visualizations: Vec<SectionsInsight>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionsContainer {
    #[serde(flatten)]
    meta: SectionsWidgetMeta,
    #[serde(default)]
    sections: Vec<SectionsSection>,
}

/// Codec for the sections/items schema
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionsCodec;

impl DocumentCodec for SectionsCodec {
    fn decode(&self, document: Value) -> Result<Dashboard, PersistError> {
        let SectionsDocument { data } = serde_json::from_value(document)?;
        if data.kind != DOCUMENT_TYPE {
            tracing::warn!("Unexpected document type '{}', decoding as {}", data.kind, DOCUMENT_TYPE);
        }

        let attributes = data.attributes;
        let common = decode_filters(attributes.content.filters)?;
        let mut tabs = Vec::with_capacity(attributes.content.tabs.len());
        for tab in attributes.content.tabs {
            let filters = decode_filters(tab.filters)?;
            tabs.push(
                DashboardTab::new(tab.local_identifier, tab.title, decode_sections(tab.layout.sections))
                    .with_filters(filters),
            );
        }

        build_dashboard(
            data.id.map(ObjRef::Identifier),
            attributes.title,
            attributes.description,
            common,
            tabs,
        )
    }

    fn encode(&self, dashboard: &Dashboard) -> Result<Value, PersistError> {
        let id = match &dashboard.obj_ref {
            None => None,
            Some(ObjRef::Identifier(id)) => Some(id.clone()),
            Some(other) => return Err(PersistError::UnsupportedRef(other.clone())),
        };

        let tabs = dashboard
            .tabs()
            .iter()
            .map(|tab| SectionsTab {
                local_identifier: tab.id.clone(),
                title: tab.title.clone(),
                filters: encode_filters(&tab.filters),
                layout: SectionsLayout {
                    sections: encode_sections(&tab.layout),
                },
            })
            .collect();

        let document = SectionsDocument {
            data: SectionsData {
                id,
                kind: document_type(),
                attributes: SectionsAttributes {
                    title: dashboard.title.clone(),
                    description: dashboard.description.clone(),
                    content: SectionsContent {
                        filters: encode_filters(&dashboard.common_filters),
                        tabs,
                    },
                },
            },
        };
        Ok(serde_json::to_value(document)?)
    }
}

fn decode_sections(sections: Vec<SectionsSection>) -> Layout {
    Layout::new(
        sections
            .into_iter()
            .map(|section| {
                let items = section
                    .items
                    .into_iter()
                    .map(|item| Item {
                        size: item.size,
                        widget: item.widget.map(decode_widget),
                    })
                    .collect();
                Section::new(section.header.unwrap_or_default(), items)
            })
            .collect(),
    )
}

fn encode_sections(layout: &Layout) -> Vec<SectionsSection> {
    layout
        .sections
        .iter()
        .map(|section| SectionsSection {
            header: (section.header != SectionHeader::default()).then(|| section.header.clone()),
            items: section
                .items
                .iter()
                .map(|item| SectionsItem {
                    size: item.size,
                    widget: item.widget.as_ref().map(encode_widget),
                })
                .collect(),
        })
        .collect()
}

fn decode_header(meta: SectionsWidgetMeta) -> WidgetHeader {
    WidgetHeader {
        local_id: meta.local_identifier,
        obj_ref: meta.obj_ref,
        title: meta.title,
        description: meta.description,
    }
}

fn encode_header(header: &WidgetHeader) -> SectionsWidgetMeta {
    SectionsWidgetMeta {
        local_identifier: header.local_id.clone(),
        obj_ref: header.obj_ref.clone(),
        title: header.title.clone(),
        description: header.description.clone(),
    }
}

fn decode_settings(settings: SectionsFilterSettings) -> FilterSettings {
    let ignore_dashboard_filters = settings
        .ignore_dashboard_filters
        .into_iter()
        .map(|reference| match reference {
            SectionsReference::AttributeFilterReference { display_form } => FilterReference::attribute(display_form),
            SectionsReference::DateFilterReference { data_set } => FilterReference::Date { data_set },
        })
        .collect();
    FilterSettings {
        ignore_dashboard_filters,
        date_data_set: settings.date_data_set,
    }
}

fn encode_settings(settings: &FilterSettings) -> SectionsFilterSettings {
    let ignore_dashboard_filters = settings
        .ignore_dashboard_filters
        .iter()
        .map(|reference| match reference {
            FilterReference::Attribute { display_form } => SectionsReference::AttributeFilterReference {
                display_form: display_form.clone(),
            },
            FilterReference::Date { data_set } => SectionsReference::DateFilterReference {
                data_set: data_set.clone(),
            },
        })
        .collect();
    SectionsFilterSettings {
        ignore_dashboard_filters,
        date_data_set: settings.date_data_set.clone(),
    }
}

fn decode_insight(insight: SectionsInsight) -> (WidgetHeader, InsightWidget) {
    let widget = InsightWidget {
        insight: insight.insight,
        filters: decode_settings(insight.filters),
    };
    (decode_header(insight.meta), widget)
}

fn encode_insight(header: &WidgetHeader, insight: &InsightWidget) -> SectionsInsight {
    SectionsInsight {
        meta: encode_header(header),
        insight: insight.insight.clone(),
        filters: encode_settings(&insight.filters),
    }
}

fn decode_widget(widget: SectionsWidget) -> Widget {
    match widget {
        SectionsWidget::Insight(insight) => {
            let (header, insight) = decode_insight(insight);
            Widget::new(header, WidgetKind::Insight(insight))
        }
        SectionsWidget::Kpi(kpi) => Widget::new(
            decode_header(kpi.meta),
            WidgetKind::Kpi(KpiWidget {
                measure: kpi.metric,
                filters: decode_settings(kpi.filters),
            }),
        ),
        SectionsWidget::RichText(text) => Widget::new(
            decode_header(text.meta),
            WidgetKind::RichText(RichTextWidget {
                content: text.content,
                filters: decode_settings(text.filters),
            }),
        ),
        SectionsWidget::VisualizationSwitcher(switcher) => {
            let visualizations = switcher
                .visualizations
                .into_iter()
                .map(|insight| {
                    let (header, insight) = decode_insight(insight);
                    SwitcherEntry { header, insight }
                })
                .collect();
            Widget::new(
                decode_header(switcher.meta),
                WidgetKind::VisualizationSwitcher(VisualizationSwitcherWidget { visualizations }),
            )
        }
        SectionsWidget::Container(container) => Widget::new(
            decode_header(container.meta),
            WidgetKind::Container(ContainerWidget {
                layout: decode_sections(container.sections),
            }),
        ),
    }
}

fn encode_widget(widget: &Widget) -> SectionsWidget {
    let meta = encode_header(&widget.header);
    match &widget.kind {
        WidgetKind::Insight(insight) => SectionsWidget::Insight(encode_insight(&widget.header, insight)),
        WidgetKind::Kpi(kpi) => SectionsWidget::Kpi(SectionsKpi {
            meta,
            metric: kpi.measure.clone(),
            filters: encode_settings(&kpi.filters),
        }),
        WidgetKind::RichText(text) => SectionsWidget::RichText(SectionsRichText {
            meta,
            content: text.content.clone(),
            filters: encode_settings(&text.filters),
        }),
        WidgetKind::VisualizationSwitcher(switcher) => SectionsWidget::VisualizationSwitcher(SectionsSwitcher {
            meta,
            visualizations: switcher
                .visualizations
                .iter()
                .map(|entry| encode_insight(&entry.header, &entry.insight))
                .collect(),
        }),
        WidgetKind::Container(container) => SectionsWidget::Container(SectionsContainer {
            meta,
            sections: encode_sections(&container.layout),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "data": {
                "id": "sales-dashboard",
                "type": "analyticalDashboard",
                "attributes": {
                    "title": "Sales",
                    "content": {
                        "filters": [
                            {"attributeFilter": {"localIdentifier": "f-region",
                                "displayForm": {"identifier": "label.region"},
                                "negativeSelection": false, "attributeElements": ["EU"]}}
                        ],
                        "tabs": [{
                            "localIdentifier": "main",
                            "title": "Main",
                            "layout": {"type": "IDashboardLayout", "sections": [{
                                "type": "IDashboardLayoutSection",
                                "items": [{
                                    "type": "IDashboardLayoutItem",
                                    "size": {"xl": {"gridWidth": 12}},
                                    "widget": {"type": "IDashboardLayout", "localIdentifier": "c1", "sections": [{
                                        "items": [{
                                            "size": {"xl": {"gridWidth": 6, "gridHeight": 8}},
                                            "widget": {"type": "insight", "localIdentifier": "w1",
                                                "insight": {"identifier": "insight.sales"},
                                                "ignoreDashboardFilters": [
                                                    {"type": "dateFilterReference"}
                                                ]}
                                        }]
                                    }]}
                                }]
                            }]}
                        }]
                    }
                }
            }
        })
    }

    #[test]
    fn test_decode_nested_container() {
        let dashboard = SectionsCodec.decode(document()).unwrap();
        assert_eq!(dashboard.obj_ref, Some(ObjRef::id("sales-dashboard")));
        assert_eq!(dashboard.active_tab().title, "Main");

        let layout = &dashboard.active_tab().layout;
        let container = layout.widget(&LocalId::from("c1")).unwrap();
        let nested = container.nested_layout().unwrap();
        let insight = nested.widget(&LocalId::from("w1")).unwrap();
        assert!(insight
            .filter_settings()
            .unwrap()
            .ignores(&FilterReference::Date { data_set: None }));
        assert_eq!(nested.sections[0].items[0].size.xl.grid_height, Some(8));
    }

    #[test]
    fn test_uri_dashboard_ref_not_encodable() {
        let mut dashboard = SectionsCodec.decode(document()).unwrap();
        dashboard.obj_ref = Some(ObjRef::uri("/gdc/md/p/obj/1"));
        assert!(matches!(
            SectionsCodec.encode(&dashboard),
            Err(PersistError::UnsupportedRef(_))
        ));
    }
}
