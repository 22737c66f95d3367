//! Persisted dashboard documents
//!
//! Two JSON schemas are in use for the same dashboard model. Both decode into
//! [`Dashboard`] and encode back without loss; the schema of an incoming
//! document is detected from its root object. The stash and the active tab are
//! session state and are not persisted.

mod filters;
pub mod fluid;
pub mod sections;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use dash_core::{
    Dashboard, DashboardState, DashboardTab, FilterContext, FilterContextError, InvariantError, ObjRef, TabError,
};

pub use fluid::FluidCodec;
pub use sections::SectionsCodec;

/// Errors that can occur while loading or saving a document
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized dashboard document: expected a 'dashboard' or 'data' root object")]
    UnknownFormat,

    #[error("Invalid filter context: {0}")]
    Filters(#[from] FilterContextError),

    #[error("Invalid tabs: {0}")]
    Tabs(#[from] TabError),

    #[error("Invalid layout: {0}")]
    Layout(#[from] InvariantError),

    #[error("Reference {0} cannot be stored in this document format")]
    UnsupportedRef(ObjRef),
}

/// Schema of a persisted document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentFormat {
    /// Rows and columns under a `dashboard` root
    Fluid,
    /// Sections and items under a `data` root
    Sections,
}

impl DocumentFormat {
    pub fn codec(self) -> &'static dyn DocumentCodec {
        match self {
            DocumentFormat::Fluid => &FluidCodec,
            DocumentFormat::Sections => &SectionsCodec,
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Fluid => write!(f, "fluid"),
            DocumentFormat::Sections => write!(f, "sections"),
        }
    }
}

/// Converts between one document schema and the in-memory model
pub trait DocumentCodec: Send + Sync {
    fn decode(&self, document: Value) -> Result<Dashboard, PersistError>;

    fn encode(&self, dashboard: &Dashboard) -> Result<Value, PersistError>;
}

/// Detect the schema of a document from its root object
pub fn detect_format(document: &Value) -> Result<DocumentFormat, PersistError> {
    let root = document.as_object().ok_or(PersistError::UnknownFormat)?;
    if root.get("dashboard").map_or(false, Value::is_object) {
        Ok(DocumentFormat::Fluid)
    } else if root.get("data").map_or(false, Value::is_object) {
        Ok(DocumentFormat::Sections)
    } else {
        Err(PersistError::UnknownFormat)
    }
}

/// Decode a document of either schema
pub fn decode(document: Value) -> Result<(Dashboard, DocumentFormat), PersistError> {
    let format = detect_format(&document)?;
    let dashboard = format.codec().decode(document)?;
    tracing::debug!(
        "Decoded {} document '{}' with {} tab(s)",
        format,
        dashboard.title,
        dashboard.tabs().len()
    );
    Ok((dashboard, format))
}

pub fn encode(dashboard: &Dashboard, format: DocumentFormat) -> Result<Value, PersistError> {
    format.codec().encode(dashboard)
}

pub fn from_str(json: &str) -> Result<(Dashboard, DocumentFormat), PersistError> {
    decode(serde_json::from_str(json)?)
}

pub fn to_string_pretty(dashboard: &Dashboard, format: DocumentFormat) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(&encode(dashboard, format)?)?)
}

/// Read and decode a document file
pub fn load(path: impl AsRef<Path>) -> Result<(Dashboard, DocumentFormat), PersistError> {
    let path = path.as_ref();
    tracing::info!("Loading dashboard document from {}", path.display());
    from_str(&std::fs::read_to_string(path)?)
}

/// Encode and write a document file
pub fn save(path: impl AsRef<Path>, dashboard: &Dashboard, format: DocumentFormat) -> Result<(), PersistError> {
    let path = path.as_ref();
    std::fs::write(path, to_string_pretty(dashboard, format)?)?;
    tracing::info!("Saved {} document to {}", format, path.display());
    Ok(())
}

/// Assemble a decoded dashboard and check it can be edited safely
pub(crate) fn build_dashboard(
    obj_ref: Option<ObjRef>,
    title: String,
    description: String,
    common_filters: FilterContext,
    tabs: Vec<DashboardTab>,
) -> Result<Dashboard, PersistError> {
    let mut dashboard = Dashboard::new(title, common_filters, tabs)?;
    dashboard.obj_ref = obj_ref;
    dashboard.description = description;

    let state = DashboardState::new(dashboard);
    state.check_invariants()?;
    Ok(state.dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::{
        AttributeFilter, AttributeSelection, DateFilter, DateGranularity, DateRange, FilterItem, FilterParent,
        FilterReference, FilterSettings, GridSize, Item, ItemSize, Layout, Section, SectionHeader, SwitcherEntry,
        Widget, WidgetHeader,
    };
    use dash_core::widget::InsightWidget;
    use serde_json::json;

    fn dashboard() -> Dashboard {
        let common = FilterContext::new(vec![
            FilterItem::Date(DateFilter::common(
                DateGranularity::Quarter,
                DateRange::Relative { from: -3, to: 0 },
            )),
            FilterItem::Attribute(
                AttributeFilter::new("f-region", ObjRef::id("label.region"))
                    .with_selection(AttributeSelection::positive(["EU"])),
            ),
            FilterItem::Attribute(
                AttributeFilter::new("f-country", ObjRef::id("label.country"))
                    .with_selection(AttributeSelection::negative(["DE"]))
                    .with_parents(vec![FilterParent {
                        filter: "f-region".into(),
                        over: vec![ObjRef::id("attr.country")],
                    }]),
            ),
        ])
        .unwrap();

        let switcher = Widget::switcher(
            "sw",
            vec![SwitcherEntry {
                header: WidgetHeader::new("sw-a"),
                insight: InsightWidget {
                    insight: ObjRef::id("insight.a"),
                    filters: FilterSettings::with_date_data_set(ObjRef::id("dt.created")),
                },
            }],
        );
        let nested = Layout::new(vec![Section::new(
            SectionHeader::default(),
            vec![Item::new(ItemSize::xl(12, None), Widget::rich_text("note", "Hello"))],
        )]);

        let mut wide = ItemSize::xl(6, Some(12));
        wide.md = Some(GridSize::new(12, None));
        let main = Layout::new(vec![
            Section::new(
                SectionHeader::titled("Overview"),
                vec![
                    Item::new(
                        wide,
                        Widget::insight("w1", ObjRef::id("insight.sales")).with_title("Sales").with_filters(
                            FilterSettings {
                                ignore_dashboard_filters: vec![FilterReference::attribute(ObjRef::id("label.region"))],
                                date_data_set: Some(ObjRef::id("dt.created")),
                            },
                        ),
                    ),
                    Item::placeholder(ItemSize::xl(6, None)),
                    Item::new(ItemSize::xl(4, None), switcher),
                ],
            ),
            Section::new(
                SectionHeader {
                    title: None,
                    description: Some("Totals".into()),
                },
                vec![
                    Item::new(ItemSize::xl(3, None), Widget::kpi("k1", ObjRef::id("measure.revenue"))),
                    Item::new(ItemSize::xl(9, None), Widget::container("c1", nested)),
                ],
            ),
        ]);

        let local = FilterContext::new(vec![FilterItem::Date(DateFilter {
            local_id: Some("d-created".into()),
            data_set: Some(ObjRef::id("dt.created")),
            granularity: DateGranularity::Month,
            range: DateRange::AllTime,
        })])
        .unwrap();
        let tabs = vec![
            DashboardTab::new("main", "Main", main).with_filters(local),
            DashboardTab::new("empty", "Empty", Layout::default()),
        ];

        let mut dashboard = Dashboard::new("Sales", common, tabs).unwrap();
        dashboard.obj_ref = Some(ObjRef::id("dash.sales"));
        dashboard.description = "Quarterly".into();
        dashboard
    }

    #[test]
    fn test_round_trip_both_formats() {
        let original = dashboard();
        for format in [DocumentFormat::Fluid, DocumentFormat::Sections] {
            let json = to_string_pretty(&original, format).unwrap();
            let (decoded, detected) = from_str(&json).unwrap();
            assert_eq!(detected, format);
            assert_eq!(decoded, original, "{} round trip", format);
        }
    }

    #[test]
    fn test_cross_format_conversion() {
        let original = dashboard();
        let fluid = encode(&original, DocumentFormat::Fluid).unwrap();
        let (decoded, _) = decode(fluid).unwrap();
        let sections = encode(&decoded, DocumentFormat::Sections).unwrap();
        assert_eq!(decode(sections).unwrap().0, original);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(&json!({"dashboard": {}})).unwrap(), DocumentFormat::Fluid);
        assert_eq!(detect_format(&json!({"data": {}})).unwrap(), DocumentFormat::Sections);
        assert!(matches!(detect_format(&json!([])), Err(PersistError::UnknownFormat)));
        assert!(matches!(
            detect_format(&json!({"data": "x"})),
            Err(PersistError::UnknownFormat)
        ));
    }

    #[test]
    fn test_duplicate_widget_ids_rejected() {
        let document = json!({
            "data": {"attributes": {"content": {"tabs": [{
                "localIdentifier": "main",
                "layout": {"sections": [{"items": [
                    {"size": {"xl": {"gridWidth": 6}}, "widget": {"type": "richText", "localIdentifier": "w"}},
                    {"size": {"xl": {"gridWidth": 6}}, "widget": {"type": "richText", "localIdentifier": "w"}}
                ]}]}
            }]}}}
        });
        assert!(matches!(decode(document), Err(PersistError::Layout(_))));
    }

    #[test]
    fn test_document_without_tabs_rejected() {
        let document = json!({"dashboard": {"meta": {"title": "x"}, "content": {"tabs": []}}});
        assert!(matches!(decode(document), Err(PersistError::Tabs(TabError::NoTabs))));
    }
}
