//! Catalog metadata the resolver needs: display forms with their elements,
//! date datasets, and which date datasets insights and measures can be sliced by

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use dash_core::{DateGranularity, ObjRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayFormMeta {
    #[serde(rename = "ref")]
    pub obj_ref: ObjRef,
    pub attribute: ObjRef,
    #[serde(default)]
    pub title: String,
    /// Element values in catalog order
    #[serde(default)]
    pub elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateDataSetMeta {
    #[serde(rename = "ref")]
    pub obj_ref: ObjRef,
    #[serde(default)]
    pub title: String,
    pub granularities: Vec<DateGranularity>,
}

impl DateDataSetMeta {
    pub fn supports(&self, granularity: DateGranularity) -> bool {
        self.granularities.contains(&granularity)
    }
}

/// Insight or measure, as far as date filtering is concerned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryableMeta {
    #[serde(rename = "ref")]
    pub obj_ref: ObjRef,
    #[serde(default)]
    pub title: String,
    /// Date datasets compatible with the object's measures
    #[serde(default)]
    pub date_data_sets: Vec<ObjRef>,
}

/// Which child elements exist together with which parent elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementLink {
    pub child: ObjRef,
    pub parent: ObjRef,
    /// `(child element, parent element)` pairs
    pub pairs: Vec<(String, String)>,
}

/// Serializable catalog contents
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogData {
    pub display_forms: Vec<DisplayFormMeta>,
    pub date_data_sets: Vec<DateDataSetMeta>,
    pub insights: Vec<QueryableMeta>,
    pub measures: Vec<QueryableMeta>,
    pub element_links: Vec<ElementLink>,
}

/// Indexed catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    display_forms: AHashMap<ObjRef, DisplayFormMeta>,
    date_data_sets: AHashMap<ObjRef, DateDataSetMeta>,
    insights: AHashMap<ObjRef, QueryableMeta>,
    measures: AHashMap<ObjRef, QueryableMeta>,
    links: AHashMap<(ObjRef, ObjRef), Vec<(String, String)>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_display_form(mut self, meta: DisplayFormMeta) -> Self {
        self.add_display_form(meta);
        self
    }

    pub fn with_date_data_set(mut self, meta: DateDataSetMeta) -> Self {
        self.date_data_sets.insert(meta.obj_ref.clone(), meta);
        self
    }

    pub fn with_insight(mut self, meta: QueryableMeta) -> Self {
        self.add_insight(meta);
        self
    }

    pub fn with_measure(mut self, meta: QueryableMeta) -> Self {
        self.measures.insert(meta.obj_ref.clone(), meta);
        self
    }

    pub fn with_link(mut self, link: ElementLink) -> Self {
        self.links.entry((link.child, link.parent)).or_default().extend(link.pairs);
        self
    }

    pub fn add_display_form(&mut self, meta: DisplayFormMeta) {
        self.display_forms.insert(meta.obj_ref.clone(), meta);
    }

    pub fn add_insight(&mut self, meta: QueryableMeta) {
        self.insights.insert(meta.obj_ref.clone(), meta);
    }

    pub fn display_form(&self, obj_ref: &ObjRef) -> Option<&DisplayFormMeta> {
        self.display_forms.get(obj_ref)
    }

    pub fn date_data_set(&self, obj_ref: &ObjRef) -> Option<&DateDataSetMeta> {
        self.date_data_sets.get(obj_ref)
    }

    pub fn insight(&self, obj_ref: &ObjRef) -> Option<&QueryableMeta> {
        self.insights.get(obj_ref)
    }

    pub fn measure(&self, obj_ref: &ObjRef) -> Option<&QueryableMeta> {
        self.measures.get(obj_ref)
    }

    /// Element pairs linking `child` to `parent`, if the catalog knows them
    pub fn element_links(&self, child: &ObjRef, parent: &ObjRef) -> Option<&[(String, String)]> {
        self.links
            .get(&(child.clone(), parent.clone()))
            .map(Vec::as_slice)
    }
}

impl From<CatalogData> for Catalog {
    fn from(data: CatalogData) -> Self {
        let mut catalog = Catalog::new();
        for meta in data.display_forms {
            catalog.add_display_form(meta);
        }
        for meta in data.date_data_sets {
            catalog = catalog.with_date_data_set(meta);
        }
        for meta in data.insights {
            catalog.add_insight(meta);
        }
        for meta in data.measures {
            catalog = catalog.with_measure(meta);
        }
        for link in data.element_links {
            catalog = catalog.with_link(link);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_from_json() {
        let json = r#"{
            "displayForms": [
                {"ref": {"identifier": "label.region"}, "attribute": {"identifier": "attr.region"},
                 "elements": ["EU", "US"]}
            ],
            "dateDataSets": [
                {"ref": {"identifier": "dt.created"}, "granularities": ["GDC.time.year", "GDC.time.month"]}
            ],
            "insights": [
                {"ref": {"identifier": "insight.sales"}, "dateDataSets": [{"identifier": "dt.created"}]}
            ],
            "elementLinks": [
                {"child": {"identifier": "label.city"}, "parent": {"identifier": "label.region"},
                 "pairs": [["Prague", "EU"]]}
            ]
        }"#;
        let data: CatalogData = serde_json::from_str(json).unwrap();
        let catalog = Catalog::from(data);

        let region = catalog.display_form(&ObjRef::id("label.region")).unwrap();
        assert_eq!(region.elements, vec!["EU", "US"]);
        assert!(catalog
            .date_data_set(&ObjRef::id("dt.created"))
            .unwrap()
            .supports(DateGranularity::Month));
        assert_eq!(
            catalog.insight(&ObjRef::id("insight.sales")).unwrap().date_data_sets,
            vec![ObjRef::id("dt.created")]
        );
        assert_eq!(
            catalog
                .element_links(&ObjRef::id("label.city"), &ObjRef::id("label.region"))
                .unwrap()
                .len(),
            1
        );
        assert!(catalog.measure(&ObjRef::id("m")).is_none());
    }
}
