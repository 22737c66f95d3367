//! Dashboard filter model: attribute filters, date filters and references to them

mod context;

pub use context::{FilterContext, FilterContextError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::refs::{FilterId, ObjRef};

/// Date granularity of a date filter or a date dataset attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateGranularity {
    #[serde(rename = "GDC.time.year")]
    Year,
    #[serde(rename = "GDC.time.quarter")]
    Quarter,
    #[serde(rename = "GDC.time.month")]
    Month,
    #[serde(rename = "GDC.time.week_us")]
    Week,
    #[serde(rename = "GDC.time.date")]
    Day,
    #[serde(rename = "GDC.time.hour")]
    Hour,
    #[serde(rename = "GDC.time.minute")]
    Minute,
}

impl DateGranularity {
    /// Finer granularities of the same family that divide this one exactly,
    /// with the number of finer periods per one period of `self`.
    pub fn exact_subdivisions(self) -> &'static [(DateGranularity, i32)] {
        match self {
            DateGranularity::Year => &[(DateGranularity::Quarter, 4), (DateGranularity::Month, 12)],
            DateGranularity::Quarter => &[(DateGranularity::Month, 3)],
            DateGranularity::Week => &[(DateGranularity::Day, 7)],
            DateGranularity::Day => &[(DateGranularity::Hour, 24)],
            DateGranularity::Hour => &[(DateGranularity::Minute, 60)],
            DateGranularity::Month | DateGranularity::Minute => &[],
        }
    }
}

/// Range of a date filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DateRange {
    /// No constraint
    AllTime,
    /// Periods relative to "now" in units of the filter granularity; both bounds inclusive
    Relative { from: i32, to: i32 },
    Absolute { from: NaiveDate, to: NaiveDate },
}

/// A date filter. `data_set == None` marks the common (dashboard-wide) date filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    pub local_id: Option<FilterId>,
    pub data_set: Option<ObjRef>,
    pub granularity: DateGranularity,
    pub range: DateRange,
}

impl DateFilter {
    pub fn common(granularity: DateGranularity, range: DateRange) -> Self {
        Self {
            local_id: None,
            data_set: None,
            granularity,
            range,
        }
    }

    pub fn all_time() -> Self {
        Self::common(DateGranularity::Day, DateRange::AllTime)
    }

    pub fn is_common(&self) -> bool {
        self.data_set.is_none()
    }
}

/// Whether the filter lets the user pick one or many elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMode {
    Single,
    #[default]
    Multi,
}

/// Selected attribute elements. A negative selection lists the excluded elements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeSelection {
    pub negative: bool,
    pub elements: Vec<String>,
}

impl AttributeSelection {
    /// Everything selected (negative selection with nothing excluded)
    pub fn all() -> Self {
        Self {
            negative: true,
            elements: Vec::new(),
        }
    }

    pub fn positive<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            negative: false,
            elements: elements.into_iter().map(Into::into).collect(),
        }
    }

    pub fn negative<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            negative: true,
            elements: elements.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.negative && self.elements.is_empty()
    }

    pub fn contains(&self, element: &str) -> bool {
        let listed = self.elements.iter().any(|e| e == element);
        listed != self.negative
    }
}

/// Link from a dependent (child) filter to the filter constraining its elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParent {
    pub filter: FilterId,
    /// Attributes connecting the two filters
    #[serde(default)]
    pub over: Vec<ObjRef>,
}

impl FilterParent {
    pub fn new(filter: impl Into<FilterId>) -> Self {
        Self {
            filter: filter.into(),
            over: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFilter {
    pub local_id: FilterId,
    pub display_form: ObjRef,
    pub title: Option<String>,
    pub selection: AttributeSelection,
    #[serde(default)]
    pub selection_mode: SelectionMode,
    #[serde(default)]
    pub parents: Vec<FilterParent>,
}

impl AttributeFilter {
    pub fn new(local_id: impl Into<FilterId>, display_form: ObjRef) -> Self {
        Self {
            local_id: local_id.into(),
            display_form,
            title: None,
            selection: AttributeSelection::all(),
            selection_mode: SelectionMode::Multi,
            parents: Vec::new(),
        }
    }

    pub fn with_selection(mut self, selection: AttributeSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_parents(mut self, parents: Vec<FilterParent>) -> Self {
        self.parents = parents;
        self
    }

    pub fn depends_on(&self, parent: &FilterId) -> bool {
        self.parents.iter().any(|p| &p.filter == parent)
    }
}

/// One entry of a filter context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterItem {
    Attribute(AttributeFilter),
    Date(DateFilter),
}

impl FilterItem {
    pub fn as_attribute(&self) -> Option<&AttributeFilter> {
        match self {
            FilterItem::Attribute(filter) => Some(filter),
            FilterItem::Date(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateFilter> {
        match self {
            FilterItem::Date(filter) => Some(filter),
            FilterItem::Attribute(_) => None,
        }
    }

    /// Identity used when a tab-local filter overrides a common one
    pub fn override_key(&self) -> FilterReference {
        match self {
            FilterItem::Attribute(f) => FilterReference::Attribute {
                display_form: f.display_form.clone(),
            },
            FilterItem::Date(f) => FilterReference::Date {
                data_set: f.data_set.clone(),
            },
        }
    }
}

/// Reference to a dashboard filter, as stored in a widget's ignore list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterReference {
    Attribute { display_form: ObjRef },
    /// `data_set == None` refers to the common date filter
    Date { data_set: Option<ObjRef> },
}

impl FilterReference {
    pub fn attribute(display_form: ObjRef) -> Self {
        FilterReference::Attribute { display_form }
    }

    pub fn date(data_set: ObjRef) -> Self {
        FilterReference::Date {
            data_set: Some(data_set),
        }
    }

    /// Whether this reference names the given filter item
    pub fn matches(&self, item: &FilterItem) -> bool {
        match (self, item) {
            (FilterReference::Attribute { display_form }, FilterItem::Attribute(f)) => {
                &f.display_form == display_form
            }
            (FilterReference::Date { data_set }, FilterItem::Date(f)) => &f.data_set == data_set,
            _ => false,
        }
    }
}
