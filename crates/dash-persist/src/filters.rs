//! Filter context entries, shared by both document schemas

use serde::{Deserialize, Serialize};

use dash_core::{
    AttributeFilter, AttributeSelection, DateFilter, DateGranularity, DateRange, FilterContext, FilterContextError,
    FilterId, FilterItem, FilterParent, ObjRef, SelectionMode,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum FilterDto {
    AttributeFilter(AttributeFilterDto),
    DateFilter(DateFilterDto),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttributeFilterDto {
    local_identifier: FilterId,
    display_form: ObjRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    negative_selection: bool,
    #[serde(default)]
    attribute_elements: Vec<String>,
    #[serde(default)]
    selection_mode: SelectionMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    filter_elements_by: Vec<ParentDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentDto {
    filter_local_identifier: FilterId,
    #[serde(default)]
    over: OverDto,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OverDto {
    #[serde(default)]
    attributes: Vec<ObjRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DateFilterDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_identifier: Option<FilterId>,
    /// Absent for the common date filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_set: Option<ObjRef>,
    granularity: DateGranularity,
    #[serde(flatten)]
    range: DateRange,
}

impl From<&FilterItem> for FilterDto {
    fn from(item: &FilterItem) -> Self {
        match item {
            FilterItem::Attribute(filter) => FilterDto::AttributeFilter(AttributeFilterDto {
                local_identifier: filter.local_id.clone(),
                display_form: filter.display_form.clone(),
                title: filter.title.clone(),
                negative_selection: filter.selection.negative,
                attribute_elements: filter.selection.elements.clone(),
                selection_mode: filter.selection_mode,
                filter_elements_by: filter
                    .parents
                    .iter()
                    .map(|p| ParentDto {
                        filter_local_identifier: p.filter.clone(),
                        over: OverDto {
                            attributes: p.over.clone(),
                        },
                    })
                    .collect(),
            }),
            FilterItem::Date(filter) => FilterDto::DateFilter(DateFilterDto {
                local_identifier: filter.local_id.clone(),
                data_set: filter.data_set.clone(),
                granularity: filter.granularity,
                range: filter.range.clone(),
            }),
        }
    }
}

impl From<FilterDto> for FilterItem {
    fn from(dto: FilterDto) -> Self {
        match dto {
            FilterDto::AttributeFilter(a) => FilterItem::Attribute(AttributeFilter {
                local_id: a.local_identifier,
                display_form: a.display_form,
                title: a.title,
                selection: AttributeSelection {
                    negative: a.negative_selection,
                    elements: a.attribute_elements,
                },
                selection_mode: a.selection_mode,
                parents: a
                    .filter_elements_by
                    .into_iter()
                    .map(|p| FilterParent {
                        filter: p.filter_local_identifier,
                        over: p.over.attributes,
                    })
                    .collect(),
            }),
            FilterDto::DateFilter(d) => FilterItem::Date(DateFilter {
                local_id: d.local_identifier,
                data_set: d.data_set,
                granularity: d.granularity,
                range: d.range,
            }),
        }
    }
}

pub(crate) fn encode_filters(context: &FilterContext) -> Vec<FilterDto> {
    context.items().iter().map(FilterDto::from).collect()
}

/// Rebuild a filter context, rejecting duplicates and dangling parents
pub(crate) fn decode_filters(filters: Vec<FilterDto>) -> Result<FilterContext, FilterContextError> {
    FilterContext::new(filters.into_iter().map(FilterItem::from).collect())
}
