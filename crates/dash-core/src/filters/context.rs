//! Ordered filter context with the structural edits the command handlers need

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AttributeFilter, AttributeSelection, DateFilter, FilterItem, FilterParent, SelectionMode};
use crate::refs::{FilterId, ObjRef};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterContextError {
    #[error("Attribute filter '{0}' does not exist")]
    UnknownFilter(FilterId),

    #[error("Attribute filter '{0}' is defined more than once")]
    DuplicateFilterId(FilterId),

    #[error("More than one date filter for date dataset {0:?}")]
    DuplicateDateFilter(Option<ObjRef>),

    #[error("Display form {0} is already used by another attribute filter")]
    DuplicateDisplayForm(ObjRef),

    #[error("Filter index {index} out of range (attribute filters: {len})")]
    InvalidIndex { index: i64, len: usize },

    #[error("Attribute filter '{0}' cannot depend on itself")]
    SelfDependency(FilterId),

    #[error("Attribute filter '{filter}' references unknown parent '{parent}'")]
    UnknownParent { filter: FilterId, parent: FilterId },

    #[error("Single-selection filter '{0}' must select at most one element")]
    SingleSelectionViolation(FilterId),

    #[error("No date filter for date dataset {0:?}")]
    UnknownDateFilter(Option<ObjRef>),
}

/// Ordered list of filters. Date filters are kept ahead of attribute filters;
/// ordering matters for display only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterContext {
    filters: Vec<FilterItem>,
}

impl FilterContext {
    /// Create a filter context, checking its invariants
    pub fn new(filters: Vec<FilterItem>) -> Result<Self, FilterContextError> {
        let mut context = Self { filters: Vec::new() };
        for filter in filters {
            match filter {
                FilterItem::Date(date) => {
                    if context.date_filter(date.data_set.as_ref()).is_some() {
                        return Err(FilterContextError::DuplicateDateFilter(date.data_set));
                    }
                    context.upsert_date_filter(date);
                }
                FilterItem::Attribute(attribute) => {
                    context.check_new_attribute(&attribute)?;
                    context.filters.push(FilterItem::Attribute(attribute));
                }
            }
        }
        context.check_parents()?;
        Ok(context)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[FilterItem] {
        &self.filters
    }

    pub fn into_items(self) -> Vec<FilterItem> {
        self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn attribute_filters(&self) -> impl Iterator<Item = &AttributeFilter> {
        self.filters.iter().filter_map(FilterItem::as_attribute)
    }

    pub fn date_filters(&self) -> impl Iterator<Item = &DateFilter> {
        self.filters.iter().filter_map(FilterItem::as_date)
    }

    pub fn attribute_filter(&self, id: &FilterId) -> Option<&AttributeFilter> {
        self.attribute_filters().find(|f| &f.local_id == id)
    }

    fn attribute_filter_mut(&mut self, id: &FilterId) -> Result<&mut AttributeFilter, FilterContextError> {
        self.filters
            .iter_mut()
            .find_map(|item| match item {
                FilterItem::Attribute(f) if &f.local_id == id => Some(f),
                _ => None,
            })
            .ok_or_else(|| FilterContextError::UnknownFilter(id.clone()))
    }

    pub fn attribute_filter_by_display_form(&self, display_form: &ObjRef) -> Option<&AttributeFilter> {
        self.attribute_filters().find(|f| &f.display_form == display_form)
    }

    /// Date filter for a dataset; `None` selects the common date filter
    pub fn date_filter(&self, data_set: Option<&ObjRef>) -> Option<&DateFilter> {
        self.date_filters().find(|f| f.data_set.as_ref() == data_set)
    }

    pub fn common_date_filter(&self) -> Option<&DateFilter> {
        self.date_filter(None)
    }

    fn date_filter_count(&self) -> usize {
        self.date_filters().count()
    }

    fn attribute_position(&self, id: &FilterId) -> Option<usize> {
        self.filters.iter().position(|item| {
            matches!(item, FilterItem::Attribute(f) if &f.local_id == id)
        })
    }

    fn check_new_attribute(&self, filter: &AttributeFilter) -> Result<(), FilterContextError> {
        if self.attribute_filter(&filter.local_id).is_some() {
            return Err(FilterContextError::DuplicateFilterId(filter.local_id.clone()));
        }
        if self.attribute_filter_by_display_form(&filter.display_form).is_some() {
            return Err(FilterContextError::DuplicateDisplayForm(filter.display_form.clone()));
        }
        check_selection(filter)
    }

    fn check_parents(&self) -> Result<(), FilterContextError> {
        for filter in self.attribute_filters() {
            self.check_parent_list(&filter.local_id, &filter.parents)?;
        }
        Ok(())
    }

    fn check_parent_list(&self, id: &FilterId, parents: &[FilterParent]) -> Result<(), FilterContextError> {
        for parent in parents {
            if &parent.filter == id {
                return Err(FilterContextError::SelfDependency(id.clone()));
            }
            if self.attribute_filter(&parent.filter).is_none() {
                return Err(FilterContextError::UnknownParent {
                    filter: id.clone(),
                    parent: parent.filter.clone(),
                });
            }
        }
        Ok(())
    }

    /// Insert an attribute filter. `index` counts attribute filters only; `-1` appends.
    /// Returns the position among attribute filters.
    pub fn add_attribute_filter(&mut self, index: i64, filter: AttributeFilter) -> Result<usize, FilterContextError> {
        let attribute_count = self.filters.len() - self.date_filter_count();
        let position = resolve_insert_index(index, attribute_count)?;
        self.check_new_attribute(&filter)?;
        self.check_parent_list(&filter.local_id, &filter.parents)?;

        let offset = self.date_filter_count();
        self.filters.insert(offset + position, FilterItem::Attribute(filter));
        Ok(position)
    }

    /// Remove an attribute filter and every parent link pointing at it
    pub fn remove_attribute_filter(&mut self, id: &FilterId) -> Result<AttributeFilter, FilterContextError> {
        let position = self
            .attribute_position(id)
            .ok_or_else(|| FilterContextError::UnknownFilter(id.clone()))?;

        let removed = match self.filters.remove(position) {
            FilterItem::Attribute(filter) => filter,
            FilterItem::Date(_) => unreachable!("attribute_position only matches attribute filters"),
        };

        for item in &mut self.filters {
            if let FilterItem::Attribute(f) = item {
                f.parents.retain(|p| &p.filter != id);
            }
        }
        Ok(removed)
    }

    /// Move an attribute filter to `index` (among attribute filters, after removal; `-1` = last)
    pub fn move_attribute_filter(&mut self, id: &FilterId, index: i64) -> Result<usize, FilterContextError> {
        let position = self
            .attribute_position(id)
            .ok_or_else(|| FilterContextError::UnknownFilter(id.clone()))?;
        let attribute_count = self.filters.len() - self.date_filter_count();
        let target = resolve_insert_index(index, attribute_count - 1)?;

        let filter = self.filters.remove(position);
        let offset = self.date_filter_count();
        self.filters.insert(offset + target, filter);
        Ok(target)
    }

    pub fn set_attribute_selection(
        &mut self,
        id: &FilterId,
        selection: AttributeSelection,
    ) -> Result<(), FilterContextError> {
        let filter = self.attribute_filter_mut(id)?;
        let previous = std::mem::replace(&mut filter.selection, selection);
        if let Err(err) = check_selection(filter) {
            filter.selection = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Replace the parents of a filter. Cycle detection across several filters is
    /// the resolver's job; this only rejects self links and unknown parents.
    pub fn set_attribute_parents(&mut self, id: &FilterId, parents: Vec<FilterParent>) -> Result<(), FilterContextError> {
        if self.attribute_filter(id).is_none() {
            return Err(FilterContextError::UnknownFilter(id.clone()));
        }
        self.check_parent_list(id, &parents)?;
        self.attribute_filter_mut(id)?.parents = parents;
        Ok(())
    }

    /// Insert or replace the date filter for `filter.data_set`. Returns the replaced filter.
    pub fn upsert_date_filter(&mut self, filter: DateFilter) -> Option<DateFilter> {
        let existing = self.filters.iter_mut().find_map(|item| match item {
            FilterItem::Date(f) if f.data_set == filter.data_set => Some(f),
            _ => None,
        });

        match existing {
            Some(current) => Some(std::mem::replace(current, filter)),
            None => {
                // common filter always leads
                let at = if filter.is_common() { 0 } else { self.date_filter_count() };
                self.filters.insert(at, FilterItem::Date(filter));
                None
            }
        }
    }

    pub fn remove_date_filter(&mut self, data_set: Option<&ObjRef>) -> Result<DateFilter, FilterContextError> {
        let position = self
            .filters
            .iter()
            .position(|item| matches!(item, FilterItem::Date(f) if f.data_set.as_ref() == data_set))
            .ok_or_else(|| FilterContextError::UnknownDateFilter(data_set.cloned()))?;

        match self.filters.remove(position) {
            FilterItem::Date(filter) => Ok(filter),
            FilterItem::Attribute(_) => unreachable!("position only matches date filters"),
        }
    }

    /// Flatten a shared context with a tab-local one. Local filters replace shared
    /// filters with the same identity in place; the rest are appended. Parent
    /// links naming a replaced shared filter follow it to its local replacement.
    pub fn merged(common: &FilterContext, local: &FilterContext) -> FilterContext {
        let mut renamed: Vec<(FilterId, FilterId)> = Vec::new();
        let mut filters: Vec<FilterItem> = common
            .filters
            .iter()
            .map(|shared| {
                let key = shared.override_key();
                match local.filters.iter().find(|l| key.matches(l)) {
                    Some(replacement) => {
                        if let (FilterItem::Attribute(from), FilterItem::Attribute(to)) = (shared, replacement) {
                            if from.local_id != to.local_id {
                                renamed.push((from.local_id.clone(), to.local_id.clone()));
                            }
                        }
                        replacement.clone()
                    }
                    None => shared.clone(),
                }
            })
            .collect();

        for item in &local.filters {
            let key = item.override_key();
            if !common.filters.iter().any(|c| key.matches(c)) {
                filters.push(item.clone());
            }
        }

        if !renamed.is_empty() {
            for item in &mut filters {
                if let FilterItem::Attribute(filter) = item {
                    relink_parents(filter, &renamed);
                }
            }
        }

        // keep date filters ahead, stable otherwise
        filters.sort_by_key(|item| matches!(item, FilterItem::Attribute(_)));
        FilterContext { filters }
    }
}

/// Point parent links at the filters that replaced them, dropping links that
/// would end up on the filter itself or twice on the same parent
fn relink_parents(filter: &mut AttributeFilter, renamed: &[(FilterId, FilterId)]) {
    let parents = std::mem::take(&mut filter.parents);
    for mut parent in parents {
        if let Some((_, to)) = renamed.iter().find(|(from, _)| from == &parent.filter) {
            parent.filter = to.clone();
        }
        if parent.filter != filter.local_id && !filter.depends_on(&parent.filter) {
            filter.parents.push(parent);
        }
    }
}

fn check_selection(filter: &AttributeFilter) -> Result<(), FilterContextError> {
    if filter.selection_mode == SelectionMode::Single
        && !filter.selection.negative
        && filter.selection.elements.len() > 1
    {
        return Err(FilterContextError::SingleSelectionViolation(filter.local_id.clone()));
    }
    Ok(())
}

fn resolve_insert_index(index: i64, len: usize) -> Result<usize, FilterContextError> {
    if index == -1 {
        return Ok(len);
    }
    if index < 0 || index as usize > len {
        return Err(FilterContextError::InvalidIndex { index, len });
    }
    Ok(index as usize)
}
