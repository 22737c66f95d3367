//! Dependent attribute filters
//!
//! A child filter only offers the elements that exist together with the elements
//! its parents let through. The constraint is transitive: a parent that is itself
//! constrained passes on its reduced element set.

use ahash::AHashMap;

use dash_core::{AttributeFilter, FilterContext, FilterId};

use crate::catalog::Catalog;
use crate::resolver::{ResolveError, ResolveWarning};

/// Elements a filter lets through. `None` means no constraint at all.
pub type Allowed = Option<Vec<String>>;

/// Computes allowed element sets for the attribute filters of one context
pub struct DependencyResolver<'a> {
    context: &'a FilterContext,
    catalog: &'a Catalog,
    memo: AHashMap<FilterId, Allowed>,
    warnings: Vec<ResolveWarning>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(context: &'a FilterContext, catalog: &'a Catalog) -> Self {
        Self {
            context,
            catalog,
            memo: AHashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Walk the parents of `id` and fail if the walk comes back to a filter already on the path
    pub fn check_acyclic(&self, id: &FilterId) -> Result<(), ResolveError> {
        let mut path = Vec::new();
        self.visit(id, &mut path)
    }

    fn visit(&self, id: &FilterId, path: &mut Vec<FilterId>) -> Result<(), ResolveError> {
        if let Some(start) = path.iter().position(|p| p == id) {
            let mut chain = path[start..].to_vec();
            chain.push(id.clone());
            return Err(ResolveError::CyclicFilterDependency { chain });
        }
        let Some(filter) = self.context.attribute_filter(id) else {
            return Ok(());
        };
        path.push(id.clone());
        for parent in &filter.parents {
            self.visit(&parent.filter, path)?;
        }
        path.pop();
        Ok(())
    }

    /// The filter as it should be applied: own selection narrowed by its parents.
    /// Parent links are dropped from the result since they are already accounted for.
    pub fn effective_filter(&mut self, filter: &AttributeFilter) -> Result<AttributeFilter, ResolveError> {
        self.check_acyclic(&filter.local_id)?;
        let mut effective = filter.clone();
        effective.parents.clear();

        if filter.parents.is_empty() {
            return Ok(effective);
        }
        let narrowed = self.parent_constraint(filter)?;
        if let Some(valid) = narrowed {
            let own = self.own_allowed(filter);
            let elements = match own {
                Some(own) => own.into_iter().filter(|e| valid.contains(e)).collect(),
                None => valid,
            };
            effective.selection = dash_core::AttributeSelection::positive(elements);
        }
        Ok(effective)
    }

    /// Take the warnings gathered so far
    pub fn take_warnings(&mut self) -> Vec<ResolveWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn warn(&mut self, warning: ResolveWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    fn allowed(&mut self, id: &FilterId) -> Result<Allowed, ResolveError> {
        if let Some(known) = self.memo.get(id) {
            return Ok(known.clone());
        }
        let Some(filter) = self.context.attribute_filter(id) else {
            return Ok(None);
        };

        let own = self.own_allowed(filter);
        let from_parents = self.parent_constraint(filter)?;
        let allowed = match (own, from_parents) {
            (None, other) | (other, None) => other,
            (Some(own), Some(valid)) => Some(own.into_iter().filter(|e| valid.contains(e)).collect()),
        };
        self.memo.insert(id.clone(), allowed.clone());
        Ok(allowed)
    }

    /// Elements the filter's own selection lets through
    fn own_allowed(&self, filter: &AttributeFilter) -> Allowed {
        let selection = &filter.selection;
        if selection.is_all() {
            return None;
        }
        if !selection.negative {
            return Some(selection.elements.clone());
        }
        self.catalog.display_form(&filter.display_form).map(|meta| {
            meta.elements
                .iter()
                .filter(|e| selection.contains(e))
                .cloned()
                .collect()
        })
    }

    /// Child elements compatible with every constrained parent; `None` when no parent constrains
    fn parent_constraint(&mut self, filter: &AttributeFilter) -> Result<Allowed, ResolveError> {
        let mut result: Allowed = None;
        for parent in &filter.parents {
            let Some(parent_filter) = self.context.attribute_filter(&parent.filter) else {
                tracing::warn!("Parent '{}' of '{}' is not in the filter context", parent.filter, filter.local_id);
                self.warn(ResolveWarning::UnknownParent {
                    child: filter.local_id.clone(),
                    parent: parent.filter.clone(),
                });
                continue;
            };
            let Some(parent_allowed) = self.allowed(&parent.filter)? else {
                continue;
            };
            let Some(pairs) = self
                .catalog
                .element_links(&filter.display_form, &parent_filter.display_form)
            else {
                tracing::warn!(
                    "No element links between {} and {}, parent '{}' does not constrain '{}'",
                    filter.display_form,
                    parent_filter.display_form,
                    parent.filter,
                    filter.local_id
                );
                self.warn(ResolveWarning::MissingElementLinks {
                    child: filter.local_id.clone(),
                    parent: parent.filter.clone(),
                });
                continue;
            };

            let mut valid: Vec<String> = Vec::new();
            for (child, parent_element) in pairs {
                if parent_allowed.contains(parent_element) && !valid.contains(child) {
                    valid.push(child.clone());
                }
            }
            result = Some(match result {
                None => valid,
                Some(previous) => previous.into_iter().filter(|e| valid.contains(e)).collect(),
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DisplayFormMeta, ElementLink};
    use dash_core::{AttributeSelection, FilterItem, FilterParent, ObjRef};

    fn catalog() -> Catalog {
        Catalog::new()
            .with_display_form(DisplayFormMeta {
                obj_ref: ObjRef::id("label.region"),
                attribute: ObjRef::id("attr.region"),
                title: "Region".into(),
                elements: vec!["EU".into(), "US".into()],
            })
            .with_display_form(DisplayFormMeta {
                obj_ref: ObjRef::id("label.country"),
                attribute: ObjRef::id("attr.country"),
                title: "Country".into(),
                elements: vec!["CZ".into(), "DE".into(), "USA".into()],
            })
            .with_display_form(DisplayFormMeta {
                obj_ref: ObjRef::id("label.city"),
                attribute: ObjRef::id("attr.city"),
                title: "City".into(),
                elements: vec!["Prague".into(), "Brno".into(), "Berlin".into(), "Boston".into()],
            })
            .with_link(ElementLink {
                child: ObjRef::id("label.country"),
                parent: ObjRef::id("label.region"),
                pairs: vec![
                    ("CZ".into(), "EU".into()),
                    ("DE".into(), "EU".into()),
                    ("USA".into(), "US".into()),
                ],
            })
            .with_link(ElementLink {
                child: ObjRef::id("label.city"),
                parent: ObjRef::id("label.country"),
                pairs: vec![
                    ("Prague".into(), "CZ".into()),
                    ("Brno".into(), "CZ".into()),
                    ("Berlin".into(), "DE".into()),
                    ("Boston".into(), "USA".into()),
                ],
            })
    }

    fn chain(region: AttributeSelection, country: AttributeSelection) -> FilterContext {
        FilterContext::new(vec![
            FilterItem::Attribute(AttributeFilter::new("region", ObjRef::id("label.region")).with_selection(region)),
            FilterItem::Attribute(
                AttributeFilter::new("country", ObjRef::id("label.country"))
                    .with_selection(country)
                    .with_parents(vec![FilterParent::new("region")]),
            ),
            FilterItem::Attribute(
                AttributeFilter::new("city", ObjRef::id("label.city")).with_parents(vec![FilterParent::new("country")]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_transitive_narrowing() {
        let context = chain(AttributeSelection::positive(["EU"]), AttributeSelection::negative(["DE"]));
        let catalog = catalog();
        let mut resolver = DependencyResolver::new(&context, &catalog);

        let country = context.attribute_filter(&FilterId::from("country")).unwrap();
        let effective = resolver.effective_filter(country).unwrap();
        assert_eq!(effective.selection, AttributeSelection::positive(["CZ"]));
        assert!(effective.parents.is_empty());

        let city = context.attribute_filter(&FilterId::from("city")).unwrap();
        let effective = resolver.effective_filter(city).unwrap();
        assert_eq!(effective.selection, AttributeSelection::positive(["Prague", "Brno"]));
        assert!(resolver.take_warnings().is_empty());
    }

    #[test]
    fn test_unconstrained_parent_keeps_child() {
        let context = chain(AttributeSelection::all(), AttributeSelection::all());
        let catalog = catalog();
        let mut resolver = DependencyResolver::new(&context, &catalog);
        let city = context.attribute_filter(&FilterId::from("city")).unwrap();
        assert!(resolver.effective_filter(city).unwrap().selection.is_all());
    }

    #[test]
    fn test_missing_links_warn() {
        let context = chain(AttributeSelection::positive(["EU"]), AttributeSelection::all());
        let catalog = Catalog::new();
        let mut resolver = DependencyResolver::new(&context, &catalog);
        let country = context.attribute_filter(&FilterId::from("country")).unwrap();
        assert!(resolver.effective_filter(country).unwrap().selection.is_all());
        assert_eq!(resolver.take_warnings().len(), 1);
    }

    #[test]
    fn test_missing_parent_warns() {
        let context = chain(AttributeSelection::positive(["EU"]), AttributeSelection::all());
        // a parent link that does not resolve in this context
        let orphan = AttributeFilter::new("orphan", ObjRef::id("label.city")).with_parents(vec![FilterParent::new("gone")]);
        let catalog = catalog();
        let mut resolver = DependencyResolver::new(&context, &catalog);

        assert!(resolver.effective_filter(&orphan).unwrap().selection.is_all());
        assert_eq!(
            resolver.take_warnings(),
            vec![ResolveWarning::UnknownParent {
                child: FilterId::from("orphan"),
                parent: FilterId::from("gone"),
            }]
        );
    }

    #[test]
    fn test_cycle_reports_chain() {
        let mut context = chain(AttributeSelection::all(), AttributeSelection::all());
        context
            .set_attribute_parents(&FilterId::from("region"), vec![FilterParent::new("city")])
            .unwrap();
        let catalog = catalog();
        let resolver = DependencyResolver::new(&context, &catalog);

        match resolver.check_acyclic(&FilterId::from("country")) {
            Err(ResolveError::CyclicFilterDependency { chain }) => {
                let names: Vec<_> = chain.iter().map(|f| f.as_str()).collect();
                assert_eq!(names, vec!["country", "region", "city", "country"]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }
}
