//! Effective filters of a single widget
//!
//! Resolution is a pure function of the widget's filter settings, the flattened
//! filter context of the active tab and the catalog. It never fails because of
//! missing metadata: filters that cannot be applied are dropped and reported as
//! warnings. Only a dependency cycle among the filters the widget uses aborts it.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use dash_core::{
    DateFilter, DateGranularity, DateRange, DateSource, FilterContext, FilterId, FilterItem, FilterReference,
    FilterTarget, ObjRef,
};

use crate::catalog::{Catalog, DateDataSetMeta};
use crate::dependency::DependencyResolver;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Cyclic filter dependency: {}", join_chain(.chain))]
    CyclicFilterDependency { chain: Vec<FilterId> },
}

fn join_chain(chain: &[FilterId]) -> String {
    chain.iter().map(FilterId::as_str).collect::<Vec<_>>().join(" -> ")
}

/// A filter that was left out, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResolveWarning {
    UnknownDisplayForm { filter: FilterId, display_form: ObjRef },
    MissingElementLinks { child: FilterId, parent: FilterId },
    UnknownParent { child: FilterId, parent: FilterId },
    UnknownDateDataSet { data_set: ObjRef },
    UnsupportedGranularity { data_set: ObjRef, granularity: DateGranularity },
}

impl fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveWarning::UnknownDisplayForm { filter, display_form } => {
                write!(f, "filter '{}' uses unknown display form {}", filter, display_form)
            }
            ResolveWarning::MissingElementLinks { child, parent } => {
                write!(f, "no element links from '{}' to parent '{}'", child, parent)
            }
            ResolveWarning::UnknownParent { child, parent } => {
                write!(f, "parent '{}' of '{}' is not in the filter context", parent, child)
            }
            ResolveWarning::UnknownDateDataSet { data_set } => write!(f, "unknown date dataset {}", data_set),
            ResolveWarning::UnsupportedGranularity { data_set, granularity } => {
                write!(f, "date dataset {} cannot express {:?}", data_set, granularity)
            }
        }
    }
}

/// Filters to apply to a widget's query, in application order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub filters: Vec<FilterItem>,
    pub warnings: Vec<ResolveWarning>,
}

/// Resolve the effective filters of one widget or switcher entry.
///
/// The result lists the retargeted common date filter first, then dataset
/// specific date filters, then attribute filters, each group in context order.
/// Filters that do not constrain anything (all-time dates, all-element
/// attribute selections) are left out.
pub fn resolve_for_widget(
    target: &FilterTarget<'_>,
    context: &FilterContext,
    catalog: &Catalog,
) -> Result<Resolution, ResolveError> {
    let settings = target.settings;
    let compatible = compatible_date_data_sets(target.source, catalog);

    let mut common: Option<DateFilter> = None;
    let mut dates = Vec::new();
    let mut attributes = Vec::new();
    let mut warnings = Vec::new();
    let mut dependencies = DependencyResolver::new(context, catalog);

    for item in context.items() {
        if settings.ignores(&item.override_key()) {
            continue;
        }
        match item {
            FilterItem::Date(date) if date.range == DateRange::AllTime => {}

            FilterItem::Date(date) if date.is_common() => {
                let Some(data_set) = &settings.date_data_set else {
                    continue;
                };
                if !compatible.contains(data_set) {
                    continue;
                }
                // an applicable filter for the same dataset replaces the common one
                let specific = FilterReference::date(data_set.clone());
                if context.date_filter(Some(data_set)).is_some() && !settings.ignores(&specific) {
                    continue;
                }
                match catalog.date_data_set(data_set) {
                    None => {
                        tracing::warn!("Widget '{}' binds unknown date dataset {}", target.local_id, data_set);
                        warnings.push(ResolveWarning::UnknownDateDataSet {
                            data_set: data_set.clone(),
                        });
                    }
                    Some(meta) => match retarget_date_filter(date, meta) {
                        Some(retargeted) => common = Some(retargeted),
                        None => {
                            tracing::warn!(
                                "Date dataset {} cannot express {:?}, dropping date filter for '{}'",
                                data_set,
                                date.granularity,
                                target.local_id
                            );
                            warnings.push(ResolveWarning::UnsupportedGranularity {
                                data_set: data_set.clone(),
                                granularity: date.granularity,
                            });
                        }
                    },
                }
            }

            FilterItem::Date(date) => {
                if date.data_set.as_ref().is_some_and(|ds| compatible.contains(ds)) {
                    dates.push(FilterItem::Date(date.clone()));
                }
            }

            FilterItem::Attribute(filter) if filter.selection.is_all() && filter.parents.is_empty() => {}

            FilterItem::Attribute(filter) => {
                if catalog.display_form(&filter.display_form).is_none() {
                    tracing::warn!(
                        "Dropping filter '{}' for widget '{}': unknown display form {}",
                        filter.local_id,
                        target.local_id,
                        filter.display_form
                    );
                    warnings.push(ResolveWarning::UnknownDisplayForm {
                        filter: filter.local_id.clone(),
                        display_form: filter.display_form.clone(),
                    });
                    continue;
                }
                let effective = dependencies.effective_filter(filter)?;
                if !effective.selection.is_all() {
                    attributes.push(FilterItem::Attribute(effective));
                }
            }
        }
    }
    warnings.extend(dependencies.take_warnings());

    let filters = common
        .map(FilterItem::Date)
        .into_iter()
        .chain(dates)
        .chain(attributes)
        .collect();
    Ok(Resolution { filters, warnings })
}

fn compatible_date_data_sets<'a>(source: DateSource<'a>, catalog: &'a Catalog) -> &'a [ObjRef] {
    let meta = match source {
        DateSource::Insight(insight) => catalog.insight(insight),
        DateSource::Measure(measure) => catalog.measure(measure),
        DateSource::Unbound => None,
    };
    meta.map(|m| m.date_data_sets.as_slice()).unwrap_or(&[])
}

/// Bind a common date filter to `data_set`. When the dataset lacks the filter's
/// granularity, relative bounds are rewritten to the first finer granularity it
/// supports that divides the original one exactly.
pub fn retarget_date_filter(filter: &DateFilter, data_set: &DateDataSetMeta) -> Option<DateFilter> {
    let (granularity, ratio) = if data_set.supports(filter.granularity) {
        (filter.granularity, 1)
    } else {
        filter
            .granularity
            .exact_subdivisions()
            .iter()
            .copied()
            .find(|(finer, _)| data_set.supports(*finer))?
    };

    let range = match filter.range {
        DateRange::Relative { from, to } => DateRange::Relative {
            from: from * ratio,
            to: to * ratio + ratio - 1,
        },
        ref other => other.clone(),
    };
    Some(DateFilter {
        local_id: filter.local_id.clone(),
        data_set: Some(data_set.obj_ref.clone()),
        granularity,
        range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DisplayFormMeta, QueryableMeta};
    use dash_core::{AttributeFilter, AttributeSelection, FilterParent, FilterSettings, LocalId};

    fn catalog() -> Catalog {
        Catalog::new()
            .with_display_form(DisplayFormMeta {
                obj_ref: ObjRef::id("label.region"),
                attribute: ObjRef::id("attr.region"),
                title: String::new(),
                elements: vec!["EU".into(), "US".into()],
            })
            .with_display_form(DisplayFormMeta {
                obj_ref: ObjRef::id("label.product"),
                attribute: ObjRef::id("attr.product"),
                title: String::new(),
                elements: vec!["A".into(), "B".into()],
            })
            .with_date_data_set(DateDataSetMeta {
                obj_ref: ObjRef::id("dt.created"),
                title: String::new(),
                granularities: vec![DateGranularity::Year, DateGranularity::Month],
            })
            .with_date_data_set(DateDataSetMeta {
                obj_ref: ObjRef::id("dt.monthly"),
                title: String::new(),
                granularities: vec![DateGranularity::Month],
            })
            .with_insight(QueryableMeta {
                obj_ref: ObjRef::id("insight.sales"),
                title: String::new(),
                date_data_sets: vec![ObjRef::id("dt.created"), ObjRef::id("dt.monthly")],
            })
            .with_insight(QueryableMeta {
                obj_ref: ObjRef::id("insight.nodates"),
                title: String::new(),
                date_data_sets: vec![],
            })
    }

    fn context() -> FilterContext {
        FilterContext::new(vec![
            FilterItem::Date(DateFilter::common(
                DateGranularity::Year,
                DateRange::Relative { from: -2, to: -1 },
            )),
            FilterItem::Attribute(
                AttributeFilter::new("region", ObjRef::id("label.region"))
                    .with_selection(AttributeSelection::positive(["EU"])),
            ),
            FilterItem::Attribute(
                AttributeFilter::new("product", ObjRef::id("label.product"))
                    .with_selection(AttributeSelection::negative(["B"])),
            ),
            FilterItem::Attribute(AttributeFilter::new("unused", ObjRef::id("label.region2"))),
        ])
        .unwrap()
    }

    fn target<'a>(id: &'a LocalId, settings: &'a FilterSettings, insight: &'a ObjRef) -> FilterTarget<'a> {
        FilterTarget {
            local_id: id,
            settings,
            source: DateSource::Insight(insight),
        }
    }

    fn ids(filters: &[FilterItem]) -> Vec<String> {
        filters
            .iter()
            .map(|f| match f {
                FilterItem::Attribute(a) => a.local_id.to_string(),
                FilterItem::Date(d) => format!("date:{}", d.data_set.as_ref().map(ObjRef::as_str).unwrap_or("-")),
            })
            .collect()
    }

    #[test]
    fn test_order_and_date_binding() {
        let id = LocalId::from("w");
        let insight = ObjRef::id("insight.sales");
        let settings = FilterSettings::with_date_data_set(ObjRef::id("dt.created"));
        let resolution = resolve_for_widget(&target(&id, &settings, &insight), &context(), &catalog()).unwrap();

        assert_eq!(ids(&resolution.filters), vec!["date:dt.created", "region", "product"]);
        let date = resolution.filters[0].as_date().unwrap();
        assert_eq!(date.granularity, DateGranularity::Year);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_unknown_display_form_is_a_warning() {
        let mut context = context();
        context
            .set_attribute_selection(&FilterId::from("unused"), AttributeSelection::positive(["x"]))
            .unwrap();
        let id = LocalId::from("w");
        let insight = ObjRef::id("insight.sales");
        let settings = FilterSettings::default();
        let resolution = resolve_for_widget(&target(&id, &settings, &insight), &context, &catalog()).unwrap();

        assert_eq!(ids(&resolution.filters), vec!["region", "product"]);
        assert!(matches!(
            resolution.warnings[0],
            ResolveWarning::UnknownDisplayForm { .. }
        ));
    }

    #[test]
    fn test_ignore_list_and_missing_date_data_set() {
        let id = LocalId::from("w");
        let insight = ObjRef::id("insight.sales");
        let mut settings = FilterSettings::default();
        settings
            .ignore_dashboard_filters
            .push(FilterReference::attribute(ObjRef::id("label.region")));
        let resolution = resolve_for_widget(&target(&id, &settings, &insight), &context(), &catalog()).unwrap();
        // no date dataset on the widget, so no date filter either
        assert_eq!(ids(&resolution.filters), vec!["product"]);
    }

    #[test]
    fn test_insight_without_date_data_sets_gets_no_date_filter() {
        let id = LocalId::from("w");
        let insight = ObjRef::id("insight.nodates");
        let settings = FilterSettings::with_date_data_set(ObjRef::id("dt.created"));
        let resolution = resolve_for_widget(&target(&id, &settings, &insight), &context(), &catalog()).unwrap();
        assert_eq!(ids(&resolution.filters), vec!["region", "product"]);
    }

    #[test]
    fn test_retarget_to_finer_granularity() {
        let id = LocalId::from("w");
        let insight = ObjRef::id("insight.sales");
        let settings = FilterSettings::with_date_data_set(ObjRef::id("dt.monthly"));
        let resolution = resolve_for_widget(&target(&id, &settings, &insight), &context(), &catalog()).unwrap();

        let date = resolution.filters[0].as_date().unwrap();
        assert_eq!(date.granularity, DateGranularity::Month);
        assert_eq!(date.range, DateRange::Relative { from: -24, to: -1 });
    }

    #[test]
    fn test_retarget_without_finer_granularity() {
        let filter = DateFilter::common(DateGranularity::Month, DateRange::Relative { from: -1, to: 0 });
        let meta = DateDataSetMeta {
            obj_ref: ObjRef::id("dt.yearly"),
            title: String::new(),
            granularities: vec![DateGranularity::Year],
        };
        assert!(retarget_date_filter(&filter, &meta).is_none());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let id = LocalId::from("w");
        let insight = ObjRef::id("insight.sales");
        let settings = FilterSettings::with_date_data_set(ObjRef::id("dt.monthly"));
        let catalog = catalog();

        let first = resolve_for_widget(&target(&id, &settings, &insight), &context(), &catalog).unwrap();
        let derived = FilterContext::new(first.filters.clone()).unwrap();
        let second = resolve_for_widget(&target(&id, &settings, &insight), &derived, &catalog).unwrap();
        let third = resolve_for_widget(&target(&id, &settings, &insight), &derived, &catalog).unwrap();
        assert_eq!(second.filters, first.filters);
        assert_eq!(second, third);
    }

    #[test]
    fn test_cycle_fails_only_widgets_using_it() {
        let mut context = FilterContext::new(vec![
            FilterItem::Attribute(AttributeFilter::new("a", ObjRef::id("label.region"))),
            FilterItem::Attribute(AttributeFilter::new("b", ObjRef::id("label.product"))),
        ])
        .unwrap();
        context
            .set_attribute_parents(&FilterId::from("a"), vec![FilterParent::new("b")])
            .unwrap();
        context
            .set_attribute_parents(&FilterId::from("b"), vec![FilterParent::new("a")])
            .unwrap();

        let id = LocalId::from("w");
        let insight = ObjRef::id("insight.sales");
        let settings = FilterSettings::default();
        let err = resolve_for_widget(&target(&id, &settings, &insight), &context, &catalog()).unwrap_err();
        assert!(matches!(err, ResolveError::CyclicFilterDependency { .. }));

        let mut ignoring = FilterSettings::default();
        ignoring.ignore_dashboard_filters = vec![
            FilterReference::attribute(ObjRef::id("label.region")),
            FilterReference::attribute(ObjRef::id("label.product")),
        ];
        let ok = resolve_for_widget(&target(&id, &ignoring, &insight), &context, &catalog()).unwrap();
        assert!(ok.filters.is_empty());
    }
}
