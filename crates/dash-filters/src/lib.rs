//! Filter resolution for dashboard widgets
//!
//! Given the flattened filter context of the active tab, works out which filters
//! a widget's query runs with: ignore lists, date dataset binding and dependent
//! attribute filters.

pub mod cache;
pub mod catalog;
pub mod dependency;
pub mod resolver;
pub mod source;

// Re-exports
pub use cache::ResolutionCache;
pub use catalog::{Catalog, CatalogData, DateDataSetMeta, DisplayFormMeta, ElementLink, QueryableMeta};
pub use dependency::DependencyResolver;
pub use resolver::{resolve_for_widget, retarget_date_filter, Resolution, ResolveError, ResolveWarning};
pub use source::{MetadataError, MetadataSource};
