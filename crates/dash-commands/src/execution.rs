//! Bridge to the query execution backend

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use dash_core::{DateSource, FilterItem, FilterTarget, LocalId, ObjRef};
use dash_filters::ResolveError;

/// What a widget asks the backend to compute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ref", rename_all = "camelCase")]
pub enum QuerySource {
    Insight(ObjRef),
    Measure(ObjRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetQuery {
    pub widget: LocalId,
    pub source: QuerySource,
}

impl WidgetQuery {
    /// Query for a filter target; targets without analytical content have none
    pub fn for_target(target: &FilterTarget<'_>) -> Option<Self> {
        let source = match target.source {
            DateSource::Insight(insight) => QuerySource::Insight(insight.clone()),
            DateSource::Measure(measure) => QuerySource::Measure(measure.clone()),
            DateSource::Unbound => return None,
        };
        Some(Self {
            widget: target.local_id.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub data: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Widget '{0}' does not exist in the active tab")]
    UnknownWidget(LocalId),

    #[error("Widget '{0}' does not run a query")]
    NotExecutable(LocalId),

    #[error(transparent)]
    Filters(#[from] ResolveError),

    #[error("Execution backend error: {0}")]
    Backend(String),
}

/// Backend adapter that runs widget queries
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, query: &WidgetQuery, filters: &[FilterItem]) -> Result<ExecutionResult, ExecutionError>;
}
