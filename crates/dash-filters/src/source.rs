//! Asynchronous metadata collaborator

use async_trait::async_trait;
use thiserror::Error;

use dash_core::ObjRef;

use crate::catalog::{Catalog, DisplayFormMeta, QueryableMeta};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Object {0} not found")]
    NotFound(ObjRef),

    #[error("Metadata backend error: {0}")]
    Backend(String),
}

/// Source of catalog metadata that may need a network round trip
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch an insight with the date datasets it can be sliced by
    async fn insight(&self, insight: &ObjRef) -> Result<QueryableMeta, MetadataError>;

    /// Fetch a display form with its elements
    async fn display_form(&self, display_form: &ObjRef) -> Result<DisplayFormMeta, MetadataError>;
}

#[async_trait]
impl MetadataSource for Catalog {
    async fn insight(&self, insight: &ObjRef) -> Result<QueryableMeta, MetadataError> {
        Catalog::insight(self, insight)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(insight.clone()))
    }

    async fn display_form(&self, display_form: &ObjRef) -> Result<DisplayFormMeta, MetadataError> {
        Catalog::display_form(self, display_form)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(display_form.clone()))
    }
}
