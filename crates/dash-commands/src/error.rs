//! Error types of the command layer

use thiserror::Error;

use dash_core::{
    EventType, FilterContextError, FilterReference, InvariantError, LayoutError, LocalId, ObjRef, TabError,
};
use dash_filters::{MetadataError, ResolveError};

use crate::history::HistoryError;

/// Why a command was rejected. Reported as a rejection event; state is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    FilterContext(#[from] FilterContextError),

    #[error(transparent)]
    Tab(#[from] TabError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("Widget '{0}' does not exist in the active tab")]
    UnknownWidget(LocalId),

    #[error("Widget '{0}' has no filter settings")]
    NotFilterable(LocalId),

    #[error("Widget '{0}' is not an insight widget")]
    NotAnInsightWidget(LocalId),

    #[error("Local identifier '{0}' is already in use")]
    DuplicateLocalId(LocalId),

    #[error("Display form {0} is not used by any dashboard filter")]
    UnusedDisplayForm(ObjRef),

    #[error("Date dataset {0} is not known to the catalog")]
    UnknownDateDataSet(ObjRef),

    #[error("Filter reference {0:?} does not match any dashboard filter")]
    UnknownFilterReference(FilterReference),
}

/// Failure of `dispatch` itself, as opposed to a rejected command
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A committed state would have broken a structural invariant. The dispatcher
    /// has already restored the last known-good state.
    #[error("Invariant violated while applying {command}: {source}")]
    InvariantViolation {
        command: String,
        #[source]
        source: InvariantError,
    },

    #[error("{0} was not observed")]
    EventNotObserved(EventType),

    #[error("Metadata fetch failed: {0}")]
    Metadata(#[from] MetadataError),
}
