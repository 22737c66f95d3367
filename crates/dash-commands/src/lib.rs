//! Command/event state machine of the dashboard
//!
//! Callers express intents as [`Command`]s; the [`Dispatcher`] validates and
//! applies them one at a time and reports what happened as events on its bus.
//! Rejected commands leave the dashboard untouched.

pub mod command;
pub mod config;
pub mod deferred;
pub mod dispatcher;
pub mod error;
pub mod execution;
mod handlers;
pub mod history;

pub use command::{Command, CommandGuard, CommandPayload, FilterSettingsOp, UndoPoint};
pub use config::{DispatcherConfig, IdConflictPolicy};
pub use deferred::{AddInsightWidget, DashboardHandle};
pub use dispatcher::{CommandSink, DispatchOutcome, Dispatcher, JournalEntry, JournalResult};
pub use error::{CommandError, DispatchError};
pub use execution::{ExecutionBackend, ExecutionError, ExecutionResult, QuerySource, WidgetQuery};
pub use history::{HistoryError, LayoutSnapshot, UndoHistory};
