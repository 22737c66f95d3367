//! Dispatcher configuration

use serde::{Deserialize, Serialize};

/// What to do when an inserted widget reuses a local identifier already in the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdConflictPolicy {
    /// Reject the command
    #[default]
    Reject,
    /// Give the inserted widget a fresh identifier
    Regenerate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DispatcherConfig {
    /// Maximum number of undoable commands kept in history
    pub undo_depth: usize,
    /// Maximum number of cached widget resolutions
    pub cache_capacity: usize,
    /// Maximum number of events kept in the in-memory event log
    pub event_log_capacity: usize,
    pub id_conflict: IdConflictPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            undo_depth: 50,
            cache_capacity: 512,
            event_log_capacity: 1024,
            id_conflict: IdConflictPolicy::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DispatcherConfig = serde_json::from_str(r#"{"undoDepth": 5, "idConflict": "regenerate"}"#).unwrap();
        assert_eq!(config.undo_depth, 5);
        assert_eq!(config.id_conflict, IdConflictPolicy::Regenerate);
        assert_eq!(config.cache_capacity, DispatcherConfig::default().cache_capacity);
    }
}
