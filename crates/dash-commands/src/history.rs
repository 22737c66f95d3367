//! Undo and redo of layout changes
//!
//! Each undoable command records the layouts of every tab and the stash as they
//! were before and after it ran. Undo restores the "before" of the oldest undone
//! entry; redo restores the "after" of the entry it re-applies. Filters are not
//! part of the history.

use std::collections::VecDeque;

use thiserror::Error;

use dash_core::{CorrelationId, DashboardState, Layout, Stash};

use crate::command::UndoPoint;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Undo needs at least one step")]
    ZeroSteps,

    #[error("Cannot undo {requested} steps, history holds {available}")]
    NotEnoughHistory { requested: usize, available: usize },

    #[error("Command {0} is not in the undo history")]
    UnknownCorrelation(CorrelationId),
}

/// Layouts of every tab, in tab order, together with the stash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSnapshot {
    pub layouts: Vec<Layout>,
    pub stash: Stash,
}

impl LayoutSnapshot {
    pub fn capture(state: &DashboardState) -> Self {
        Self {
            layouts: state.dashboard.layouts(),
            stash: state.stash.clone(),
        }
    }

    pub fn restore_into(self, state: &mut DashboardState) {
        state.dashboard.restore_layouts(self.layouts);
        state.stash = self.stash;
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub correlation_id: CorrelationId,
    pub command: &'static str,
    pub before: LayoutSnapshot,
    pub after: LayoutSnapshot,
}

/// Result of an undo: what to restore and which commands were undone, most recent first
#[derive(Debug, Clone)]
pub struct Undone {
    pub restore: LayoutSnapshot,
    pub undone: Vec<CorrelationId>,
}

#[derive(Debug, Clone)]
pub struct UndoHistory {
    entries: VecDeque<HistoryEntry>,
    /// Top of the stack is the next entry to redo
    redo: Vec<HistoryEntry>,
    depth: usize,
}

impl UndoHistory {
    pub fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            redo: Vec::new(),
            depth,
        }
    }

    /// Record a freshly applied command. Invalidates everything that could be redone.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        if self.depth == 0 {
            return;
        }
        self.entries.push_back(entry);
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
    }

    pub fn undo(&mut self, point: &UndoPoint, redoable: bool) -> Result<Undone, HistoryError> {
        if self.entries.is_empty() {
            return Err(HistoryError::NothingToUndo);
        }
        let available = self.entries.len();
        let count = match point {
            UndoPoint::Last => 1,
            UndoPoint::Steps(0) => return Err(HistoryError::ZeroSteps),
            UndoPoint::Steps(n) if *n > available => {
                return Err(HistoryError::NotEnoughHistory {
                    requested: *n,
                    available,
                })
            }
            UndoPoint::Steps(n) => *n,
            UndoPoint::ToCorrelation(id) => {
                let position = self
                    .entries
                    .iter()
                    .rposition(|e| &e.correlation_id == id)
                    .ok_or_else(|| HistoryError::UnknownCorrelation(id.clone()))?;
                available - position
            }
        };

        let popped: Vec<HistoryEntry> = (0..count).filter_map(|_| self.entries.pop_back()).collect();
        let undone = popped.iter().map(|e| e.correlation_id.clone()).collect();
        let restore = match popped.last() {
            Some(oldest) => oldest.before.clone(),
            None => return Err(HistoryError::NothingToUndo),
        };

        if redoable {
            self.redo.extend(popped);
        } else {
            self.redo.clear();
        }
        Ok(Undone { restore, undone })
    }

    /// Re-apply the most recently undone command
    pub fn redo(&mut self) -> Result<(LayoutSnapshot, CorrelationId), HistoryError> {
        let entry = self.redo.pop().ok_or(HistoryError::NothingToRedo)?;
        let result = (entry.after.clone(), entry.correlation_id.clone());
        self.entries.push_back(entry);
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
        Ok(result)
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::{Dashboard, FilterContext, Section, SectionHeader};

    fn snapshot(sections: usize) -> LayoutSnapshot {
        LayoutSnapshot {
            layouts: vec![Layout::new(
                (0..sections).map(|_| Section::new(SectionHeader::default(), vec![])).collect(),
            )],
            stash: Stash::new(),
        }
    }

    fn entry(id: &str, before: usize) -> HistoryEntry {
        HistoryEntry {
            correlation_id: CorrelationId::from(id),
            command: "AddLayoutSection",
            before: snapshot(before),
            after: snapshot(before + 1),
        }
    }

    fn history() -> UndoHistory {
        let mut history = UndoHistory::new(10);
        history.record(entry("a", 0));
        history.record(entry("b", 1));
        history.record(entry("c", 2));
        history
    }

    #[test]
    fn test_undo_to_correlation_restores_oldest_before() {
        let mut history = history();
        let undone = history
            .undo(&UndoPoint::ToCorrelation(CorrelationId::from("b")), true)
            .unwrap();
        assert_eq!(undone.undone, vec![CorrelationId::from("c"), CorrelationId::from("b")]);
        assert_eq!(undone.restore, snapshot(1));
        assert_eq!(history.len(), 1);

        // redo re-applies b first, then c
        let (restored, id) = history.redo().unwrap();
        assert_eq!(id, CorrelationId::from("b"));
        assert_eq!(restored, snapshot(2));
        assert_eq!(history.redo().unwrap().1, CorrelationId::from("c"));
        assert_eq!(history.redo().unwrap_err(), HistoryError::NothingToRedo);
    }

    #[test]
    fn test_record_clears_redo_and_respects_depth() {
        let mut history = UndoHistory::new(2);
        history.record(entry("a", 0));
        history.record(entry("b", 1));
        history.record(entry("c", 2));
        assert_eq!(history.len(), 2);

        history.undo(&UndoPoint::Last, true).unwrap();
        assert!(history.can_redo());
        history.record(entry("d", 2));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_errors() {
        let mut history = history();
        assert_eq!(
            history.undo(&UndoPoint::Steps(4), true).unwrap_err(),
            HistoryError::NotEnoughHistory {
                requested: 4,
                available: 3
            }
        );
        assert_eq!(history.undo(&UndoPoint::Steps(0), true).unwrap_err(), HistoryError::ZeroSteps);
        assert_eq!(history.len(), 3);

        history.undo(&UndoPoint::Steps(3), false).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.undo(&UndoPoint::Last, true).unwrap_err(), HistoryError::NothingToUndo);
    }

    #[test]
    fn test_snapshot_round_trip_through_state() {
        let mut state = DashboardState::new(Dashboard::single("d", Layout::default(), FilterContext::empty()));
        snapshot(2).restore_into(&mut state);
        assert_eq!(state.dashboard.active_tab().layout.section_count(), 2);
        assert_eq!(LayoutSnapshot::capture(&state), snapshot(2));
    }
}
