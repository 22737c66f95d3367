//! Single-writer command dispatcher
//!
//! The dispatcher owns the dashboard state. Commands are applied one at a time in
//! arrival order; a command posted while another is being applied (for example
//! by an event handler) waits in the [`CommandSink`] until the current command
//! has emitted all of its events.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use dash_core::{
    CorrelationId, DashboardEvent, DashboardState, DateSource, EventBus, EventEnvelope, EventType, FilterTarget,
    LocalId,
};
use dash_filters::cache::CachedResolution;
use dash_filters::{resolve_for_widget, Catalog, QueryableMeta, ResolutionCache};

use crate::command::{Command, CommandGuard};
use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::handlers::{self, Applied, HandlerContext, HistoryChange, Recompute};
use crate::history::{HistoryEntry, LayoutSnapshot, UndoHistory};

/// Queue of commands waiting to be applied
#[derive(Clone, Default)]
pub struct CommandSink {
    queue: Arc<Mutex<VecDeque<Command>>>,
}

impl CommandSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command behind everything already waiting
    pub fn post(&self, command: Command) {
        self.queue.lock().push_back(command);
    }

    fn pop(&self) -> Option<Command> {
        self.queue.lock().pop_front()
    }

    /// Drop everything waiting, returning how many commands were dropped
    fn discard(&self) -> usize {
        self.queue.lock().drain(..).count()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum JournalResult {
    Applied,
    Rejected { reason: String },
    Stale { reason: String },
}

/// One processed command, in processing order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub sequence: u64,
    pub correlation_id: CorrelationId,
    pub command: &'static str,
    pub layout_version: u64,
    pub filters_version: u64,
    pub result: JournalResult,
}

/// Events caused by one dispatched command
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub correlation_id: CorrelationId,
    pub events: Vec<EventEnvelope>,
}

impl DispatchOutcome {
    /// The command was rejected or discarded as stale
    pub fn is_rejected(&self) -> bool {
        self.events.iter().any(|e| e.event_type().is_rejection())
    }

    pub fn event_types(&self) -> Vec<EventType> {
        self.events.iter().map(EventEnvelope::event_type).collect()
    }

    pub fn first(&self, event_type: EventType) -> Option<&EventEnvelope> {
        self.events.iter().find(|e| e.event_type() == event_type)
    }
}

pub struct Dispatcher {
    state: DashboardState,
    last_good: Arc<DashboardState>,
    catalog: Catalog,
    config: DispatcherConfig,
    bus: EventBus,
    sink: CommandSink,
    history: UndoHistory,
    cache: ResolutionCache,
    event_log: VecDeque<EventEnvelope>,
    journal: VecDeque<JournalEntry>,
    next_sequence: u64,
    processed: u64,
}

impl Dispatcher {
    /// Take ownership of a loaded dashboard. Fails if the state is already inconsistent.
    pub fn new(state: DashboardState, catalog: Catalog, config: DispatcherConfig) -> Result<Self, DispatchError> {
        state
            .check_invariants()
            .map_err(|source| DispatchError::InvariantViolation {
                command: "load".to_string(),
                source,
            })?;
        tracing::info!(
            "Dispatcher ready: {} tabs, {} widgets",
            state.dashboard.tabs().len(),
            state.dashboard.local_ids().len()
        );

        Ok(Self {
            last_good: state.snapshot(),
            state,
            catalog,
            history: UndoHistory::new(config.undo_depth),
            cache: ResolutionCache::new(config.cache_capacity),
            config,
            bus: EventBus::new(),
            sink: CommandSink::new(),
            event_log: VecDeque::new(),
            journal: VecDeque::new(),
            next_sequence: 0,
            processed: 0,
        })
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Immutable snapshot of the last committed state
    pub fn snapshot(&self) -> Arc<DashboardState> {
        self.last_good.clone()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Bring fetched insight metadata into the catalog. Cached resolutions of
    /// every widget bound to the insight, in any tab, are dropped so the next
    /// lookup sees the new compatible date datasets.
    pub fn merge_insight(&mut self, meta: QueryableMeta) {
        let bound: Vec<LocalId> = self
            .state
            .dashboard
            .tabs()
            .iter()
            .flat_map(|tab| tab.layout.filter_targets())
            .filter(|target| matches!(target.source, DateSource::Insight(insight) if insight == &meta.obj_ref))
            .map(|target| target.local_id.clone())
            .collect();
        tracing::debug!("Catalog updated with {}, invalidating {} widgets", meta.obj_ref, bound.len());
        for widget in &bound {
            self.cache.invalidate(widget);
        }
        self.catalog.add_insight(meta);
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Handle for posting follow-up commands from event handlers
    pub fn sink(&self) -> CommandSink {
        self.sink.clone()
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    /// Most recent events, oldest first
    pub fn event_log(&self) -> impl Iterator<Item = &EventEnvelope> {
        self.event_log.iter()
    }

    pub fn journal(&self) -> impl Iterator<Item = &JournalEntry> {
        self.journal.iter()
    }

    /// Guard for a deferred command that must not outlive structural changes
    pub fn unchanged_guard(&self) -> CommandGuard {
        CommandGuard::Unchanged {
            layout_version: self.state.layout_version,
            active_tab: self.state.dashboard.active_tab().id.clone(),
        }
    }

    /// Guard for a deferred command that only needs its widget to survive
    pub fn widget_guard(&self, widget: &LocalId) -> CommandGuard {
        CommandGuard::WidgetPresent {
            widget: widget.clone(),
            active_tab: self.state.dashboard.active_tab().id.clone(),
        }
    }

    /// Apply a command and everything queued behind it.
    ///
    /// Returns the events of `command` itself. Rejections are events, not errors;
    /// an error means an invariant broke, the state was rolled back and every
    /// command still queued was dropped.
    pub fn dispatch(&mut self, command: Command) -> Result<DispatchOutcome, DispatchError> {
        let correlation_id = command.correlation_id.clone();
        self.sink.post(command);

        let mut events = Vec::new();
        while let Some(next) = self.sink.pop() {
            let emitted = match self.process(next) {
                Ok(emitted) => emitted,
                Err(err) => {
                    let dropped = self.sink.discard();
                    if dropped > 0 {
                        tracing::warn!("Dropped {} queued commands after a failed commit", dropped);
                    }
                    return Err(err);
                }
            };
            events.extend(
                emitted
                    .into_iter()
                    .filter(|e| e.correlation_id.as_ref() == Some(&correlation_id)),
            );
        }
        Ok(DispatchOutcome { correlation_id, events })
    }

    /// Dispatch and return the first event of `event_type`, or the rejection if the command failed
    pub fn dispatch_and_wait_for(
        &mut self,
        command: Command,
        event_type: EventType,
    ) -> Result<EventEnvelope, DispatchError> {
        let outcome = self.dispatch(command)?;
        outcome
            .events
            .into_iter()
            .find(|e| e.event_type() == event_type || e.event_type().is_rejection())
            .ok_or(DispatchError::EventNotObserved(event_type))
    }

    fn process(&mut self, command: Command) -> Result<Vec<EventEnvelope>, DispatchError> {
        let kind = command.kind();
        tracing::debug!("Applying {} ({})", kind, command.correlation_id);

        if let Some(reason) = command.guard.as_ref().and_then(|guard| self.stale_reason(guard)) {
            tracing::info!("Discarding stale {}: {}", kind, reason);
            let event = DashboardEvent::CommandStale {
                command: kind.to_string(),
                reason: reason.clone(),
            };
            return Ok(self.emit(&command, vec![event], JournalResult::Stale { reason }));
        }

        let result = {
            let ctx = HandlerContext {
                state: &self.state,
                catalog: &self.catalog,
                config: &self.config,
                history: &self.history,
            };
            handlers::apply(&ctx, &command.payload)
        };
        let applied = match result {
            Ok(applied) => applied,
            Err(err) => {
                tracing::warn!("Rejected {}: {}", kind, err);
                let reason = err.to_string();
                let event = DashboardEvent::CommandRejected {
                    command: kind.to_string(),
                    reason: reason.clone(),
                };
                return Ok(self.emit(&command, vec![event], JournalResult::Rejected { reason }));
            }
        };

        let Applied {
            state,
            mut events,
            recompute,
            history,
        } = applied;

        let before = matches!(history, HistoryChange::Record).then(|| LayoutSnapshot::capture(&self.state));
        let filters_version = self.state.filters_version;
        self.commit(kind, state)?;

        match history {
            HistoryChange::Keep => {}
            HistoryChange::Record => {
                if let Some(before) = before {
                    self.history.record(HistoryEntry {
                        correlation_id: command.correlation_id.clone(),
                        command: kind,
                        before,
                        after: LayoutSnapshot::capture(&self.state),
                    });
                }
            }
            HistoryChange::Replace(history) => self.history = history,
        }

        if self.state.filters_version != filters_version {
            self.cache.retain_version(self.state.filters_version);
        }
        events.extend(self.recompute(&recompute));
        Ok(self.emit(&command, events, JournalResult::Applied))
    }

    /// Adopt a new state if it holds every invariant; otherwise fall back to the last good one
    fn commit(&mut self, command: &str, state: DashboardState) -> Result<(), DispatchError> {
        if let Err(source) = state.check_invariants() {
            tracing::error!(
                "Invariant violated by {}: {}; restoring last known-good state",
                command,
                source
            );
            self.state = (*self.last_good).clone();
            self.cache.clear();
            return Err(DispatchError::InvariantViolation {
                command: command.to_string(),
                source,
            });
        }
        self.state = state;
        self.last_good = self.state.snapshot();
        Ok(())
    }

    fn stale_reason(&self, guard: &CommandGuard) -> Option<String> {
        let active = &self.state.dashboard.active_tab().id;
        match guard {
            CommandGuard::Unchanged {
                layout_version,
                active_tab,
            } => {
                if active != active_tab {
                    Some(format!("active tab changed from '{}' to '{}'", active_tab, active))
                } else if *layout_version != self.state.layout_version {
                    Some(format!(
                        "layout changed (version {} -> {})",
                        layout_version, self.state.layout_version
                    ))
                } else {
                    None
                }
            }
            CommandGuard::WidgetPresent { widget, active_tab } => {
                if active != active_tab {
                    Some(format!("active tab changed from '{}' to '{}'", active_tab, active))
                } else if !self.state.dashboard.active_tab().layout.contains(widget) {
                    Some(format!("widget '{}' was removed", widget))
                } else {
                    None
                }
            }
        }
    }

    fn recompute(&self, recompute: &Recompute) -> Vec<DashboardEvent> {
        let layout = &self.state.dashboard.active_tab().layout;
        let targets: Vec<FilterTarget<'_>> = match recompute {
            Recompute::Nothing => return Vec::new(),
            Recompute::Widgets(ids) => layout
                .filter_targets()
                .into_iter()
                .filter(|t| ids.contains(t.local_id))
                .collect(),
            Recompute::ActiveTab => layout.filter_targets(),
        };
        if targets.is_empty() {
            return Vec::new();
        }

        let context = self.state.dashboard.active_filter_context();
        let version = self.state.filters_version;
        targets
            .into_iter()
            .map(|target| {
                let result = resolve_for_widget(&target, &context, &self.catalog);
                self.cache.put(target.local_id.clone(), version, result.clone());
                resolution_event(target.local_id, result)
            })
            .collect()
    }

    /// Effective filters of a widget or switcher entry in the active tab
    pub fn effective_filters(&self, widget: &LocalId) -> Option<CachedResolution> {
        let version = self.state.filters_version;
        if let Some(cached) = self.cache.get(widget, version) {
            return Some(cached);
        }
        let target = self.state.dashboard.active_tab().layout.filter_target(widget)?;
        let context = self.state.dashboard.active_filter_context();
        let result = resolve_for_widget(&target, &context, &self.catalog);
        self.cache.put(widget.clone(), version, result.clone());
        Some(result)
    }

    /// Tag events with sequence numbers, log them and deliver them to subscribers
    fn emit(&mut self, command: &Command, events: Vec<DashboardEvent>, result: JournalResult) -> Vec<EventEnvelope> {
        let envelopes: Vec<EventEnvelope> = events
            .into_iter()
            .map(|event| {
                self.next_sequence += 1;
                EventEnvelope {
                    sequence: self.next_sequence,
                    correlation_id: Some(command.correlation_id.clone()),
                    event,
                }
            })
            .collect();

        let capacity = self.config.event_log_capacity;
        for envelope in &envelopes {
            self.event_log.push_back(envelope.clone());
        }
        while self.event_log.len() > capacity {
            self.event_log.pop_front();
        }

        self.processed += 1;
        self.journal.push_back(JournalEntry {
            sequence: self.processed,
            correlation_id: command.correlation_id.clone(),
            command: command.kind(),
            layout_version: self.state.layout_version,
            filters_version: self.state.filters_version,
            result,
        });
        while self.journal.len() > capacity {
            self.journal.pop_front();
        }

        self.bus.publish_all(&envelopes);
        envelopes
    }
}

fn resolution_event(widget: &LocalId, result: CachedResolution) -> DashboardEvent {
    match result {
        Ok(resolution) => DashboardEvent::EffectiveFiltersResolved {
            widget: widget.clone(),
            filters: resolution.filters,
            warnings: resolution.warnings.iter().map(ToString::to_string).collect(),
        },
        Err(err) => {
            tracing::warn!("Filter resolution failed for '{}': {}", widget, err);
            DashboardEvent::WidgetFiltersFailed {
                widget: widget.clone(),
                error: err.to_string(),
            }
        }
    }
}
