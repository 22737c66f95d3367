//! Commands that need a metadata round trip before they can apply
//!
//! The fetch runs without holding the dispatcher. Once it resolves, the apply
//! phase is dispatched as an ordinary command carrying a guard captured before
//! the fetch; if the dashboard moved on in the meantime the dispatcher discards
//! it as stale. Fetches tied to a widget are aborted when the widget leaves the
//! layout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};

use dash_core::{
    handler_from_fn, DashboardEvent, DashboardState, EventType, FilterSettings, Item, ItemSize, ItemSource,
    LayoutScope, LocalId, ObjRef, Widget,
};
use dash_filters::MetadataSource;

use crate::command::{Command, CommandPayload};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::DispatchError;
use crate::execution::{ExecutionBackend, ExecutionError, ExecutionResult, WidgetQuery};

/// Request to place a new insight widget
#[derive(Debug, Clone)]
pub struct AddInsightWidget {
    pub scope: LayoutScope,
    pub section: usize,
    pub index: i64,
    pub local_id: LocalId,
    pub insight: ObjRef,
    pub size: ItemSize,
}

struct InFlight {
    ticket: u64,
    abort: AbortHandle,
}

type InFlightMap = Arc<Mutex<AHashMap<LocalId, InFlight>>>;

/// Shared, cloneable access to a dispatcher from async code
#[derive(Clone)]
pub struct DashboardHandle {
    dispatcher: Arc<Mutex<Dispatcher>>,
    in_flight: InFlightMap,
    tickets: Arc<AtomicU64>,
}

impl DashboardHandle {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let in_flight: InFlightMap = Arc::new(Mutex::new(AHashMap::new()));

        let tracked = in_flight.clone();
        dispatcher.bus().subscribe_all(handler_from_fn(move |envelope| {
            let removed = removed_widgets(&envelope.event);
            if removed.is_empty() {
                return;
            }
            let mut tracked = tracked.lock();
            for widget in removed {
                if let Some(task) = tracked.remove(&widget) {
                    tracing::debug!("Cancelling pending fetch for removed widget '{}'", widget);
                    task.abort.abort();
                }
            }
        }));

        Self {
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            in_flight,
            tickets: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn dispatch(&self, command: Command) -> Result<DispatchOutcome, DispatchError> {
        self.dispatcher.lock().dispatch(command)
    }

    pub fn dispatch_and_wait_for(
        &self,
        command: Command,
        event_type: EventType,
    ) -> Result<dash_core::EventEnvelope, DispatchError> {
        self.dispatcher.lock().dispatch_and_wait_for(command, event_type)
    }

    pub fn snapshot(&self) -> Arc<DashboardState> {
        self.dispatcher.lock().snapshot()
    }

    /// Run `f` with exclusive access to the dispatcher
    pub fn with_dispatcher<R>(&self, f: impl FnOnce(&mut Dispatcher) -> R) -> R {
        f(&mut self.dispatcher.lock())
    }

    /// Number of widget-bound fetches still running
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Fetch the insight, then insert a widget for it. Stale if the layout
    /// changed structurally or the tab was switched during the fetch.
    pub async fn add_insight_widget(
        &self,
        source: &dyn MetadataSource,
        request: AddInsightWidget,
    ) -> Result<DispatchOutcome, DispatchError> {
        let guard = self.dispatcher.lock().unchanged_guard();
        let meta = source.insight(&request.insight).await?;

        let settings = FilterSettings {
            ignore_dashboard_filters: Vec::new(),
            date_data_set: meta.date_data_sets.first().cloned(),
        };
        let widget = Widget::insight(request.local_id, request.insight)
            .with_title(meta.title.clone())
            .with_filters(settings);
        let command = Command::new(CommandPayload::AddSectionItems {
            scope: request.scope,
            section: request.section,
            index: request.index,
            items: vec![ItemSource::Item(Item::new(request.size, widget))],
        })
        .with_guard(guard);

        let mut dispatcher = self.dispatcher.lock();
        dispatcher.merge_insight(meta);
        dispatcher.dispatch(command)
    }

    /// Fetch the insight in the background and rebind the widget to it. The
    /// task is aborted if the widget is removed first; a result that arrives
    /// after the widget left the active tab is discarded as stale.
    pub fn refresh_widget_insight(
        &self,
        source: Arc<dyn MetadataSource>,
        widget: LocalId,
        insight: ObjRef,
    ) -> JoinHandle<Result<DispatchOutcome, DispatchError>> {
        let guard = self.dispatcher.lock().widget_guard(&widget);
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let handle = self.clone();
        let task_widget = widget.clone();

        let mut in_flight = self.in_flight.lock();
        let task = tokio::spawn(async move {
            let meta = source.insight(&insight).await;
            let outcome = match meta {
                Ok(meta) => {
                    let mut dispatcher = handle.dispatcher.lock();
                    dispatcher.merge_insight(meta);
                    dispatcher.dispatch(Command::change_widget_insight(task_widget.clone(), insight).with_guard(guard))
                }
                Err(err) => Err(DispatchError::from(err)),
            };

            let mut in_flight = handle.in_flight.lock();
            if in_flight.get(&task_widget).map(|t| t.ticket) == Some(ticket) {
                in_flight.remove(&task_widget);
            }
            outcome
        });

        if let Some(previous) = in_flight.insert(
            widget,
            InFlight {
                ticket,
                abort: task.abort_handle(),
            },
        ) {
            // a newer refresh supersedes the old one
            previous.abort.abort();
        }
        task
    }

    /// Abort the pending fetch for a widget, if any
    pub fn cancel(&self, widget: &LocalId) -> bool {
        match self.in_flight.lock().remove(widget) {
            Some(task) => {
                task.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Resolve the widget's effective filters and run its query
    pub async fn execute_widget(
        &self,
        widget: &LocalId,
        backend: &dyn ExecutionBackend,
    ) -> Result<ExecutionResult, ExecutionError> {
        let (query, filters) = {
            let dispatcher = self.dispatcher.lock();
            let layout = &dispatcher.state().dashboard.active_tab().layout;
            let target = layout
                .filter_target(widget)
                .ok_or_else(|| ExecutionError::UnknownWidget(widget.clone()))?;
            let query = WidgetQuery::for_target(&target).ok_or_else(|| ExecutionError::NotExecutable(widget.clone()))?;
            let resolution = dispatcher
                .effective_filters(widget)
                .ok_or_else(|| ExecutionError::UnknownWidget(widget.clone()))??;
            (query, resolution.filters)
        };
        tracing::debug!("Executing '{}' with {} filters", widget, filters.len());
        backend.execute(&query, &filters).await
    }
}

/// Widgets that left the layout through this event
fn removed_widgets(event: &DashboardEvent) -> Vec<LocalId> {
    let mut ids = Vec::new();
    match event {
        DashboardEvent::ItemRemoved { item, .. } => item.collect_local_ids(&mut ids),
        DashboardEvent::ItemReplaced { previous, .. } => previous.collect_local_ids(&mut ids),
        DashboardEvent::SectionRemoved { section, .. } => {
            for item in &section.items {
                item.collect_local_ids(&mut ids);
            }
        }
        _ => {}
    }
    ids.into_iter().cloned().collect()
}
