//! Dashboard events and the bus that delivers them
//!
//! Handlers subscribe to one [`EventType`] or to everything. Events of one
//! dispatch are published in the order they were emitted, and every handler sees
//! them in that order.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::filters::{AttributeFilter, FilterContext, FilterItem};
use crate::layout::{Item, ItemSize, LayoutDelta, LayoutScope, Section, SectionHeader};
use crate::refs::{CorrelationId, FilterId, LocalId, ObjRef, StashKey, TabId};
use crate::widget::FilterSettings;

/// String tag of an event, as seen by subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "SECTION_ADDED")]
    SectionAdded,
    #[serde(rename = "SECTION_REMOVED")]
    SectionRemoved,
    #[serde(rename = "SECTION_MOVED")]
    SectionMoved,
    #[serde(rename = "SECTION_HEADER_CHANGED")]
    SectionHeaderChanged,
    #[serde(rename = "ITEMS_ADDED")]
    ItemsAdded,
    #[serde(rename = "ITEM_REMOVED")]
    ItemRemoved,
    #[serde(rename = "ITEM_REPLACED")]
    ItemReplaced,
    #[serde(rename = "ITEM_MOVED")]
    ItemMoved,
    #[serde(rename = "ITEMS_RESIZED")]
    ItemsResized,
    #[serde(rename = "ITEMS_STASHED")]
    ItemsStashed,
    #[serde(rename = "STASH_DRAINED")]
    StashDrained,
    #[serde(rename = "FILTER_ADDED")]
    FilterAdded,
    #[serde(rename = "FILTER_REMOVED")]
    FilterRemoved,
    #[serde(rename = "FILTER_MOVED")]
    FilterMoved,
    #[serde(rename = "FILTER_CHANGED")]
    FilterChanged,
    #[serde(rename = "FILTER_CONTEXT_CHANGED")]
    FilterContextChanged,
    #[serde(rename = "WIDGET_FILTER_SETTINGS_CHANGED")]
    WidgetFilterSettingsChanged,
    #[serde(rename = "WIDGET_INSIGHT_CHANGED")]
    WidgetInsightChanged,
    #[serde(rename = "ACTIVE_TAB_SWITCHED")]
    ActiveTabSwitched,
    #[serde(rename = "EFFECTIVE_FILTERS_RESOLVED")]
    EffectiveFiltersResolved,
    #[serde(rename = "WIDGET_FILTERS_FAILED")]
    WidgetFiltersFailed,
    #[serde(rename = "LAYOUT_CHANGES_UNDONE")]
    LayoutChangesUndone,
    #[serde(rename = "LAYOUT_CHANGES_REDONE")]
    LayoutChangesRedone,
    #[serde(rename = "COMMAND.INVALID_ARGUMENTS")]
    CommandRejected,
    #[serde(rename = "COMMAND.STALE")]
    CommandStale,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::SectionAdded => "SECTION_ADDED",
            EventType::SectionRemoved => "SECTION_REMOVED",
            EventType::SectionMoved => "SECTION_MOVED",
            EventType::SectionHeaderChanged => "SECTION_HEADER_CHANGED",
            EventType::ItemsAdded => "ITEMS_ADDED",
            EventType::ItemRemoved => "ITEM_REMOVED",
            EventType::ItemReplaced => "ITEM_REPLACED",
            EventType::ItemMoved => "ITEM_MOVED",
            EventType::ItemsResized => "ITEMS_RESIZED",
            EventType::ItemsStashed => "ITEMS_STASHED",
            EventType::StashDrained => "STASH_DRAINED",
            EventType::FilterAdded => "FILTER_ADDED",
            EventType::FilterRemoved => "FILTER_REMOVED",
            EventType::FilterMoved => "FILTER_MOVED",
            EventType::FilterChanged => "FILTER_CHANGED",
            EventType::FilterContextChanged => "FILTER_CONTEXT_CHANGED",
            EventType::WidgetFilterSettingsChanged => "WIDGET_FILTER_SETTINGS_CHANGED",
            EventType::WidgetInsightChanged => "WIDGET_INSIGHT_CHANGED",
            EventType::ActiveTabSwitched => "ACTIVE_TAB_SWITCHED",
            EventType::EffectiveFiltersResolved => "EFFECTIVE_FILTERS_RESOLVED",
            EventType::WidgetFiltersFailed => "WIDGET_FILTERS_FAILED",
            EventType::LayoutChangesUndone => "LAYOUT_CHANGES_UNDONE",
            EventType::LayoutChangesRedone => "LAYOUT_CHANGES_REDONE",
            EventType::CommandRejected => "COMMAND.INVALID_ARGUMENTS",
            EventType::CommandStale => "COMMAND.STALE",
        }
    }

    /// Whether this event reports that a command did not apply
    pub fn is_rejection(self) -> bool {
        matches!(self, EventType::CommandRejected | EventType::CommandStale)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum DashboardEvent {
    #[serde(rename = "SECTION_ADDED")]
    SectionAdded {
        scope: LayoutScope,
        index: usize,
        section: Section,
    },
    #[serde(rename = "SECTION_REMOVED")]
    SectionRemoved {
        scope: LayoutScope,
        index: usize,
        section: Section,
        stashed_to: Option<StashKey>,
    },
    #[serde(rename = "SECTION_MOVED")]
    SectionMoved {
        scope: LayoutScope,
        from: usize,
        to: usize,
    },
    #[serde(rename = "SECTION_HEADER_CHANGED")]
    SectionHeaderChanged {
        scope: LayoutScope,
        index: usize,
        header: SectionHeader,
    },
    #[serde(rename = "ITEMS_ADDED")]
    ItemsAdded {
        scope: LayoutScope,
        section: usize,
        index: usize,
        items: Vec<Item>,
    },
    #[serde(rename = "ITEM_REMOVED")]
    ItemRemoved {
        scope: LayoutScope,
        section: usize,
        index: usize,
        item: Item,
        stashed_to: Option<StashKey>,
    },
    #[serde(rename = "ITEM_REPLACED")]
    ItemReplaced {
        scope: LayoutScope,
        section: usize,
        index: usize,
        previous: Item,
        items: Vec<Item>,
        stashed_to: Option<StashKey>,
    },
    #[serde(rename = "ITEM_MOVED")]
    ItemMoved {
        scope: LayoutScope,
        from_section: usize,
        from_index: usize,
        to_section: usize,
        to_index: usize,
    },
    #[serde(rename = "ITEMS_RESIZED")]
    ItemsResized {
        scope: LayoutScope,
        section: usize,
        items: Vec<usize>,
        sizes: Vec<ItemSize>,
    },
    #[serde(rename = "ITEMS_STASHED")]
    ItemsStashed { key: StashKey, count: usize },
    #[serde(rename = "STASH_DRAINED")]
    StashDrained { key: StashKey },

    #[serde(rename = "FILTER_ADDED")]
    FilterAdded { index: usize, filter: AttributeFilter },
    #[serde(rename = "FILTER_REMOVED")]
    FilterRemoved { filter: AttributeFilter },
    #[serde(rename = "FILTER_MOVED")]
    FilterMoved { filter: FilterId, from: usize, to: usize },
    #[serde(rename = "FILTER_CHANGED")]
    FilterChanged { filter: FilterItem },
    #[serde(rename = "FILTER_CONTEXT_CHANGED")]
    FilterContextChanged { filters: FilterContext },
    #[serde(rename = "WIDGET_FILTER_SETTINGS_CHANGED")]
    WidgetFilterSettingsChanged { widget: LocalId, settings: FilterSettings },
    #[serde(rename = "WIDGET_INSIGHT_CHANGED")]
    WidgetInsightChanged { widget: LocalId, insight: ObjRef },
    #[serde(rename = "ACTIVE_TAB_SWITCHED")]
    ActiveTabSwitched { previous: TabId, current: TabId },

    #[serde(rename = "EFFECTIVE_FILTERS_RESOLVED")]
    EffectiveFiltersResolved {
        widget: LocalId,
        filters: Vec<FilterItem>,
        warnings: Vec<String>,
    },
    #[serde(rename = "WIDGET_FILTERS_FAILED")]
    WidgetFiltersFailed { widget: LocalId, error: String },

    #[serde(rename = "LAYOUT_CHANGES_UNDONE")]
    LayoutChangesUndone { undone: Vec<CorrelationId>, redoable: bool },
    #[serde(rename = "LAYOUT_CHANGES_REDONE")]
    LayoutChangesRedone { redone: Vec<CorrelationId> },

    #[serde(rename = "COMMAND.INVALID_ARGUMENTS")]
    CommandRejected { command: String, reason: String },
    #[serde(rename = "COMMAND.STALE")]
    CommandStale { command: String, reason: String },
}

impl DashboardEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            DashboardEvent::SectionAdded { .. } => EventType::SectionAdded,
            DashboardEvent::SectionRemoved { .. } => EventType::SectionRemoved,
            DashboardEvent::SectionMoved { .. } => EventType::SectionMoved,
            DashboardEvent::SectionHeaderChanged { .. } => EventType::SectionHeaderChanged,
            DashboardEvent::ItemsAdded { .. } => EventType::ItemsAdded,
            DashboardEvent::ItemRemoved { .. } => EventType::ItemRemoved,
            DashboardEvent::ItemReplaced { .. } => EventType::ItemReplaced,
            DashboardEvent::ItemMoved { .. } => EventType::ItemMoved,
            DashboardEvent::ItemsResized { .. } => EventType::ItemsResized,
            DashboardEvent::ItemsStashed { .. } => EventType::ItemsStashed,
            DashboardEvent::StashDrained { .. } => EventType::StashDrained,
            DashboardEvent::FilterAdded { .. } => EventType::FilterAdded,
            DashboardEvent::FilterRemoved { .. } => EventType::FilterRemoved,
            DashboardEvent::FilterMoved { .. } => EventType::FilterMoved,
            DashboardEvent::FilterChanged { .. } => EventType::FilterChanged,
            DashboardEvent::FilterContextChanged { .. } => EventType::FilterContextChanged,
            DashboardEvent::WidgetFilterSettingsChanged { .. } => EventType::WidgetFilterSettingsChanged,
            DashboardEvent::WidgetInsightChanged { .. } => EventType::WidgetInsightChanged,
            DashboardEvent::ActiveTabSwitched { .. } => EventType::ActiveTabSwitched,
            DashboardEvent::EffectiveFiltersResolved { .. } => EventType::EffectiveFiltersResolved,
            DashboardEvent::WidgetFiltersFailed { .. } => EventType::WidgetFiltersFailed,
            DashboardEvent::LayoutChangesUndone { .. } => EventType::LayoutChangesUndone,
            DashboardEvent::LayoutChangesRedone { .. } => EventType::LayoutChangesRedone,
            DashboardEvent::CommandRejected { .. } => EventType::CommandRejected,
            DashboardEvent::CommandStale { .. } => EventType::CommandStale,
        }
    }

    /// Event for one layout delta produced inside `scope`
    pub fn from_delta(scope: &LayoutScope, delta: LayoutDelta) -> Self {
        let scope = scope.clone();
        match delta {
            LayoutDelta::ItemsStashed { key, count } => DashboardEvent::ItemsStashed { key, count },
            LayoutDelta::StashDrained { key } => DashboardEvent::StashDrained { key },
            LayoutDelta::SectionInserted { index, section } => DashboardEvent::SectionAdded { scope, index, section },
            LayoutDelta::SectionRemoved {
                index,
                section,
                stashed_to,
            } => DashboardEvent::SectionRemoved {
                scope,
                index,
                section,
                stashed_to,
            },
            LayoutDelta::SectionMoved { from, to } => DashboardEvent::SectionMoved { scope, from, to },
            LayoutDelta::SectionHeaderChanged { index, header } => {
                DashboardEvent::SectionHeaderChanged { scope, index, header }
            }
            LayoutDelta::ItemsInserted { section, index, items } => DashboardEvent::ItemsAdded {
                scope,
                section,
                index,
                items,
            },
            LayoutDelta::ItemRemoved {
                section,
                index,
                item,
                stashed_to,
            } => DashboardEvent::ItemRemoved {
                scope,
                section,
                index,
                item,
                stashed_to,
            },
            LayoutDelta::ItemReplaced {
                section,
                index,
                previous,
                items,
                stashed_to,
            } => DashboardEvent::ItemReplaced {
                scope,
                section,
                index,
                previous,
                items,
                stashed_to,
            },
            LayoutDelta::ItemMoved {
                from_section,
                from_index,
                to_section,
                to_index,
            } => DashboardEvent::ItemMoved {
                scope,
                from_section,
                from_index,
                to_section,
                to_index,
            },
            LayoutDelta::ItemsResized { section, items, sizes } => DashboardEvent::ItemsResized {
                scope,
                section,
                items,
                sizes,
            },
        }
    }
}

/// An event as delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventEnvelope {
    /// Position in the dispatcher's overall event stream
    pub sequence: u64,
    /// Correlation id of the command that caused the event
    pub correlation_id: Option<CorrelationId>,
    #[serde(flatten)]
    pub event: DashboardEvent,
}

impl EventEnvelope {
    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &EventEnvelope);
}

type HandlerList = Vec<Box<dyn EventHandler>>;

/// Event bus for dashboard events
///
/// Handlers run synchronously inside `publish` while the bus is locked. A handler
/// must not subscribe or publish on the same bus; to react with a new command it
/// should post to the dispatcher's command sink instead.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<EventType, HandlerList>>>,
    wildcard: Arc<Mutex<HandlerList>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
            wildcard: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe(&self, event_type: EventType, handler: Box<dyn EventHandler>) {
        self.handlers.lock().entry(event_type).or_default().push(handler);
    }

    /// Subscribe to every event
    pub fn subscribe_all(&self, handler: Box<dyn EventHandler>) {
        self.wildcard.lock().push(handler);
    }

    /// Publish one event to its typed handlers, then to wildcard handlers
    pub fn publish(&self, event: &EventEnvelope) {
        if let Some(handlers) = self.handlers.lock().get_mut(&event.event_type()) {
            for handler in handlers.iter_mut() {
                handler.handle(event);
            }
        }
        for handler in self.wildcard.lock().iter_mut() {
            handler.handle(event);
        }
    }

    /// Publish events in order
    pub fn publish_all<'a>(&self, events: impl IntoIterator<Item = &'a EventEnvelope>) {
        for event in events {
            self.publish(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper struct for creating event handlers from closures
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&EventEnvelope) + Send + Sync,
{
    fn handle(&mut self, event: &EventEnvelope) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&EventEnvelope) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}
