//! Core model of an analytical dashboard
//!
//! This crate holds the data structures every other part of the workspace works
//! on: the layout tree with its widgets, the stash of detached layout nodes, the
//! filter context, tabs, and the typed events that describe changes to them.

pub mod events;
pub mod filters;
pub mod layout;
pub mod refs;
pub mod stash;
pub mod state;
pub mod tabs;
pub mod widget;

// Re-export commonly used types
pub use events::{handler_from_fn, DashboardEvent, EventBus, EventEnvelope, EventHandler, EventType};
pub use filters::{
    AttributeFilter, AttributeSelection, DateFilter, DateGranularity, DateRange, FilterContext, FilterContextError,
    FilterItem, FilterParent, FilterReference, SelectionMode,
};
pub use layout::{
    GridSize, Item, ItemSize, ItemSource, Layout, LayoutDelta, LayoutEdit, LayoutError, LayoutOp, LayoutScope,
    ScreenSize, Section, SectionHeader, WidgetLocation,
};
pub use refs::{CorrelationId, FilterId, LocalId, ObjRef, StashKey, TabId};
pub use stash::{Stash, StashedNodes};
pub use state::{DashboardState, InvariantError};
pub use tabs::{Dashboard, DashboardTab, TabError};
pub use widget::{DateSource, FilterSettings, FilterTarget, SwitcherEntry, Widget, WidgetHeader, WidgetKind};
