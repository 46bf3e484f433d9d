//! Task grouping and sorting engine for taskbar-like shells.
//!
//! The host feeds window-system events into a [`GroupManager`]; the manager
//! maintains a tree of tasks and groups, shaped by pluggable grouping and
//! sorting strategies, and reports every tree change on an outbound event
//! queue. It never talks to the window system itself.

pub mod common;
pub mod grouping;
pub mod manager;
pub mod model;
pub mod sorting;

pub use common::config::{ConfigError, GroupManagerSettings};
pub use grouping::{EditableGroupProperties, GroupingPolicy, StrategyAction};
pub use manager::{GroupManager, TaskEvent};
pub use model::item::{
    Color, Icon, StartupId, StartupInfo, TaskChanges, TaskInfo, TaskItem, WindowActions, WindowId,
    WindowState, WindowType,
};
pub use model::tree::{GroupEvent, ItemId, TaskGroup, TaskTree};
pub use sorting::SortingPolicy;

#[cfg(test)]
mod tests;
