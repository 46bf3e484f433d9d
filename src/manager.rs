//! The grouping and sorting engine. Consumes a stream of window-system
//! events, maintains the visible task tree through the configured
//! strategies, and publishes tree changes on an outbound queue.

use tracing::{debug, info, trace, warn};

use crate::common::collections::HashMap;
use crate::common::config::GroupManagerSettings;
use crate::grouping::{
    EditableGroupProperties, GroupingPolicy, GroupingStrategy, GroupingStrategyKind,
    ManualGroupingStrategy, ProgramGroupingStrategy, StrategyAction,
};
use crate::model::item::{
    Color, Icon, StartupId, StartupInfo, TaskChanges, TaskInfo, TaskItem, WindowId, WindowType,
};
use crate::model::tree::{GroupEvent, ItemId, TaskTree};
use crate::sorting::{
    AlphaSortingStrategy, ManualSortingStrategy, SortingPolicy, SortingStrategy,
    SortingStrategyKind,
};

/// Inbound notification from the window system. The manager never calls
/// back into the source; everything it needs rides on the event.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    TaskAdded(WindowId, TaskInfo),
    TaskChanged(WindowId, TaskChanges, TaskInfo),
    TaskRemoved(WindowId),
    StartupAdded(StartupId, StartupInfo),
    StartupRemoved(StartupId),
    DesktopChanged(i32),
}

/// Upper bound on dissolve-recheck rounds in one settle pass. The tree is
/// finite, so this only guards against a misbehaving strategy.
const MAX_SETTLE_ROUNDS: usize = 128;

pub struct GroupManager {
    tree: TaskTree,
    tasks: HashMap<WindowId, ItemId>,
    /// Window ids in arrival order, for deterministic reloads.
    task_order: Vec<WindowId>,
    startups: HashMap<StartupId, ItemId>,
    grouping: Option<GroupingStrategyKind>,
    grouping_policy: GroupingPolicy,
    sorting: Option<SortingStrategyKind>,
    sorting_policy: SortingPolicy,
    settings: GroupManagerSettings,
    current_desktop: i32,
    current_screen: i32,
    /// Windows whose geometry moved since the last screen check.
    geometry_pending: Vec<WindowId>,
}

impl Default for GroupManager {
    fn default() -> Self {
        Self::new(GroupManagerSettings::default())
    }
}

impl GroupManager {
    pub fn new(settings: GroupManagerSettings) -> Self {
        let mut manager = Self {
            tree: TaskTree::new(),
            tasks: HashMap::default(),
            task_order: Vec::new(),
            startups: HashMap::default(),
            grouping: None,
            grouping_policy: GroupingPolicy::NoGrouping,
            sorting: None,
            sorting_policy: SortingPolicy::NoSorting,
            settings,
            current_desktop: 1,
            current_screen: 0,
            geometry_pending: Vec::new(),
        };
        manager.set_grouping_policy(manager.settings.grouping_strategy);
        manager.set_sorting_policy(manager.settings.sorting_strategy);
        manager
    }

    pub fn settings(&self) -> &GroupManagerSettings {
        &self.settings
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub fn root_group(&self) -> ItemId {
        self.tree.root()
    }

    pub fn current_desktop(&self) -> i32 {
        self.current_desktop
    }

    pub fn grouping_policy(&self) -> GroupingPolicy {
        self.grouping_policy
    }

    pub fn sorting_policy(&self) -> SortingPolicy {
        self.sorting_policy
    }

    pub fn item_for_window(&self, id: WindowId) -> Option<ItemId> {
        self.tasks.get(&id).copied()
    }

    /// Drains the outbound change queue.
    pub fn take_events(&mut self) -> Vec<GroupEvent> {
        self.tree.take_events()
    }

    pub fn handle_event(&mut self, event: TaskEvent) {
        trace!(?event, "event");
        match event {
            TaskEvent::TaskAdded(id, info) => self.task_added(id, info),
            TaskEvent::TaskChanged(id, changes, info) => self.task_changed(id, changes, info),
            TaskEvent::TaskRemoved(id) => self.task_removed(id),
            TaskEvent::StartupAdded(id, info) => self.startup_added(id, info),
            TaskEvent::StartupRemoved(id) => self.startup_removed(id),
            TaskEvent::DesktopChanged(desktop) => self.desktop_changed(desktop),
        }
    }

    fn task_added(&mut self, id: WindowId, info: TaskInfo) {
        if self.tasks.contains_key(&id) {
            warn!(?id, "duplicate task, ignoring");
            return;
        }

        // A startup placeholder for this window keeps its place in the tree.
        let rehomed = info
            .startup
            .and_then(|sid| self.startups.remove(&sid).map(|item| (sid, item)));
        let item = match rehomed {
            Some((sid, item)) => {
                debug!(?id, ?sid, "startup resolved to window");
                if let Some(task) = self.tree.task_mut(item) {
                    task.resolve_window(id, info);
                }
                item
            }
            None => self.tree.insert_task(TaskItem::window(id, info)),
        };
        self.tasks.insert(id, item);
        self.task_order.push(id);

        let mark = self.tree.events_len();
        self.place_item(item);
        self.settle(mark);
        self.check_if_full();
    }

    fn task_changed(&mut self, id: WindowId, changes: TaskChanges, info: TaskInfo) {
        let Some(item) = self.tasks.get(&id).copied() else {
            return;
        };
        if let Some(task) = self.tree.task_mut(item) {
            if let Some(slot) = task.info_mut() {
                *slot = info;
            }
        }
        self.tree.emit(GroupEvent::ItemChanged { item, changes });

        let mark = self.tree.events_len();
        if changes.intersects(TaskChanges::STATE | TaskChanges::DESKTOP) {
            self.place_item(item);
        }
        // Geometry only matters for the screen filter; without it there is
        // nothing to re-check, so nothing queues.
        if changes.contains(TaskChanges::GEOMETRY) && self.settings.show_only_current_screen {
            if !self.geometry_pending.contains(&id) {
                self.geometry_pending.push(id);
            }
            self.check_screen_change();
        }
        if changes.contains(TaskChanges::NAME) {
            if let Some(sorting) = &mut self.sorting {
                sorting.check(&mut self.tree, item);
            }
        }
        self.settle(mark);
    }

    fn task_removed(&mut self, id: WindowId) {
        let Some(item) = self.tasks.remove(&id) else {
            return;
        };
        self.task_order.retain(|w| *w != id);
        self.geometry_pending.retain(|w| *w != id);

        let mark = self.tree.events_len();
        self.tree.remove_from_group(item);
        if let Some(grouping) = &mut self.grouping {
            grouping.item_destroyed(&mut self.tree, item);
        }
        if let Some(sorting) = &mut self.sorting {
            sorting.item_destroyed(item);
        }
        self.tree.delete(item);
        self.settle(mark);
        self.check_if_full();
    }

    fn startup_added(&mut self, id: StartupId, info: StartupInfo) {
        if self.startups.contains_key(&id) {
            return;
        }
        let item = self.tree.insert_task(TaskItem::startup(id, info));
        self.startups.insert(id, item);
        let mark = self.tree.events_len();
        self.place_item(item);
        self.settle(mark);
    }

    fn startup_removed(&mut self, id: StartupId) {
        // Absent when the startup already resolved into a window.
        let Some(item) = self.startups.remove(&id) else {
            return;
        };
        let mark = self.tree.events_len();
        self.tree.remove_from_group(item);
        self.tree.delete(item);
        self.settle(mark);
    }

    fn desktop_changed(&mut self, desktop: i32) {
        if desktop == self.current_desktop {
            return;
        }
        info!(from = self.current_desktop, to = desktop, "desktop changed");
        self.current_desktop = desktop;
        if !self.settings.show_only_current_desktop {
            return;
        }
        if let Some(sorting) = &mut self.sorting {
            sorting.desktop_changed(&mut self.tree, desktop);
        }
        if let Some(grouping) = &mut self.grouping {
            grouping.desktop_changed(&mut self.tree, desktop);
        }
        self.reload();
    }

    /// Re-evaluates every known task against the filters and strategies.
    pub fn reload(&mut self) {
        debug!("reload");
        let mark = self.tree.events_len();
        for id in self.task_order.clone() {
            if let Some(item) = self.tasks.get(&id).copied() {
                self.place_item(item);
            }
        }
        for item in self.startups.values().copied().collect::<Vec<_>>() {
            self.place_item(item);
        }
        self.settle(mark);
        self.tree.emit(GroupEvent::Reload);
    }

    /// Routes an item into or out of the visible tree per the filters.
    fn place_item(&mut self, item: ItemId) {
        if !self.passes_filters(item) {
            self.tree.remove_from_group(item);
            return;
        }
        let root = self.tree.root();
        // Attention-demanding windows surface at top level regardless of
        // grouping.
        let bypass = self.tree.task(item).is_some_and(|t| t.demands_attention());
        match &mut self.grouping {
            Some(grouping) if !bypass => grouping.handle_item(&mut self.tree, item),
            _ => {
                self.tree.add_to_group(root, item);
            }
        }
    }

    fn passes_filters(&self, item: ItemId) -> bool {
        let Some(task) = self.tree.task(item) else {
            return false;
        };
        if task.is_startup() {
            // Startups are placeholders with no window state to filter on.
            return !self.settings.show_only_current_desktop
                || task.is_on_desktop(self.current_desktop);
        }
        let Some(info) = task.info() else {
            return false;
        };
        if !info.show_in_taskbar || info.window_type == WindowType::Utility {
            return false;
        }
        if task.demands_attention() {
            return true;
        }
        if self.settings.show_only_current_desktop && !task.is_on_desktop(self.current_desktop) {
            return false;
        }
        if self.settings.show_only_current_screen && !task.is_on_screen(self.current_screen) {
            return false;
        }
        if self.settings.show_only_minimized && !task.is_minimized() {
            return false;
        }
        true
    }

    /// Lets shrunk groups dissolve and slots items the pass added into
    /// sorted position.
    fn settle(&mut self, mark: usize) {
        for _ in 0..MAX_SETTLE_ROUNDS {
            let shrunk = self.tree.take_shrunk();
            if shrunk.is_empty() {
                break;
            }
            let Some(grouping) = &mut self.grouping else {
                continue;
            };
            for group in shrunk {
                if self.tree.is_group(group) {
                    grouping.check_group(&mut self.tree, group);
                }
            }
        }

        let Some(sorting) = &mut self.sorting else {
            return;
        };
        let added: Vec<ItemId> = self.tree.events()[mark..]
            .iter()
            .filter_map(|e| match e {
                GroupEvent::ItemAdded { item, .. } => Some(*item),
                _ => None,
            })
            .collect();
        for item in added {
            if self.tree.contains(item) {
                sorting.check(&mut self.tree, item);
            }
        }
    }

    // Strategy management.

    pub fn set_grouping_policy(&mut self, policy: GroupingPolicy) {
        if policy == self.grouping_policy && self.grouping.is_some() == self.strategy_active(policy)
        {
            return;
        }
        info!(%policy, "grouping policy");
        if let Some(mut old) = self.grouping.take() {
            old.teardown(&mut self.tree);
        }
        self.grouping_policy = policy;
        self.grouping = self.build_grouping(policy);
        self.reload();
    }

    /// Whether `policy` currently calls for a live strategy, taking the
    /// `only_group_when_full` threshold into account.
    fn strategy_active(&self, policy: GroupingPolicy) -> bool {
        match policy {
            GroupingPolicy::NoGrouping => false,
            GroupingPolicy::ManualGrouping => true,
            GroupingPolicy::ProgramGrouping => {
                !self.settings.only_group_when_full
                    || self.tasks.len() >= self.settings.group_full_limit
            }
        }
    }

    fn build_grouping(&self, policy: GroupingPolicy) -> Option<GroupingStrategyKind> {
        match policy {
            GroupingPolicy::NoGrouping => None,
            GroupingPolicy::ManualGrouping => {
                Some(GroupingStrategyKind::Manual(ManualGroupingStrategy::new()))
            }
            GroupingPolicy::ProgramGrouping => {
                if self.settings.only_group_when_full
                    && self.tasks.len() < self.settings.group_full_limit
                {
                    None
                } else {
                    Some(GroupingStrategyKind::Program(ProgramGroupingStrategy::new()))
                }
            }
        }
    }

    /// With `only_group_when_full`, program grouping switches on and off as
    /// the task count crosses the limit. The reported policy stays put.
    fn check_if_full(&mut self) {
        if self.grouping_policy != GroupingPolicy::ProgramGrouping
            || !self.settings.only_group_when_full
        {
            return;
        }
        let full = self.tasks.len() >= self.settings.group_full_limit;
        match (&self.grouping, full) {
            (None, true) => {
                debug!(limit = self.settings.group_full_limit, "taskbar full, grouping on");
                self.grouping =
                    Some(GroupingStrategyKind::Program(ProgramGroupingStrategy::new()));
                self.reload();
            }
            (Some(_), false) => {
                debug!("taskbar below limit, grouping off");
                if let Some(mut old) = self.grouping.take() {
                    old.teardown(&mut self.tree);
                }
                self.reload();
            }
            _ => {}
        }
    }

    pub fn set_sorting_policy(&mut self, policy: SortingPolicy) {
        if policy == self.sorting_policy {
            return;
        }
        info!(%policy, "sorting policy");
        self.sorting_policy = policy;
        self.sorting = match policy {
            SortingPolicy::NoSorting => None,
            SortingPolicy::ManualSorting => {
                Some(SortingStrategyKind::Manual(ManualSortingStrategy::new()))
            }
            SortingPolicy::AlphaSorting => {
                Some(SortingStrategyKind::Alpha(AlphaSortingStrategy::new()))
            }
        };
        if let Some(sorting) = &mut self.sorting {
            let root = self.tree.root();
            sorting.handle_group(&mut self.tree, root);
        }
        self.tree.emit(GroupEvent::Reload);
    }

    pub fn set_only_group_when_full(&mut self, only_when_full: bool) {
        if self.settings.only_group_when_full == only_when_full {
            return;
        }
        self.settings.only_group_when_full = only_when_full;
        self.check_if_full();
        if !only_when_full && self.grouping_policy == GroupingPolicy::ProgramGrouping
            && self.grouping.is_none()
        {
            self.grouping = self.build_grouping(self.grouping_policy);
            self.reload();
        }
    }

    pub fn set_full_limit(&mut self, limit: usize) {
        if self.settings.group_full_limit == limit {
            return;
        }
        self.settings.group_full_limit = limit;
        self.check_if_full();
    }

    pub fn update_settings(&mut self, settings: GroupManagerSettings) {
        let grouping = settings.grouping_strategy;
        let sorting = settings.sorting_strategy;
        self.settings = settings;
        self.set_grouping_policy(grouping);
        self.set_sorting_policy(sorting);
        self.check_if_full();
        self.reload();
    }

    // User-facing requests.

    /// Adds `item` to `group`, if the active strategy allows member edits.
    pub fn manual_grouping_request(&mut self, item: ItemId, group: ItemId) -> bool {
        let Some(grouping) = &mut self.grouping else {
            return false;
        };
        let mark = self.tree.events_len();
        let ok = grouping.add_item_to_group(&mut self.tree, item, group);
        self.settle(mark);
        ok
    }

    /// Creates a new group holding `items`.
    pub fn manual_grouping_request_list(&mut self, items: &[ItemId]) -> bool {
        let Some(grouping) = &mut self.grouping else {
            return false;
        };
        let mark = self.tree.events_len();
        let ok = grouping.group_items(&mut self.tree, items);
        self.settle(mark);
        ok
    }

    /// Repositions `item` within its group, if sorting is manual.
    pub fn manual_sorting_request(&mut self, item: ItemId, new_index: usize) -> bool {
        let Some(sorting) = &mut self.sorting else {
            return false;
        };
        sorting.move_item(&mut self.tree, item, new_index)
    }

    pub fn strategy_actions(&self, item: ItemId) -> Vec<StrategyAction> {
        self.grouping
            .as_ref()
            .map(|g| g.strategy_actions(&self.tree, item))
            .unwrap_or_default()
    }

    pub fn execute_strategy_action(&mut self, action: StrategyAction) -> bool {
        let Some(grouping) = &mut self.grouping else {
            return false;
        };
        let mark = self.tree.events_len();
        let ok = grouping.execute_action(&mut self.tree, action);
        self.settle(mark);
        ok
    }

    pub fn editable_group_properties(&self) -> EditableGroupProperties {
        self.grouping
            .as_ref()
            .map(|g| g.editable_group_properties())
            .unwrap_or_default()
    }

    pub fn name_suggestions(&self) -> Vec<String> {
        self.grouping.as_ref().map(|g| g.name_suggestions()).unwrap_or_default()
    }

    pub fn color_suggestions(&self) -> Vec<Color> {
        self.grouping.as_ref().map(|g| g.color_suggestions()).unwrap_or_default()
    }

    pub fn icon_suggestions(&self) -> Vec<Icon> {
        self.grouping.as_ref().map(|g| g.icon_suggestions()).unwrap_or_default()
    }

    pub fn set_group_name(&mut self, group: ItemId, name: String) -> bool {
        match &mut self.grouping {
            Some(g) => g.set_group_name(&mut self.tree, group, name),
            None => false,
        }
    }

    pub fn set_group_color(&mut self, group: ItemId, color: Color) -> bool {
        match &mut self.grouping {
            Some(g) => g.set_group_color(&mut self.tree, group, color),
            None => false,
        }
    }

    pub fn set_group_icon(&mut self, group: ItemId, icon: Icon) -> bool {
        match &mut self.grouping {
            Some(g) => g.set_group_icon(&mut self.tree, group, icon),
            None => false,
        }
    }

    // Screen handling.

    pub fn set_screen(&mut self, screen: i32) {
        if screen == self.current_screen {
            return;
        }
        self.current_screen = screen;
        if self.settings.show_only_current_screen {
            self.reload();
        }
    }

    /// Flushes batched geometry changes, re-filtering the affected windows.
    pub fn check_screen_change(&mut self) {
        let pending = std::mem::take(&mut self.geometry_pending);
        if pending.is_empty() {
            return;
        }
        let mark = self.tree.events_len();
        for id in pending {
            if let Some(item) = self.tasks.get(&id).copied() {
                self.place_item(item);
            }
        }
        self.settle(mark);
    }
}
