use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::model::item::{Color, Icon, TaskChanges, TaskItem, WindowActions};

slotmap::new_key_type! {
    /// Key of a [`GroupableItem`] in the [`TaskTree`] arena.
    pub struct ItemId;
}

/// Either a leaf task or a composite group. Groups own their children as
/// ordered lists of arena keys; the parent link is a plain back-reference,
/// so there are no ownership cycles.
#[derive(Debug)]
pub enum GroupableItem {
    Task(TaskItem),
    Group(TaskGroup),
}

impl GroupableItem {
    pub fn is_group(&self) -> bool {
        matches!(self, GroupableItem::Group(_))
    }

    pub fn as_task(&self) -> Option<&TaskItem> {
        match self {
            GroupableItem::Task(t) => Some(t),
            GroupableItem::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&TaskGroup> {
        match self {
            GroupableItem::Task(_) => None,
            GroupableItem::Group(g) => Some(g),
        }
    }
}

/// Composite node: an ordered member list plus display identity. Member
/// order is the display order.
#[derive(Debug)]
pub struct TaskGroup {
    name: String,
    color: Color,
    icon: Icon,
    members: Vec<ItemId>,
}

impl TaskGroup {
    fn new(name: String, color: Color, icon: Icon) -> Self {
        Self { name, color, icon, members: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn icon(&self) -> &Icon {
        &self.icon
    }

    pub fn members(&self) -> &[ItemId] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Change notification surfaced to the consumer. Listening on the manager's
/// queue observes changes at any depth of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEvent {
    ItemAdded { group: ItemId, item: ItemId },
    ItemRemoved { group: ItemId, item: ItemId },
    ItemMoved { group: ItemId, item: ItemId },
    ItemChanged { item: ItemId, changes: TaskChanges },
    Reload,
}

struct Entry {
    parent: Option<ItemId>,
    item: GroupableItem,
}

/// Arena holding the whole forest of groups and tasks, with one always-alive
/// root group. All structural mutation goes through this type so the
/// at-most-one-parent invariant is enforced in exactly one place.
pub struct TaskTree {
    entries: SlotMap<ItemId, Entry>,
    root: ItemId,
    events: Vec<GroupEvent>,
    /// Groups that lost a member since the last [`Self::take_shrunk`] call.
    shrunk: Vec<ItemId>,
}

impl Default for TaskTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTree {
    pub fn new() -> Self {
        let mut entries = SlotMap::with_key();
        let root = entries.insert(Entry {
            parent: None,
            item: GroupableItem::Group(TaskGroup::new(
                "root".to_owned(),
                Color::TRANSPARENT,
                Icon::default(),
            )),
        });
        Self { entries, root, events: Vec::new(), shrunk: Vec::new() }
    }

    pub fn root(&self) -> ItemId {
        self.root
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: ItemId) -> Option<&GroupableItem> {
        self.entries.get(id).map(|e| &e.item)
    }

    pub fn is_group(&self, id: ItemId) -> bool {
        self.get(id).is_some_and(|i| i.is_group())
    }

    pub fn task(&self, id: ItemId) -> Option<&TaskItem> {
        self.get(id).and_then(|i| i.as_task())
    }

    pub fn task_mut(&mut self, id: ItemId) -> Option<&mut TaskItem> {
        match self.entries.get_mut(id).map(|e| &mut e.item) {
            Some(GroupableItem::Task(t)) => Some(t),
            _ => None,
        }
    }

    pub fn group(&self, id: ItemId) -> Option<&TaskGroup> {
        self.get(id).and_then(|i| i.as_group())
    }

    fn group_mut(&mut self, id: ItemId) -> Option<&mut TaskGroup> {
        match self.entries.get_mut(id).map(|e| &mut e.item) {
            Some(GroupableItem::Group(g)) => Some(g),
            _ => None,
        }
    }

    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.entries.get(id).and_then(|e| e.parent)
    }

    /// Inserts a detached leaf. It is not visible until added to a group.
    pub fn insert_task(&mut self, task: TaskItem) -> ItemId {
        self.entries.insert(Entry { parent: None, item: GroupableItem::Task(task) })
    }

    /// Inserts a detached, empty group.
    pub fn insert_group(&mut self, name: String, color: Color, icon: Icon) -> ItemId {
        debug!(%name, "group created");
        self.entries
            .insert(Entry { parent: None, item: GroupableItem::Group(TaskGroup::new(name, color, icon)) })
    }

    pub fn members(&self, group: ItemId) -> &[ItemId] {
        self.group(group).map(|g| g.members()).unwrap_or(&[])
    }

    /// Reparents `item` to the end of `group`. A no-op (returning false) if
    /// `item` is already a direct member, and a refused request if it would
    /// create a cycle or either id is stale.
    pub fn add_to_group(&mut self, group: ItemId, item: ItemId) -> bool {
        if group == item || !self.is_group(group) || !self.contains(item) {
            return false;
        }
        if self.has_direct_member(group, item) {
            trace!(?item, ?group, "already a member");
            return false;
        }
        // Reject adding an ancestor below its own descendant.
        if self.is_group(item) && self.has_member(item, group) {
            debug!(?item, ?group, "refusing cyclic reparent");
            return false;
        }

        self.detach(item);
        if let Some(g) = self.group_mut(group) {
            g.members.push(item);
        }
        if let Some(e) = self.entries.get_mut(item) {
            e.parent = Some(group);
        }
        self.events.push(GroupEvent::ItemAdded { group, item });
        true
    }

    /// Detaches `item` from its parent, emitting `ItemRemoved`. The item
    /// stays alive in the arena.
    pub fn remove_from_group(&mut self, item: ItemId) -> bool {
        self.detach(item)
    }

    fn detach(&mut self, item: ItemId) -> bool {
        let Some(parent) = self.parent(item) else {
            return false;
        };
        if let Some(g) = self.group_mut(parent) {
            g.members.retain(|m| *m != item);
        }
        if let Some(e) = self.entries.get_mut(item) {
            e.parent = None;
        }
        self.events.push(GroupEvent::ItemRemoved { group: parent, item });
        self.shrunk.push(parent);
        true
    }

    /// Deletes a detached item from the arena. Groups must be emptied first.
    pub fn delete(&mut self, item: ItemId) {
        if item == self.root {
            return;
        }
        self.detach(item);
        if let Some(g) = self.group(item) {
            debug_assert!(g.is_empty(), "deleting a non-empty group");
        }
        self.entries.remove(item);
    }

    /// Reorders within one group. Fails on out-of-range indices.
    pub fn move_item(&mut self, group: ItemId, old_index: usize, new_index: usize) -> bool {
        let Some(g) = self.group_mut(group) else {
            return false;
        };
        if old_index >= g.members.len() || new_index >= g.members.len() {
            debug!(old_index, new_index, "move_item index out of bounds");
            return false;
        }
        let item = g.members.remove(old_index);
        g.members.insert(new_index, item);
        self.events.push(GroupEvent::ItemMoved { group, item });
        true
    }

    pub fn has_direct_member(&self, group: ItemId, item: ItemId) -> bool {
        self.parent(item) == Some(group)
    }

    /// Deep containment test, walking the parent chain up from `item`.
    pub fn has_member(&self, group: ItemId, item: ItemId) -> bool {
        let mut cur = self.parent(item);
        while let Some(p) = cur {
            if p == group {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    /// The direct member of `group` that contains (or is) `item`.
    pub fn direct_member(&self, group: ItemId, item: ItemId) -> Option<ItemId> {
        let mut cur = item;
        loop {
            match self.parent(cur) {
                Some(p) if p == group => return Some(cur),
                Some(p) => cur = p,
                None => return None,
            }
        }
    }

    pub fn set_group_name(&mut self, group: ItemId, name: String) {
        if let Some(g) = self.group_mut(group) {
            g.name = name;
            self.events.push(GroupEvent::ItemChanged { item: group, changes: TaskChanges::NAME });
        }
    }

    pub fn set_group_color(&mut self, group: ItemId, color: Color) {
        if let Some(g) = self.group_mut(group) {
            g.color = color;
            self.events.push(GroupEvent::ItemChanged { item: group, changes: TaskChanges::STATE });
        }
    }

    pub fn set_group_icon(&mut self, group: ItemId, icon: Icon) {
        if let Some(g) = self.group_mut(group) {
            g.icon = icon;
            self.events.push(GroupEvent::ItemChanged { item: group, changes: TaskChanges::ICON });
        }
    }

    pub fn name(&self, id: ItemId) -> &str {
        match self.get(id) {
            Some(GroupableItem::Task(t)) => t.name(),
            Some(GroupableItem::Group(g)) => g.name(),
            None => "",
        }
    }

    // Aggregate predicates. Boolean "is X" over a group uses AND semantics,
    // except is_active and demands_attention which use OR: a group is active
    // when anything in it is, but only "presents as maximized" when
    // everything in it does.

    fn all(&self, id: ItemId, pred: &dyn Fn(&TaskItem) -> bool) -> bool {
        match self.get(id) {
            Some(GroupableItem::Task(t)) => pred(t),
            Some(GroupableItem::Group(g)) => {
                g.members().iter().all(|m| self.all(*m, pred))
            }
            None => false,
        }
    }

    fn any(&self, id: ItemId, pred: &dyn Fn(&TaskItem) -> bool) -> bool {
        match self.get(id) {
            Some(GroupableItem::Task(t)) => pred(t),
            Some(GroupableItem::Group(g)) => {
                g.members().iter().any(|m| self.any(*m, pred))
            }
            None => false,
        }
    }

    pub fn is_minimized(&self, id: ItemId) -> bool {
        self.all(id, &|t| t.is_minimized())
    }

    pub fn is_maximized(&self, id: ItemId) -> bool {
        self.all(id, &|t| t.is_maximized())
    }

    pub fn is_shaded(&self, id: ItemId) -> bool {
        self.all(id, &|t| t.is_shaded())
    }

    pub fn is_full_screen(&self, id: ItemId) -> bool {
        self.all(id, &|t| t.is_full_screen())
    }

    pub fn is_kept_below(&self, id: ItemId) -> bool {
        self.all(id, &|t| t.is_kept_below())
    }

    pub fn is_always_on_top(&self, id: ItemId) -> bool {
        self.all(id, &|t| t.is_always_on_top())
    }

    pub fn is_on_all_desktops(&self, id: ItemId) -> bool {
        self.all(id, &|t| t.is_on_all_desktops())
    }

    pub fn is_on_desktop(&self, id: ItemId, desktop: i32) -> bool {
        self.all(id, &|t| t.is_on_desktop(desktop))
    }

    pub fn is_active(&self, id: ItemId) -> bool {
        self.any(id, &|t| t.is_active())
    }

    pub fn demands_attention(&self, id: ItemId) -> bool {
        self.any(id, &|t| t.demands_attention())
    }

    pub fn supports_action(&self, id: ItemId, action: WindowActions) -> bool {
        self.all(id, &|t| t.supports_action(action))
    }

    /// Common desktop of all members, or 0 when they disagree (or the group
    /// is empty).
    pub fn desktop(&self, id: ItemId) -> i32 {
        match self.get(id) {
            Some(GroupableItem::Task(t)) => t.desktop(),
            Some(GroupableItem::Group(g)) => {
                let mut common = None;
                for m in g.members() {
                    let d = self.desktop(*m);
                    match common {
                        None => common = Some(d),
                        Some(c) if c == d => {}
                        Some(_) => return 0,
                    }
                }
                common.unwrap_or(0)
            }
            None => 0,
        }
    }

    pub(crate) fn emit(&mut self, event: GroupEvent) {
        self.events.push(event);
    }

    pub(crate) fn events(&self) -> &[GroupEvent] {
        &self.events
    }

    pub(crate) fn events_len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn take_events(&mut self) -> Vec<GroupEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn take_shrunk(&mut self) -> Vec<ItemId> {
        std::mem::take(&mut self.shrunk)
    }

    /// Renders the tree below `id` for debugging.
    pub fn draw_tree(&self, id: ItemId) -> String {
        let mut out = String::new();
        if let Some(node) = self.ascii_node(id) {
            let _ = ascii_tree::write_tree(&mut out, &node);
        }
        out
    }

    fn ascii_node(&self, id: ItemId) -> Option<ascii_tree::Tree> {
        match self.get(id)? {
            GroupableItem::Task(t) => {
                Some(ascii_tree::Tree::Leaf(vec![t.name().to_owned()]))
            }
            GroupableItem::Group(g) => {
                let children =
                    g.members().iter().filter_map(|m| self.ascii_node(*m)).collect();
                Some(ascii_tree::Tree::Node(g.name().to_owned(), children))
            }
        }
    }
}
