//! User-driven grouping. Group membership is whatever the user asked for,
//! and the layout of each desktop is remembered in a template tree so that
//! switching desktops and back restores the groups.

use tracing::{debug, trace};

use crate::common::collections::HashMap;
use crate::grouping::{
    EditableGroupProperties, GroupRegistry, GroupingPolicy, GroupingStrategy, StrategyAction,
};
use crate::model::item::{Color, Icon};
use crate::model::tree::{ItemId, TaskTree};

/// Remembered shape of one group on a hidden desktop. `group` points at the
/// live group while it is still alive; members are consumed as their items
/// reappear.
struct TemplateNode {
    group: Option<ItemId>,
    members: Vec<TemplateEntry>,
}

enum TemplateEntry {
    Task(ItemId),
    Group(TemplateNode),
}

impl TemplateNode {
    fn contains(&self, item: ItemId) -> bool {
        self.members.iter().any(|m| match m {
            TemplateEntry::Task(t) => *t == item,
            TemplateEntry::Group(n) => n.contains(item),
        })
    }

    /// Snapshots the subtree below `group`, protecting every group it keeps.
    /// Subtrees without any task are not worth remembering.
    fn snapshot(
        tree: &TaskTree,
        group: ItemId,
        protected: &mut HashMap<ItemId, usize>,
    ) -> Option<Self> {
        let members: Vec<TemplateEntry> = tree
            .members(group)
            .iter()
            .filter_map(|m| {
                if tree.is_group(*m) {
                    Self::snapshot(tree, *m, protected).map(TemplateEntry::Group)
                } else {
                    Some(TemplateEntry::Task(*m))
                }
            })
            .collect();
        if members.is_empty() {
            return None;
        }
        *protected.entry(group).or_insert(0) += 1;
        Some(Self { group: Some(group), members })
    }
}

pub struct ManualGroupingStrategy {
    registry: GroupRegistry,
    /// Template per hidden desktop, keyed by desktop number.
    templates: HashMap<i32, TemplateNode>,
    desktop: i32,
    /// Groups referenced by some template, with a reference count. A
    /// protected group survives becoming empty.
    protected: HashMap<ItemId, usize>,
}

impl Default for ManualGroupingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

fn unprotect(
    tree: &mut TaskTree,
    group: ItemId,
    protected: &mut HashMap<ItemId, usize>,
    registry: &mut GroupRegistry,
) {
    let Some(count) = protected.get_mut(&group) else {
        return;
    };
    *count -= 1;
    if *count > 0 {
        return;
    }
    protected.remove(&group);
    if registry.contains(group) && tree.members(group).is_empty() {
        registry.close_group(tree, group);
    }
}

fn unprotect_all(
    tree: &mut TaskTree,
    node: &TemplateNode,
    protected: &mut HashMap<ItemId, usize>,
    registry: &mut GroupRegistry,
) {
    for member in &node.members {
        if let TemplateEntry::Group(child) = member {
            unprotect_all(tree, child, protected, registry);
        }
    }
    if let Some(group) = node.group {
        unprotect(tree, group, protected, registry);
    }
}

/// Routes `item` back to its remembered place below `node`. Consumes the
/// matching template entry and revives dead groups along the path.
fn place(
    tree: &mut TaskTree,
    node: &mut TemplateNode,
    item: ItemId,
    protected: &mut HashMap<ItemId, usize>,
    registry: &mut GroupRegistry,
) -> bool {
    let direct = node
        .members
        .iter()
        .position(|m| matches!(m, TemplateEntry::Task(t) if *t == item));
    if let Some(idx) = direct {
        node.members.remove(idx);
        let target = node
            .group
            .filter(|g| tree.is_group(*g))
            .unwrap_or_else(|| tree.root());
        tree.add_to_group(target, item);
        return true;
    }

    let parent_live = node
        .group
        .filter(|g| tree.is_group(*g))
        .unwrap_or_else(|| tree.root());

    for i in 0..node.members.len() {
        let TemplateEntry::Group(child) = &node.members[i] else {
            continue;
        };
        if !child.contains(item) {
            continue;
        }
        let TemplateEntry::Group(child) = &mut node.members[i] else {
            unreachable!();
        };
        // The remembered group may have been closed while hidden.
        let placed = match child.group.filter(|g| tree.is_group(*g)) {
            Some(live) => {
                tree.add_to_group(parent_live, live);
                place(tree, child, item, protected, registry)
            }
            None => {
                child.group = None;
                let root = tree.root();
                tree.add_to_group(root, item);
                remove_task(child, item);
                true
            }
        };
        if child.members.is_empty() {
            if let Some(group) = child.group {
                unprotect(tree, group, protected, registry);
            }
            node.members.remove(i);
        }
        return placed;
    }
    false
}

fn remove_task(node: &mut TemplateNode, item: ItemId) {
    node.members.retain_mut(|m| match m {
        TemplateEntry::Task(t) => *t != item,
        TemplateEntry::Group(child) => {
            remove_task(child, item);
            true
        }
    });
}

impl ManualGroupingStrategy {
    pub fn new() -> Self {
        Self {
            registry: GroupRegistry::default(),
            templates: HashMap::default(),
            desktop: 1,
            protected: HashMap::default(),
        }
    }

    pub fn is_protected(&self, group: ItemId) -> bool {
        self.protected.contains_key(&group)
    }

    /// Prunes template nodes whose members are gone, releasing protection.
    fn prune(
        tree: &mut TaskTree,
        node: &mut TemplateNode,
        protected: &mut HashMap<ItemId, usize>,
        registry: &mut GroupRegistry,
    ) {
        let mut i = 0;
        while i < node.members.len() {
            if let TemplateEntry::Group(child) = &mut node.members[i] {
                Self::prune(tree, child, protected, registry);
                if child.members.is_empty() {
                    if let Some(group) = child.group {
                        unprotect(tree, group, protected, registry);
                    }
                    node.members.remove(i);
                    continue;
                }
            }
            i += 1;
        }
    }
}

impl GroupingStrategy for ManualGroupingStrategy {
    fn policy(&self) -> GroupingPolicy {
        GroupingPolicy::ManualGrouping
    }

    fn editable_group_properties(&self) -> EditableGroupProperties {
        EditableGroupProperties::all()
    }

    fn handle_item(&mut self, tree: &mut TaskTree, item: ItemId) {
        if let Some(template) = self.templates.get_mut(&self.desktop) {
            if template.contains(item) {
                trace!(?item, desktop = self.desktop, "restoring from template");
                let placed =
                    place(tree, template, item, &mut self.protected, &mut self.registry);
                if template.members.is_empty() {
                    let template = self.templates.remove(&self.desktop).unwrap();
                    unprotect_all(tree, &template, &mut self.protected, &mut self.registry);
                }
                if placed {
                    return;
                }
            }
        }
        // Already-placed items keep whatever spot the user gave them.
        if tree.parent(item).is_some() {
            return;
        }
        let root = tree.root();
        tree.add_to_group(root, item);
    }

    fn desktop_changed(&mut self, tree: &mut TaskTree, new_desktop: i32) {
        if new_desktop == self.desktop {
            return;
        }
        debug!(from = self.desktop, to = new_desktop, "snapshotting desktop layout");
        if let Some(stale) = self.templates.remove(&self.desktop) {
            unprotect_all(tree, &stale, &mut self.protected, &mut self.registry);
        }
        if let Some(snapshot) = TemplateNode::snapshot(tree, tree.root(), &mut self.protected) {
            self.templates.insert(self.desktop, snapshot);
        }
        self.desktop = new_desktop;
    }

    fn item_destroyed(&mut self, tree: &mut TaskTree, item: ItemId) {
        let desktops: Vec<i32> = self.templates.keys().copied().collect();
        for desktop in desktops {
            let Some(template) = self.templates.get_mut(&desktop) else {
                continue;
            };
            if !template.contains(item) {
                continue;
            }
            remove_task(template, item);
            let template = self.templates.get_mut(&desktop).unwrap();
            Self::prune(tree, template, &mut self.protected, &mut self.registry);
            if self.templates.get(&desktop).is_some_and(|t| t.members.is_empty()) {
                let template = self.templates.remove(&desktop).unwrap();
                unprotect_all(tree, &template, &mut self.protected, &mut self.registry);
            }
        }
    }

    fn check_group(&mut self, tree: &mut TaskTree, group: ItemId) {
        if !self.registry.contains(group) || !tree.members(group).is_empty() {
            return;
        }
        if self.protected.contains_key(&group) {
            // A template still references this group; it stays in place so
            // returning items find it where they left it.
            trace!(?group, "empty but protected");
            return;
        }
        self.registry.close_group(tree, group);
    }

    fn strategy_actions(&self, tree: &TaskTree, item: ItemId) -> Vec<StrategyAction> {
        let mut actions = Vec::new();
        if tree.parent(item).is_some_and(|p| p != tree.root()) {
            actions.push(StrategyAction::LeaveGroup(item));
        }
        if tree.is_group(item) && item != tree.root() {
            actions.push(StrategyAction::RemoveGroup(item));
        }
        actions
    }

    fn execute_action(&mut self, tree: &mut TaskTree, action: StrategyAction) -> bool {
        match action {
            StrategyAction::LeaveGroup(item) => {
                let Some(parent) = tree.parent(item) else {
                    return false;
                };
                if parent == tree.root() {
                    return false;
                }
                let target = tree.parent(parent).unwrap_or_else(|| tree.root());
                tree.add_to_group(target, item)
            }
            StrategyAction::RemoveGroup(group) => {
                if !self.registry.contains(group) {
                    return false;
                }
                self.registry.close_group(tree, group);
                true
            }
            StrategyAction::ToggleProgramGrouping(_) => false,
        }
    }

    fn group_items(&mut self, tree: &mut TaskTree, items: &[ItemId]) -> bool {
        if items.is_empty() {
            return false;
        }
        let group = self.registry.create_group(tree, items);
        let name = self.registry.name_suggestions().remove(0);
        self.registry.set_name(tree, group, name);
        let color = self.registry.color_suggestions()[0];
        self.registry.set_color(tree, group, color);
        let icon = self.registry.icon_suggestions().remove(0);
        self.registry.set_icon(tree, group, icon);
        true
    }

    fn name_suggestions(&self) -> Vec<String> {
        self.registry.name_suggestions()
    }

    fn color_suggestions(&self) -> Vec<Color> {
        self.registry.color_suggestions()
    }

    fn icon_suggestions(&self) -> Vec<Icon> {
        self.registry.icon_suggestions()
    }

    fn set_group_name(&mut self, tree: &mut TaskTree, group: ItemId, name: String) -> bool {
        if !self.registry.contains(group) {
            return false;
        }
        self.registry.set_name(tree, group, name)
    }

    fn set_group_color(&mut self, tree: &mut TaskTree, group: ItemId, color: Color) -> bool {
        if !self.registry.contains(group) {
            return false;
        }
        self.registry.set_color(tree, group, color);
        true
    }

    fn set_group_icon(&mut self, tree: &mut TaskTree, group: ItemId, icon: Icon) -> bool {
        if !self.registry.contains(group) {
            return false;
        }
        self.registry.set_icon(tree, group, icon);
        true
    }

    fn teardown(&mut self, tree: &mut TaskTree) {
        for (_, template) in std::mem::take(&mut self.templates) {
            unprotect_all(tree, &template, &mut self.protected, &mut self.registry);
        }
        self.protected.clear();
        self.registry.teardown(tree);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::item::{Color, TaskInfo, TaskItem, WindowId};

    fn task(tree: &mut TaskTree, n: u32) -> ItemId {
        let root = tree.root();
        let id = tree.insert_task(TaskItem::window(WindowId(n), TaskInfo {
            title: format!("win{n}"),
            ..TaskInfo::default()
        }));
        tree.add_to_group(root, id);
        id
    }

    #[test]
    fn group_items_names_and_colors_the_group() {
        let mut tree = TaskTree::new();
        let mut strategy = ManualGroupingStrategy::new();
        let a = task(&mut tree, 1);
        let b = task(&mut tree, 2);
        assert!(strategy.group_items(&mut tree, &[a, b]));
        let g = tree.parent(a).unwrap();
        assert_ne!(g, tree.root());
        assert_eq!(tree.parent(b), Some(g));
        assert_eq!(tree.name(g), "Group1");
        assert_eq!(tree.group(g).unwrap().color(), Color::BLUE);
    }

    #[test]
    fn template_restores_membership_after_round_trip() {
        let mut tree = TaskTree::new();
        let mut strategy = ManualGroupingStrategy::new();
        let a = task(&mut tree, 1);
        let b = task(&mut tree, 2);
        let c = task(&mut tree, 3);
        strategy.group_items(&mut tree, &[a, b]);
        let g = tree.parent(a).unwrap();

        // Leave for desktop 2: items vanish from the visible tree.
        strategy.desktop_changed(&mut tree, 2);
        for id in [a, b, c] {
            tree.remove_from_group(id);
        }
        strategy.check_group(&mut tree, g);
        assert!(tree.contains(g), "protected group must survive while empty");
        assert!(strategy.is_protected(g));

        // Coming back, the template routes items to their old places.
        strategy.desktop_changed(&mut tree, 1);
        for id in [a, b, c] {
            strategy.handle_item(&mut tree, id);
        }
        assert_eq!(tree.parent(a), Some(g));
        assert_eq!(tree.parent(b), Some(g));
        assert_eq!(tree.parent(c), Some(tree.root()));
        assert_eq!(tree.name(g), "Group1");
        assert!(!strategy.is_protected(g));
    }

    #[test]
    fn protected_empty_group_stays_attached_to_root() {
        let mut tree = TaskTree::new();
        let mut strategy = ManualGroupingStrategy::new();
        let a = task(&mut tree, 1);
        let b = task(&mut tree, 2);
        strategy.group_items(&mut tree, &[a, b]);
        let g = tree.parent(a).unwrap();

        strategy.desktop_changed(&mut tree, 2);
        tree.remove_from_group(a);
        tree.remove_from_group(b);
        strategy.check_group(&mut tree, g);
        assert_eq!(tree.parent(g), Some(tree.root()));
    }

    #[test]
    fn unprotected_empty_group_closes() {
        let mut tree = TaskTree::new();
        let mut strategy = ManualGroupingStrategy::new();
        let a = task(&mut tree, 1);
        let b = task(&mut tree, 2);
        strategy.group_items(&mut tree, &[a, b]);
        let g = tree.parent(a).unwrap();
        tree.remove_from_group(a);
        tree.remove_from_group(b);
        strategy.check_group(&mut tree, g);
        assert!(!tree.contains(g));
    }

    #[test]
    fn destroyed_item_is_purged_from_templates() {
        let mut tree = TaskTree::new();
        let mut strategy = ManualGroupingStrategy::new();
        let a = task(&mut tree, 1);
        let b = task(&mut tree, 2);
        strategy.group_items(&mut tree, &[a, b]);
        let g = tree.parent(a).unwrap();

        strategy.desktop_changed(&mut tree, 2);
        tree.remove_from_group(a);
        tree.remove_from_group(b);
        strategy.check_group(&mut tree, g);

        // Both group members close while we are away; the empty template
        // releases its protection and the group goes with it.
        for id in [a, b] {
            strategy.item_destroyed(&mut tree, id);
            tree.delete(id);
        }
        assert!(!strategy.is_protected(g));
        assert!(!tree.contains(g));
    }

    #[test]
    fn leave_group_moves_item_up() {
        let mut tree = TaskTree::new();
        let mut strategy = ManualGroupingStrategy::new();
        let a = task(&mut tree, 1);
        let b = task(&mut tree, 2);
        strategy.group_items(&mut tree, &[a, b]);
        let g = tree.parent(a).unwrap();

        let actions = strategy.strategy_actions(&tree, a);
        assert_eq!(actions, vec![StrategyAction::LeaveGroup(a)]);
        assert!(strategy.execute_action(&mut tree, StrategyAction::LeaveGroup(a)));
        assert_eq!(tree.parent(a), Some(tree.root()));
        assert_eq!(tree.parent(b), Some(g));
    }

    #[test]
    fn remove_group_dissolves_it() {
        let mut tree = TaskTree::new();
        let mut strategy = ManualGroupingStrategy::new();
        let a = task(&mut tree, 1);
        let b = task(&mut tree, 2);
        strategy.group_items(&mut tree, &[a, b]);
        let g = tree.parent(a).unwrap();

        let actions = strategy.strategy_actions(&tree, g);
        assert!(actions.contains(&StrategyAction::RemoveGroup(g)));
        assert!(strategy.execute_action(&mut tree, StrategyAction::RemoveGroup(g)));
        assert!(!tree.contains(g));
        assert_eq!(tree.parent(a), Some(tree.root()));
    }

    #[test]
    fn nested_groups_restore_nested() {
        let mut tree = TaskTree::new();
        let mut strategy = ManualGroupingStrategy::new();
        let a = task(&mut tree, 1);
        let b = task(&mut tree, 2);
        strategy.group_items(&mut tree, &[a, b]);
        let inner = tree.parent(a).unwrap();
        strategy.group_items(&mut tree, &[inner]);
        let outer = tree.parent(inner).unwrap();

        strategy.desktop_changed(&mut tree, 2);
        tree.remove_from_group(a);
        tree.remove_from_group(b);
        strategy.check_group(&mut tree, inner);
        strategy.check_group(&mut tree, outer);

        strategy.desktop_changed(&mut tree, 1);
        strategy.handle_item(&mut tree, a);
        strategy.handle_item(&mut tree, b);
        assert_eq!(tree.parent(a), Some(inner));
        assert_eq!(tree.parent(b), Some(inner));
        assert_eq!(tree.parent(inner), Some(outer));
        assert_eq!(tree.parent(outer), Some(tree.root()));
    }

    #[test]
    fn teardown_releases_everything() {
        let mut tree = TaskTree::new();
        let mut strategy = ManualGroupingStrategy::new();
        let a = task(&mut tree, 1);
        let b = task(&mut tree, 2);
        strategy.group_items(&mut tree, &[a, b]);
        let g = tree.parent(a).unwrap();
        strategy.desktop_changed(&mut tree, 2);
        strategy.teardown(&mut tree);
        assert!(!tree.contains(g));
        assert_eq!(tree.parent(a), Some(tree.root()));
        assert_eq!(tree.parent(b), Some(tree.root()));
    }
}
