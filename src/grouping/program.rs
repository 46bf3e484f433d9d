//! Groups windows of the same program together, creating a group as soon as
//! two windows share a program identity and dissolving it once it shrinks to
//! a single member.

use tracing::{debug, trace};

use crate::common::collections::{HashMap, HashSet};
use crate::grouping::{
    EditableGroupProperties, GroupRegistry, GroupingPolicy, GroupingStrategy, StrategyAction,
};
use crate::model::item::Color;
use crate::model::tree::{ItemId, TaskTree};

#[derive(Default)]
pub struct ProgramGroupingStrategy {
    registry: GroupRegistry,
    blacklist: HashSet<String>,
}

impl ProgramGroupingStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blacklisted(&self, identity: &str) -> bool {
        self.blacklist.contains(identity)
    }

    /// Program identity of an item; for a group, the identity of its first
    /// leaf descendant.
    fn class_of(tree: &TaskTree, item: ItemId) -> Option<String> {
        if tree.is_group(item) {
            let first = tree.members(item).first().copied()?;
            Self::class_of(tree, first)
        } else {
            tree.task(item)?.program_identity().map(str::to_owned)
        }
    }

    /// Tries to place `task` somewhere below `group`, preferring the deepest
    /// cluster of its program. Returns false when no fit was found at this
    /// level or below.
    fn program_grouping(&mut self, tree: &mut TaskTree, task: ItemId, group: ItemId) -> bool {
        // Prefer an existing subgroup of the same program deeper down.
        for member in tree.members(group).to_vec() {
            if tree.is_group(member) && self.program_grouping(tree, task, member) {
                return true;
            }
        }

        let Some(identity) = Self::class_of(tree, task) else {
            return false;
        };

        let mut by_identity: HashMap<String, Vec<ItemId>> = HashMap::default();
        for member in tree.members(group) {
            // The task itself may already sit here, e.g. during a reload.
            if tree.is_group(*member) || *member == task {
                continue;
            }
            let Some(task_item) = tree.task(*member) else {
                continue;
            };
            if let Some(id) = task_item.program_identity() {
                by_identity.entry(id.to_owned()).or_default().push(*member);
            }
        }

        let peers = by_identity.remove(&identity).unwrap_or_default();
        if peers.is_empty() {
            return false;
        }

        if group != tree.root() {
            // Below root only program clusters exist, so a peer means this
            // whole group is ours.
            trace!(%identity, "joining existing cluster");
            tree.add_to_group(group, task);
            return true;
        }

        debug!(%identity, peers = peers.len(), "clustering into a new subgroup");
        let mut items = peers;
        items.push(task);
        let subgroup = self.registry.create_group(tree, &items);
        tree.set_group_name(subgroup, identity);
        tree.set_group_color(subgroup, Color::RED);
        if let Some(icon) = tree.task(task).map(|t| t.icon().clone()) {
            tree.set_group_icon(subgroup, icon);
        }
        true
    }
}

impl GroupingStrategy for ProgramGroupingStrategy {
    fn policy(&self) -> GroupingPolicy {
        GroupingPolicy::ProgramGrouping
    }

    fn editable_group_properties(&self) -> EditableGroupProperties {
        EditableGroupProperties::empty()
    }

    fn handle_item(&mut self, tree: &mut TaskTree, item: ItemId) {
        let root = tree.root();
        if tree.is_group(item) {
            tree.add_to_group(root, item);
            return;
        }
        let blacklisted = Self::class_of(tree, item)
            .is_some_and(|identity| self.blacklist.contains(&identity));
        if blacklisted || !self.program_grouping(tree, item, root) {
            tree.add_to_group(root, item);
        }
    }

    fn check_group(&mut self, tree: &mut TaskTree, group: ItemId) {
        if self.registry.contains(group) && tree.members(group).len() <= 1 {
            self.registry.close_group(tree, group);
        }
    }

    fn strategy_actions(&self, tree: &TaskTree, item: ItemId) -> Vec<StrategyAction> {
        if Self::class_of(tree, item).is_some() {
            vec![StrategyAction::ToggleProgramGrouping(item)]
        } else {
            Vec::new()
        }
    }

    fn execute_action(&mut self, tree: &mut TaskTree, action: StrategyAction) -> bool {
        let StrategyAction::ToggleProgramGrouping(item) = action else {
            return false;
        };
        let Some(identity) = Self::class_of(tree, item) else {
            return false;
        };

        if self.blacklist.remove(&identity) {
            debug!(%identity, "program grouping re-enabled");
            if tree.is_group(item) {
                for member in tree.members(item).to_vec() {
                    self.handle_item(tree, member);
                }
            } else {
                self.handle_item(tree, item);
            }
        } else {
            debug!(%identity, "program grouping blacklisted");
            self.blacklist.insert(identity);
            if tree.is_group(item) {
                self.registry.close_group(tree, item);
            } else {
                let root = tree.root();
                tree.add_to_group(root, item);
            }
        }
        true
    }

    fn teardown(&mut self, tree: &mut TaskTree) {
        self.registry.teardown(tree);
    }
}
