pub mod manual;
pub mod program;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::item::{Color, Icon};
use crate::model::tree::{ItemId, TaskTree};

pub use manual::ManualGroupingStrategy;
pub use program::ProgramGroupingStrategy;

bitflags::bitflags! {
    /// Which group properties the active strategy lets the user edit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EditableGroupProperties: u8 {
        const NAME = 1 << 0;
        const COLOR = 1 << 1;
        const ICON = 1 << 2;
        const MEMBERS = 1 << 3;
    }
}

/// Selects which grouping strategy the manager runs.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupingPolicy {
    #[default]
    NoGrouping,
    ManualGrouping,
    ProgramGrouping,
}

/// A single user-facing grouping operation offered for an item, e.g. in a
/// context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyAction {
    /// Detach the item from its group, back to the group's parent.
    LeaveGroup(ItemId),
    /// Dissolve the group, reparenting its members.
    RemoveGroup(ItemId),
    /// Blacklist or un-blacklist the item's program from automatic grouping.
    ToggleProgramGrouping(ItemId),
}

/// Strategy interface the manager drives. Strategies own group lifetime:
/// they create groups, route items into them and decide when a shrunken
/// group should be dissolved.
#[enum_dispatch]
pub trait GroupingStrategy {
    fn policy(&self) -> GroupingPolicy;

    fn editable_group_properties(&self) -> EditableGroupProperties;

    /// Routes a newly eligible item into the tree.
    fn handle_item(&mut self, tree: &mut TaskTree, item: ItemId);

    fn desktop_changed(&mut self, _tree: &mut TaskTree, _new_desktop: i32) {}

    fn item_destroyed(&mut self, _tree: &mut TaskTree, _item: ItemId) {}

    /// Called after a group lost a member, so the strategy can dissolve it.
    fn check_group(&mut self, _tree: &mut TaskTree, _group: ItemId) {}

    fn add_item_to_group(&mut self, tree: &mut TaskTree, item: ItemId, group: ItemId) -> bool {
        if !self.editable_group_properties().contains(EditableGroupProperties::MEMBERS) {
            return false;
        }
        tree.add_to_group(group, item)
    }

    fn strategy_actions(&self, _tree: &TaskTree, _item: ItemId) -> Vec<StrategyAction> {
        Vec::new()
    }

    fn execute_action(&mut self, _tree: &mut TaskTree, _action: StrategyAction) -> bool {
        false
    }

    /// Creates a new group from a list of items, if the strategy allows it.
    fn group_items(&mut self, _tree: &mut TaskTree, _items: &[ItemId]) -> bool {
        false
    }

    fn name_suggestions(&self) -> Vec<String> {
        Vec::new()
    }

    fn color_suggestions(&self) -> Vec<Color> {
        Vec::new()
    }

    fn icon_suggestions(&self) -> Vec<Icon> {
        Vec::new()
    }

    fn set_group_name(&mut self, _tree: &mut TaskTree, _group: ItemId, _name: String) -> bool {
        false
    }

    fn set_group_color(&mut self, _tree: &mut TaskTree, _group: ItemId, _color: Color) -> bool {
        false
    }

    fn set_group_icon(&mut self, _tree: &mut TaskTree, _group: ItemId, _icon: Icon) -> bool {
        false
    }

    /// Dissolves everything the strategy created, ahead of a strategy swap.
    fn teardown(&mut self, tree: &mut TaskTree);
}

#[enum_dispatch(GroupingStrategy)]
pub enum GroupingStrategyKind {
    Program(ProgramGroupingStrategy),
    Manual(ManualGroupingStrategy),
}

/// Bookkeeping shared by all strategies: which groups a strategy created,
/// plus the name and color pools that keep suggestions unique.
#[derive(Default)]
pub(crate) struct GroupRegistry {
    created: Vec<ItemId>,
    used_names: Vec<String>,
    used_colors: Vec<Color>,
}

impl GroupRegistry {
    pub(crate) fn contains(&self, group: ItemId) -> bool {
        self.created.contains(&group)
    }

    /// Creates an empty group next to the first item (same parent, root if
    /// none) and moves all items into it.
    pub(crate) fn create_group(&mut self, tree: &mut TaskTree, items: &[ItemId]) -> ItemId {
        let parent = items
            .first()
            .and_then(|i| tree.parent(*i))
            .unwrap_or_else(|| tree.root());
        let group = tree.insert_group(String::new(), Color::TRANSPARENT, Icon::default());
        tree.add_to_group(parent, group);
        for item in items {
            tree.add_to_group(group, *item);
        }
        self.created.push(group);
        group
    }

    /// Dissolves `group`: members go to the group's parent (root if it had
    /// none), the name and color return to their pools, and the group is
    /// deleted from the tree.
    pub(crate) fn close_group(&mut self, tree: &mut TaskTree, group: ItemId) {
        if group == tree.root() || !tree.is_group(group) {
            return;
        }
        debug!(name = tree.name(group), "closing group");
        let target = tree.parent(group).unwrap_or_else(|| tree.root());
        let members: Vec<ItemId> = tree.members(group).to_vec();
        for member in members {
            tree.add_to_group(target, member);
        }
        if let Some(g) = tree.group(group) {
            let name = g.name().to_owned();
            let color = g.color();
            self.used_names.retain(|n| *n != name);
            self.used_colors.retain(|c| *c != color);
        }
        self.created.retain(|g| *g != group);
        tree.delete(group);
    }

    /// Unused default names, "Group1" upward.
    pub(crate) fn name_suggestions(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut i = 1u32;
        while out.len() < 6 {
            let candidate = format!("Group{i}");
            if !self.used_names.contains(&candidate) {
                out.push(candidate);
            }
            i += 1;
        }
        out
    }

    /// Unused colors from a small palette, falling back to red.
    pub(crate) fn color_suggestions(&self) -> Vec<Color> {
        let palette = [Color::BLUE, Color::GREEN, Color::YELLOW];
        let free: Vec<Color> =
            palette.iter().copied().filter(|c| !self.used_colors.contains(c)).collect();
        if free.is_empty() { vec![Color::RED] } else { free }
    }

    pub(crate) fn icon_suggestions(&self) -> Vec<Icon> {
        vec![Icon::named("xorg")]
    }

    /// Renames a created group, refusing names already in use.
    pub(crate) fn set_name(&mut self, tree: &mut TaskTree, group: ItemId, name: String) -> bool {
        if self.used_names.contains(&name) {
            return false;
        }
        if let Some(g) = tree.group(group) {
            let old = g.name().to_owned();
            self.used_names.retain(|n| *n != old);
        }
        self.used_names.push(name.clone());
        tree.set_group_name(group, name);
        true
    }

    pub(crate) fn set_color(&mut self, tree: &mut TaskTree, group: ItemId, color: Color) {
        if let Some(g) = tree.group(group) {
            let old = g.color();
            self.used_colors.retain(|c| *c != old);
        }
        self.used_colors.push(color);
        tree.set_group_color(group, color);
    }

    pub(crate) fn set_icon(&mut self, tree: &mut TaskTree, group: ItemId, icon: Icon) {
        tree.set_group_icon(group, icon);
    }

    pub(crate) fn teardown(&mut self, tree: &mut TaskTree) {
        for group in std::mem::take(&mut self.created) {
            if group == tree.root() || !tree.is_group(group) {
                continue;
            }
            let target = tree.parent(group).unwrap_or_else(|| tree.root());
            for member in tree.members(group).to_vec() {
                tree.add_to_group(target, member);
            }
            tree.delete(group);
        }
        self.used_names.clear();
        self.used_colors.clear();
    }
}
