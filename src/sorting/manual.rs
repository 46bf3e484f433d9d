//! User-driven ordering. Positions the user chose are remembered per
//! desktop, so switching desktops and back restores the arrangement.

use tracing::{debug, trace};

use crate::common::collections::HashMap;
use crate::model::tree::{ItemId, TaskTree};
use crate::sorting::{SortingPolicy, SortingStrategy};

pub struct ManualSortingStrategy {
    desktop: i32,
    /// Remembered index of each item within its group, keyed by desktop.
    positions: HashMap<i32, HashMap<ItemId, usize>>,
}

impl Default for ManualSortingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualSortingStrategy {
    pub fn new() -> Self {
        Self { desktop: 1, positions: HashMap::default() }
    }

    fn current(&mut self) -> &mut HashMap<ItemId, usize> {
        self.positions.entry(self.desktop).or_default()
    }

    fn record_group(&mut self, tree: &TaskTree, group: ItemId) {
        let members: Vec<ItemId> = tree.members(group).to_vec();
        let table = self.current();
        for (index, member) in members.iter().enumerate() {
            table.insert(*member, index);
        }
    }

    fn record_tree(table: &mut HashMap<ItemId, usize>, tree: &TaskTree, group: ItemId) {
        for (index, member) in tree.members(group).iter().enumerate() {
            table.insert(*member, index);
            if tree.is_group(*member) {
                Self::record_tree(table, tree, *member);
            }
        }
    }
}

impl SortingStrategy for ManualSortingStrategy {
    fn policy(&self) -> SortingPolicy {
        SortingPolicy::ManualSorting
    }

    /// Remembered items first, in remembered order; newcomers keep their
    /// arrival order at the end.
    fn sort_items(&self, _tree: &TaskTree, items: &[ItemId]) -> Vec<ItemId> {
        let table = self.positions.get(&self.desktop);
        let position = |item: &ItemId| table.and_then(|t| t.get(item)).copied();

        let mut remembered: Vec<ItemId> =
            items.iter().copied().filter(|i| position(i).is_some()).collect();
        remembered.sort_by_key(|i| position(i));
        let newcomers = items.iter().copied().filter(|i| position(i).is_none());
        remembered.extend(newcomers);
        remembered
    }

    fn desktop_changed(&mut self, tree: &mut TaskTree, new_desktop: i32) {
        if new_desktop == self.desktop {
            return;
        }
        trace!(from = self.desktop, to = new_desktop, "remembering positions");
        let mut table = HashMap::default();
        Self::record_tree(&mut table, tree, tree.root());
        self.positions.insert(self.desktop, table);
        self.desktop = new_desktop;
    }

    fn item_destroyed(&mut self, item: ItemId) {
        for table in self.positions.values_mut() {
            table.remove(&item);
        }
    }

    fn move_item(&mut self, tree: &mut TaskTree, item: ItemId, new_index: usize) -> bool {
        let Some(parent) = tree.parent(item) else {
            return false;
        };
        let Some(cur) = tree.members(parent).iter().position(|m| *m == item) else {
            return false;
        };
        if !tree.move_item(parent, cur, new_index) {
            return false;
        }
        debug!(?item, new_index, "position pinned");
        self.record_group(tree, parent);
        true
    }
}
