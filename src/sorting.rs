pub mod alpha;
pub mod manual;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::model::tree::{ItemId, TaskTree};

pub use alpha::AlphaSortingStrategy;
pub use manual::ManualSortingStrategy;

/// Selects which sorting strategy the manager runs.
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
pub enum SortingPolicy {
    #[default]
    NoSorting,
    ManualSorting,
    AlphaSorting,
}

/// Keeps member lists in strategy order. `sort_items` is the pure core;
/// the provided methods apply it to live groups through bounded
/// [`TaskTree::move_item`] steps.
#[enum_dispatch]
pub trait SortingStrategy {
    fn policy(&self) -> SortingPolicy;

    /// Returns `items` in the order this strategy wants them displayed.
    fn sort_items(&self, tree: &TaskTree, items: &[ItemId]) -> Vec<ItemId>;

    /// Re-sorts one group and everything below it.
    fn handle_group(&mut self, tree: &mut TaskTree, group: ItemId) {
        let desired = self.sort_items(tree, tree.members(group));
        for (want, item) in desired.iter().enumerate() {
            let Some(cur) = tree.members(group).iter().position(|m| m == item) else {
                continue;
            };
            if cur != want {
                tree.move_item(group, cur, want);
            }
        }
        for member in tree.members(group).to_vec() {
            if tree.is_group(member) {
                self.handle_group(tree, member);
            }
        }
    }

    /// Slots one newly arrived item into place within its group.
    fn check(&mut self, tree: &mut TaskTree, item: ItemId) {
        let Some(parent) = tree.parent(item) else {
            return;
        };
        let desired = self.sort_items(tree, tree.members(parent));
        let Some(want) = desired.iter().position(|m| *m == item) else {
            return;
        };
        let Some(cur) = tree.members(parent).iter().position(|m| *m == item) else {
            return;
        };
        if cur != want {
            tree.move_item(parent, cur, want);
        }
    }

    fn desktop_changed(&mut self, _tree: &mut TaskTree, _new_desktop: i32) {}

    fn item_destroyed(&mut self, _item: ItemId) {}

    /// User-requested reposition; only meaningful for manual sorting.
    fn move_item(&mut self, _tree: &mut TaskTree, _item: ItemId, _new_index: usize) -> bool {
        false
    }
}

#[enum_dispatch(SortingStrategy)]
pub enum SortingStrategyKind {
    Alpha(AlphaSortingStrategy),
    Manual(ManualSortingStrategy),
}
