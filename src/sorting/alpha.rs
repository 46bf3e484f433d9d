//! Alphabetic ordering by program identity (group name for groups), using a
//! natural comparison so "task2" sorts before "task10".

use crate::common::util::natural_compare;
use crate::model::tree::{ItemId, TaskTree};
use crate::sorting::{SortingPolicy, SortingStrategy};

#[derive(Default)]
pub struct AlphaSortingStrategy;

impl AlphaSortingStrategy {
    pub fn new() -> Self {
        Self
    }

    fn sort_key(tree: &TaskTree, item: ItemId) -> String {
        if let Some(group) = tree.group(item) {
            return group.name().to_owned();
        }
        let Some(task) = tree.task(item) else {
            return String::new();
        };
        match task.program_identity() {
            Some(identity) if !identity.is_empty() => identity.to_owned(),
            // Startups have no window yet, so their title stands in.
            _ => task.name().to_owned(),
        }
    }
}

impl SortingStrategy for AlphaSortingStrategy {
    fn policy(&self) -> SortingPolicy {
        SortingPolicy::AlphaSorting
    }

    fn sort_items(&self, tree: &TaskTree, items: &[ItemId]) -> Vec<ItemId> {
        let mut sorted = items.to_vec();
        // Stable, so same-program windows keep their relative order.
        sorted.sort_by(|a, b| {
            natural_compare(&Self::sort_key(tree, *a), &Self::sort_key(tree, *b))
        });
        sorted
    }
}
