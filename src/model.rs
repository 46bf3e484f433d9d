pub mod item;
pub mod tree;
