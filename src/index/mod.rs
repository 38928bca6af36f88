pub mod sorted;

pub use sorted::{CompareFn, SortedIndex, GROW_BLOCK};
