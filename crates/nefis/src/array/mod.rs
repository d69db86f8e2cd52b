//! Array access: sparse index, strided planning and the layout cache.

pub mod cache;
pub mod strided;
pub mod trie;

pub use cache::MetadataCache;
pub use strided::{AccessPlan, Cell, FieldLayout, Selector};
pub use trie::SparseIndex;
