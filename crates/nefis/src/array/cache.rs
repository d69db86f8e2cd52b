//! Metadata cache: memoized field layouts keyed by instance and field name.
//!
//! An unbalanced binary search tree stored in an arena. Insertion order is
//! access order, so the shape depends on the access pattern; entries are
//! never invalidated because definitions cannot change once written.

use crate::array::strided::FieldLayout;
use crate::format::MAX_NAME;
use std::cmp::Ordering;

#[derive(Debug)]
struct Node {
    key: String,
    layout: FieldLayout,
    left: Option<usize>,
    right: Option<usize>,
}

/// Binary search tree of resolved field layouts.
#[derive(Debug, Default)]
pub struct MetadataCache {
    nodes: Vec<Node>,
}

fn cache_key(instance: &str, field: &str) -> String {
    format!(
        "{:<width$}{:<width$}",
        instance.trim_end(),
        field.trim_end(),
        width = MAX_NAME
    )
}

impl MetadataCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached layouts.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    fn search(&self, key: &str) -> Result<usize, Option<(usize, Ordering)>> {
        let mut parent = None;
        let mut current = if self.nodes.is_empty() { None } else { Some(0) };
        while let Some(index) = current {
            let node = &self.nodes[index];
            match key.cmp(node.key.as_str()) {
                Ordering::Equal => return Ok(index),
                ordering @ Ordering::Less => {
                    parent = Some((index, ordering));
                    current = node.left;
                }
                ordering @ Ordering::Greater => {
                    parent = Some((index, ordering));
                    current = node.right;
                }
            }
        }
        Err(parent)
    }

    /// Cached layout of `field` in `instance`.
    pub fn find(&self, instance: &str, field: &str) -> Option<&FieldLayout> {
        let key = cache_key(instance, field);
        self.search(&key).ok().map(|index| &self.nodes[index].layout)
    }

    /// Caches a layout; an existing entry for the same key is kept.
    pub fn insert(&mut self, instance: &str, field: &str, layout: FieldLayout) {
        let key = cache_key(instance, field);
        let parent = match self.search(&key) {
            Ok(_) => return,
            Err(parent) => parent,
        };
        let index = self.nodes.len();
        self.nodes.push(Node {
            key,
            layout,
            left: None,
            right: None,
        });
        match parent {
            Some((p, Ordering::Less)) => self.nodes[p].left = Some(index),
            Some((p, _)) => self.nodes[p].right = Some(index),
            None => {}
        }
    }

    /// Height of the tree, 0 when empty.
    pub fn depth(&self) -> usize {
        fn height(nodes: &[Node], index: Option<usize>) -> usize {
            index.map_or(0, |i| {
                1 + height(nodes, nodes[i].left).max(height(nodes, nodes[i].right))
            })
        }
        height(&self.nodes, (!self.nodes.is_empty()).then_some(0))
    }
}
