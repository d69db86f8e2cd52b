//! Sparse index for growable dimensions.
//!
//! A 4-level, 256-way radix tree of offset nodes. The key's bytes select
//! one slot per level, most significant byte first; leaf slots point at the
//! data block of one slice. Nodes and blocks are appended at end-of-file on
//! first use, so only written ranges occupy space.
//!
//! ```text
//! key = 0x00_01_11_70
//!        │  │  │  └── level 3 slot → data block
//!        │  │  └───── level 2 slot → leaf node
//!        │  └──────── level 1 slot → level 2 node
//!        └─────────── level 0 slot (root) → level 1 node
//! ```

use crate::error::{NefisError, Result};
use crate::file::BackingFile;
use crate::format::{NIL, TRIE_DEPTH, TRIE_FANOUT};
use tracing::trace;

/// Handle on one sparse index, identified by the offset of its root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseIndex {
    root: u64,
}

impl SparseIndex {
    /// Index whose root node lives at `root`.
    pub fn at(root: u64) -> Self {
        Self { root }
    }

    /// Offset of the root node.
    pub fn root(&self) -> u64 {
        self.root
    }

    fn slots(key: u64) -> Result<[usize; TRIE_DEPTH]> {
        let key = u32::try_from(key).map_err(|_| NefisError::IndexOutOfRange(key))?;
        Ok(key.to_be_bytes().map(usize::from))
    }

    fn slot_offset(file: &BackingFile, node: u64, slot: usize) -> u64 {
        node + (slot * file.version().offset_width()) as u64
    }

    /// Offset of the data block for `key`, if it was ever written.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::IndexOutOfRange`] for keys above `u32::MAX`.
    pub fn resolve(&self, file: &mut BackingFile, key: u64) -> Result<Option<u64>> {
        let mut node = self.root;
        for slot in Self::slots(key)? {
            let at = Self::slot_offset(file, node, slot);
            node = file.read_offset_at(at)?;
            if node == NIL {
                return Ok(None);
            }
        }
        Ok(Some(node))
    }

    /// Offset of the data block for `key`, allocating missing nodes and a
    /// zero-filled block of `block_bytes` on the way.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is out of range or the file cannot grow.
    pub fn resolve_or_create(
        &self,
        file: &mut BackingFile,
        key: u64,
        block_bytes: u64,
    ) -> Result<u64> {
        let mut node = self.root;
        for (level, slot) in Self::slots(key)?.into_iter().enumerate() {
            let at = Self::slot_offset(file, node, slot);
            let mut child = file.read_offset_at(at)?;
            if child == NIL {
                child = if level + 1 < TRIE_DEPTH {
                    let fresh = file.allocate(file.version().node_len() as u64)?;
                    file.write_node(fresh, &[NIL; TRIE_FANOUT])?;
                    fresh
                } else {
                    file.allocate_zeroed(block_bytes)?
                };
                file.write_offset_at(at, child)?;
                trace!(key, level, slot, offset = child, "extended sparse index");
            }
            node = child;
        }
        Ok(node)
    }

    /// Largest key ever written, 0 when the index is empty.
    ///
    /// Follows the highest set slot of each level, so it costs four node
    /// reads regardless of how many keys exist.
    pub fn max_index(&self, file: &mut BackingFile) -> Result<u64> {
        let mut node = self.root;
        let mut index = 0u64;
        for _ in 0..TRIE_DEPTH {
            let slots = file.read_node(node)?;
            let Some((slot, &child)) = slots.iter().enumerate().rev().find(|&(_, &p)| p != NIL)
            else {
                return Ok(index);
            };
            index = index * TRIE_FANOUT as u64 + slot as u64;
            node = child;
        }
        Ok(index)
    }
}
