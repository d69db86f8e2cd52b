//! Hash directory: name to entry offset, one bucket table per catalog.
//!
//! Each bucket holds the offset of the newest entry that hashed to it; older
//! entries are reached through the `next` offset in each entry prefix.
//! Chains only grow at the head and are never reordered or compacted.

use crate::catalog::entry::{pad_name, read_prefix};
use crate::error::{NefisError, Result};
use crate::file::BackingFile;
use crate::format::{FileKind, BUCKETS_PER_CATALOG, MAX_NAME, NIL};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// The four name spaces of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Catalog {
    /// Field definitions.
    Field,
    /// Record definitions.
    Record,
    /// Table definitions.
    TableDef,
    /// Table instances.
    Instance,
}

impl Catalog {
    /// Index of this catalog's first bucket inside a file of `kind`.
    fn bucket_base(self, kind: FileKind) -> usize {
        match (self, kind) {
            (Catalog::Field, _) => 0,
            (Catalog::Record, _) => BUCKETS_PER_CATALOG,
            (Catalog::TableDef, _) => 2 * BUCKETS_PER_CATALOG,
            (Catalog::Instance, FileKind::Merged) => 3 * BUCKETS_PER_CATALOG,
            (Catalog::Instance, _) => 0,
        }
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Catalog::Field => "Field",
            Catalog::Record => "Record",
            Catalog::TableDef => "Table definition",
            Catalog::Instance => "Table instance",
        })
    }
}

/// Bucket of a space padded name.
///
/// The name is consumed in groups of four bytes; each group contributes the
/// product of `byte + 1` over its bytes.
pub fn hash_key(name: &[u8; MAX_NAME], buckets: usize) -> usize {
    let mut hash: u32 = 0;
    let mut group: u32 = 1;
    for (i, &c) in name.iter().enumerate() {
        group = group.wrapping_mul(u32::from(c) + 1);
        if i % 4 == 3 {
            hash = hash.wrapping_add(group);
            group = 1;
        }
    }
    hash as usize % buckets
}

/// One catalog's view of the hash table of a backing file.
pub struct Directory<'a> {
    file: &'a mut BackingFile,
    catalog: Catalog,
    base: usize,
}

impl<'a> Directory<'a> {
    /// Opens the directory of `catalog` inside `file`.
    pub fn new(file: &'a mut BackingFile, catalog: Catalog) -> Self {
        let base = catalog.bucket_base(file.header().kind);
        Self {
            file,
            catalog,
            base,
        }
    }

    /// The backing file.
    pub fn file(&mut self) -> &mut BackingFile {
        self.file
    }

    fn name_matches(&mut self, offset: u64, padded: &[u8; MAX_NAME]) -> Result<(bool, u64)> {
        let version = self.file.version();
        let mut prefix = vec![0u8; version.prefix_len()];
        self.file.read_at(offset, &mut prefix)?;
        let (next, _) = read_prefix(self.file.codec(), &prefix);
        let at = version.name_offset();
        Ok((&prefix[at..at + MAX_NAME] == padded, next))
    }

    /// Returns the offset of the entry named `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or if the chain cannot be read.
    pub fn lookup(&mut self, name: &str) -> Result<Option<u64>> {
        let padded = pad_name(name)?;
        let bucket = self.base + hash_key(&padded, BUCKETS_PER_CATALOG);
        let mut offset = self.file.bucket(bucket);
        let mut seen = HashSet::new();
        while offset != NIL && seen.insert(offset) {
            let (found, next) = self.name_matches(offset, &padded)?;
            if found {
                return Ok(Some(offset));
            }
            offset = next;
        }
        Ok(None)
    }

    /// Returns the offset of `name` or an undefined-reference error.
    pub fn require(&mut self, name: &str) -> Result<u64> {
        self.lookup(name)?.ok_or_else(|| NefisError::UndefinedName {
            catalog: self.catalog,
            name: name.trim_end().to_string(),
        })
    }

    /// Appends `entry` at the end of the file and links it as the head of
    /// its bucket. `zeroed_tail` further bytes are reserved after the entry
    /// and read as zero.
    ///
    /// The first offset of `entry` is overwritten with the old bucket head.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::DuplicateName`] if the name is already present;
    /// the catalog is left unchanged.
    pub fn insert(&mut self, name: &str, mut entry: Vec<u8>, zeroed_tail: u64) -> Result<u64> {
        let padded = pad_name(name)?;
        if self.lookup(name)?.is_some() {
            return Err(NefisError::DuplicateName {
                catalog: self.catalog,
                name: name.trim_end().to_string(),
            });
        }
        let bucket = self.base + hash_key(&padded, BUCKETS_PER_CATALOG);
        let head = self.file.bucket(bucket);
        let codec = self.file.codec();
        let width = codec.version().offset_width();
        codec.write_offset(&mut entry[..width], head);

        let total = (entry.len() as u64)
            .checked_add(zeroed_tail)
            .ok_or(NefisError::EofOverflow {
                eof: self.file.eof(),
                requested: zeroed_tail,
            })?;
        let offset = if zeroed_tail > 0 {
            self.file.allocate_zeroed(total)?
        } else {
            self.file.allocate(total)?
        };
        self.file.write_at(offset, &entry)?;
        self.file.set_bucket(bucket, offset);

        debug!(
            catalog = %self.catalog,
            name = name.trim_end(),
            offset,
            bucket = bucket - self.base,
            "inserted catalog entry"
        );
        Ok(offset)
    }

    /// Offsets of every entry of the catalog, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if a chain cannot be read.
    pub fn offsets(&mut self) -> Result<Vec<u64>> {
        let heads: Vec<u64> = self
            .file
            .buckets(self.base..self.base + BUCKETS_PER_CATALOG)
            .iter()
            .copied()
            .filter(|&head| head != NIL)
            .collect();
        let version = self.file.version();
        let codec = self.file.codec();
        let mut prefix = vec![0u8; version.prefix_len()];
        let mut seen = HashSet::new();
        for head in heads {
            let mut offset = head;
            while offset != NIL && seen.insert(offset) {
                self.file.read_at(offset, &mut prefix)?;
                offset = read_prefix(codec, &prefix).0;
            }
        }
        let mut offsets: Vec<u64> = seen.into_iter().collect();
        offsets.sort_unstable();
        Ok(offsets)
    }
}
