//! On-disk geometry shared by both format versions.
//!
//! Every catalog entry starts with the same prefix:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────┬──────────────┐
//! │ next offset  │ rest length  │ kind tag │ name (16 B)  │
//! │ (8 B / 4 B)  │ (8 B / 4 B)  │ (8 / 4)  │ space padded │
//! └──────────────┴──────────────┴──────────┴──────────────┘
//! ```
//!
//! The current format stores offsets as 64-bit integers, the legacy format
//! as 32-bit integers. All other sub-fields have the same width in both.

/// Maximum length of a name, space padded on disk.
pub const MAX_NAME: usize = 16;

/// Width of the element type tag.
pub const MAX_TYPE: usize = 8;

/// Width of a field description.
pub const MAX_DESC: usize = 64;

/// Maximum number of dimensions of a field or table definition.
pub const MAX_DIM: usize = 5;

/// Field sizes are rounded up to this quantum inside a record.
pub const ALIGNMENT: u64 = 4;

/// Number of hash buckets of every catalog.
pub const BUCKETS_PER_CATALOG: usize = 997;

/// Attribute slots per kind on a table instance.
pub const MAX_ATTRIBUTES: usize = 5;

/// In-memory representation of an unset offset.
pub const NIL: u64 = u64::MAX;

/// Slots per sparse index node.
pub const TRIE_FANOUT: usize = 256;

/// Sparse index depth.
pub const TRIE_DEPTH: usize = 4;

/// On-disk format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatVersion {
    /// Version 4 and older: 32-bit offsets.
    Legacy,
    /// Version 5: 64-bit offsets.
    #[default]
    Current,
}

impl FormatVersion {
    /// Bytes per stored offset.
    pub const fn offset_width(self) -> usize {
        match self {
            FormatVersion::Legacy => 4,
            FormatVersion::Current => 8,
        }
    }

    /// Bytes of the kind tag in the entry prefix.
    pub const fn tag_width(self) -> usize {
        match self {
            FormatVersion::Legacy => 4,
            FormatVersion::Current => 8,
        }
    }

    /// Length of the common entry prefix; the name starts at `prefix_len - MAX_NAME`.
    pub const fn prefix_len(self) -> usize {
        2 * self.offset_width() + self.tag_width() + MAX_NAME
    }

    /// Byte offset of the name inside an entry.
    pub const fn name_offset(self) -> usize {
        self.prefix_len() - MAX_NAME
    }

    /// Length of a field entry.
    pub const fn field_entry_len(self) -> usize {
        // type, total bytes, single bytes, quantity, unit, description, ndim, dims
        self.prefix_len()
            + MAX_TYPE
            + self.offset_width()
            + 4
            + 2 * MAX_NAME
            + MAX_DESC
            + 4
            + 4 * MAX_DIM
    }

    /// Length of a record entry naming `fields` fields.
    pub const fn record_entry_len(self, fields: usize) -> usize {
        self.prefix_len() + self.offset_width() + 4 + MAX_NAME * fields
    }

    /// Length of a table definition entry.
    pub const fn table_def_entry_len(self) -> usize {
        self.prefix_len() + MAX_NAME + 4 + 2 * 4 * MAX_DIM
    }

    /// Length of a table instance entry, excluding its data or pointer region.
    pub const fn instance_entry_len(self) -> usize {
        // table definition name, then int, real and string attribute blocks
        self.prefix_len()
            + MAX_NAME
            + MAX_ATTRIBUTES * (MAX_NAME + 4)
            + MAX_ATTRIBUTES * (MAX_NAME + 4)
            + MAX_ATTRIBUTES * (MAX_NAME + MAX_NAME)
    }

    /// Bytes of one sparse index node.
    pub const fn node_len(self) -> usize {
        TRIE_FANOUT * self.offset_width()
    }

    /// Largest end-of-file value the format can address.
    pub const fn max_eof(self) -> u64 {
        match self {
            FormatVersion::Legacy => u32::MAX as u64 - 1,
            FormatVersion::Current => u64::MAX - 1,
        }
    }
}

/// Rounds a field size up to the record alignment quantum, `None` past
/// 64 bits.
pub const fn align(bytes: u64) -> Option<u64> {
    bytes.div_ceil(ALIGNMENT).checked_mul(ALIGNMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_entry_sizes() {
        let v = FormatVersion::Current;
        assert_eq!(v.prefix_len(), 40);
        assert_eq!(v.field_entry_len(), 180);
        assert_eq!(v.record_entry_len(0), 52);
        assert_eq!(v.record_entry_len(3), 100);
        assert_eq!(v.table_def_entry_len(), 100);
        assert_eq!(v.instance_entry_len(), 416);
        assert_eq!(v.node_len(), 2048);
    }

    #[test]
    fn test_legacy_entry_sizes() {
        let v = FormatVersion::Legacy;
        assert_eq!(v.prefix_len(), 28);
        assert_eq!(v.field_entry_len(), 164);
        assert_eq!(v.record_entry_len(0), 36);
        assert_eq!(v.table_def_entry_len(), 88);
        assert_eq!(v.instance_entry_len(), 404);
        assert_eq!(v.node_len(), 1024);
    }

    #[test]
    fn test_align() {
        assert_eq!(align(0), Some(0));
        assert_eq!(align(1), Some(4));
        assert_eq!(align(4), Some(4));
        assert_eq!(align(6), Some(8));
        assert_eq!(align(20), Some(20));
        assert_eq!(align(u64::MAX), None);
    }
}
