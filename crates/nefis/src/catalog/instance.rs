//! Table instance catalog and per-instance attributes.
//!
//! Instance entry (current format, 416 bytes):
//!
//! ```text
//! ┌────────┬───────────┬─────────────┬────────────┬─────────────┬────────────┬─────────────┬─────────────┐
//! │ prefix │ table def │ int names   │ int values │ real names  │ real values│ text names  │ text values │
//! │ (40)   │ (16)      │ (5 x 16)    │ (5 x 4)    │ (5 x 16)    │ (5 x 4)    │ (5 x 16)    │ (5 x 16)    │
//! └────────┴───────────┴─────────────┴────────────┴─────────────┴────────────┴─────────────┴─────────────┘
//! ```
//!
//! A fixed instance is followed by its data region. A growable instance is
//! followed by one offset holding the slice size in bytes and the 256-slot
//! root node of its sparse index.

use crate::catalog::directory::{Catalog, Directory};
use crate::catalog::entry::{pad_name, unpad, EntryKind, EntryReader, EntryWriter};
use crate::error::{NefisError, Result};
use crate::file::BackingFile;
use crate::format::{MAX_ATTRIBUTES, MAX_NAME, NIL, TRIE_FANOUT};
use std::fmt;
use tracing::debug;

/// Kind of a named instance attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// 32-bit signed integer.
    Integer,
    /// 32-bit float.
    Real,
    /// Text of at most 16 characters.
    Text,
}

impl AttributeKind {
    /// All kinds in storage order.
    pub const ALL: [AttributeKind; 3] = [
        AttributeKind::Integer,
        AttributeKind::Real,
        AttributeKind::Text,
    ];

    const fn value_width(self) -> usize {
        match self {
            AttributeKind::Integer | AttributeKind::Real => 4,
            AttributeKind::Text => MAX_NAME,
        }
    }

    /// Offset of the first name slot, relative to the end of the prefix.
    const fn block_start(self) -> usize {
        // table definition name comes first
        let int_block = MAX_NAME;
        let real_block = int_block + MAX_ATTRIBUTES * (MAX_NAME + 4);
        let text_block = real_block + MAX_ATTRIBUTES * (MAX_NAME + 4);
        match self {
            AttributeKind::Integer => int_block,
            AttributeKind::Real => real_block,
            AttributeKind::Text => text_block,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttributeKind::Integer => "integer",
            AttributeKind::Real => "real",
            AttributeKind::Text => "text",
        })
    }
}

/// Value of a named instance attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Integer attribute.
    Integer(i32),
    /// Real attribute.
    Real(f32),
    /// Text attribute.
    Text(String),
}

impl AttributeValue {
    /// Kind of this value.
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Integer(_) => AttributeKind::Integer,
            AttributeValue::Real(_) => AttributeKind::Real,
            AttributeValue::Text(_) => AttributeKind::Text,
        }
    }
}

/// Storage reserved after an instance entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRegion {
    /// Contiguous data region of this many bytes.
    Fixed {
        /// Region size in bytes.
        bytes: u64,
    },
    /// Sparse index root; each slice holds this many bytes.
    Growable {
        /// Bytes of one slice along the growable dimension.
        slice_bytes: u64,
    },
}

/// A stored table instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    /// Instance name.
    pub name: String,
    /// Table definition it conforms to.
    pub table_def: String,
    /// Offset of the instance entry.
    pub offset: u64,
    /// Whether the entry was written for a growable table.
    pub growable: bool,
    /// Named attributes in slot order.
    pub attributes: Vec<(String, AttributeValue)>,
}

fn attribute_slots(buf: &[u8], prefix_len: usize, kind: AttributeKind) -> (usize, usize) {
    let names = prefix_len + kind.block_start();
    let values = names + MAX_ATTRIBUTES * MAX_NAME;
    debug_assert!(values + MAX_ATTRIBUTES * kind.value_width() <= buf.len());
    (names, values)
}

/// Stores a new instance entry and reserves its region.
///
/// # Errors
///
/// Returns a name conflict if an instance of that name exists.
pub fn define_instance(
    file: &mut BackingFile,
    name: &str,
    table_def: &str,
    region: InstanceRegion,
) -> Result<u64> {
    if !file.is_writable() {
        return Err(NefisError::ReadOnly);
    }
    let padded = pad_name(name)?;
    let codec = file.codec();
    let version = codec.version();
    let width = version.offset_width();
    let base_len = version.instance_entry_len();

    let (kind, image_len, tail) = match region {
        InstanceRegion::Fixed { bytes } => (EntryKind::FixedInstance, base_len, bytes),
        InstanceRegion::Growable { .. } => {
            (EntryKind::GrowableInstance, base_len + width * (1 + TRIE_FANOUT), 0)
        }
    };
    let rest = image_len as u64 + tail - 2 * width as u64;
    let mut writer = EntryWriter::new(codec, kind, &padded, image_len, rest);
    writer.text(table_def, MAX_NAME);
    for kind in AttributeKind::ALL {
        writer.skip(MAX_ATTRIBUTES * MAX_NAME);
        for _ in 0..MAX_ATTRIBUTES {
            match kind {
                AttributeKind::Integer => writer.i32(0),
                AttributeKind::Real => writer.f32(0.0),
                AttributeKind::Text => writer.skip(MAX_NAME),
            }
        }
    }
    if let InstanceRegion::Growable { slice_bytes } = region {
        writer.offset(slice_bytes);
        for _ in 0..TRIE_FANOUT {
            writer.offset(NIL);
        }
    }

    let offset = Directory::new(file, Catalog::Instance).insert(name, writer.finish(), tail)?;
    debug!(name = name.trim_end(), table_def, ?region, offset, "defined table instance");
    Ok(offset)
}

fn read_entry(file: &mut BackingFile, offset: u64) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; file.version().instance_entry_len()];
    file.read_at(offset, &mut buf)?;
    Ok(buf)
}

fn decode_attributes(
    buf: &[u8],
    file: &BackingFile,
    kind: AttributeKind,
) -> Vec<Option<(String, AttributeValue)>> {
    let codec = file.codec();
    let (names, values) = attribute_slots(buf, file.version().prefix_len(), kind);
    (0..MAX_ATTRIBUTES)
        .map(|slot| {
            let name = unpad(&buf[names + slot * MAX_NAME..names + (slot + 1) * MAX_NAME]);
            if name.is_empty() {
                return None;
            }
            let at = values + slot * kind.value_width();
            let raw = &buf[at..at + kind.value_width()];
            let value = match kind {
                AttributeKind::Integer => AttributeValue::Integer(codec.read_i32(raw)),
                AttributeKind::Real => AttributeValue::Real(codec.read_f32(raw)),
                AttributeKind::Text => AttributeValue::Text(unpad(raw)),
            };
            Some((name, value))
        })
        .collect()
}

/// Decodes the instance entry at `offset`.
pub fn read_instance(file: &mut BackingFile, offset: u64) -> Result<InstanceInfo> {
    let buf = read_entry(file, offset)?;
    let codec = file.codec();
    let (mut reader, name) = EntryReader::new(codec, &buf);
    let table_def = reader.text(MAX_NAME);
    let (_, kind) = crate::catalog::entry::read_prefix(codec, &buf);
    let attributes = AttributeKind::ALL
        .into_iter()
        .flat_map(|kind| decode_attributes(&buf, file, kind))
        .flatten()
        .collect();
    Ok(InstanceInfo {
        name,
        table_def,
        offset,
        growable: kind == Some(EntryKind::GrowableInstance),
        attributes,
    })
}

/// Looks up an instance by name.
pub fn lookup_instance(file: &mut BackingFile, name: &str) -> Result<InstanceInfo> {
    let offset = Directory::new(file, Catalog::Instance).require(name)?;
    read_instance(file, offset)
}

/// Reads the named attribute of `kind`.
///
/// # Errors
///
/// Returns [`NefisError::AttributeNotFound`] if no slot carries the name.
pub fn get_attribute(
    file: &mut BackingFile,
    instance: &str,
    name: &str,
    kind: AttributeKind,
) -> Result<AttributeValue> {
    let wanted = unpad(&pad_name(name)?);
    let info_offset = Directory::new(file, Catalog::Instance).require(instance)?;
    let buf = read_entry(file, info_offset)?;
    decode_attributes(&buf, file, kind)
        .into_iter()
        .flatten()
        .find(|(slot_name, _)| *slot_name == wanted)
        .map(|(_, value)| value)
        .ok_or_else(|| NefisError::AttributeNotFound {
            instance: instance.trim_end().to_string(),
            name: wanted,
        })
}

/// Writes the named attribute in place, reusing its slot or taking the
/// first blank one.
///
/// # Errors
///
/// Returns [`NefisError::AttributeSlotsFull`] when all five slots of the
/// kind carry other names.
pub fn put_attribute(
    file: &mut BackingFile,
    instance: &str,
    name: &str,
    value: &AttributeValue,
) -> Result<()> {
    if !file.is_writable() {
        return Err(NefisError::ReadOnly);
    }
    let padded = pad_name(name)?;
    let wanted = unpad(&padded);
    let kind = value.kind();
    let offset = Directory::new(file, Catalog::Instance).require(instance)?;
    let buf = read_entry(file, offset)?;
    let slots = decode_attributes(&buf, file, kind);

    let slot = slots
        .iter()
        .position(|slot| matches!(slot, Some((n, _)) if *n == wanted))
        .or_else(|| slots.iter().position(Option::is_none))
        .ok_or_else(|| NefisError::AttributeSlotsFull {
            instance: instance.trim_end().to_string(),
            kind,
        })?;

    let codec = file.codec();
    let (names, values) = attribute_slots(&buf, file.version().prefix_len(), kind);
    let mut raw = vec![b' '; kind.value_width()];
    match value {
        AttributeValue::Integer(v) => codec.write_i32(&mut raw, *v),
        AttributeValue::Real(v) => codec.write_f32(&mut raw, *v),
        AttributeValue::Text(text) => {
            let n = text.len().min(MAX_NAME);
            raw[..n].copy_from_slice(&text.as_bytes()[..n]);
        }
    }
    file.write_at(offset + (names + slot * MAX_NAME) as u64, &padded)?;
    file.write_at(offset + (values + slot * kind.value_width()) as u64, &raw)?;
    debug!(instance = instance.trim_end(), attribute = %wanted, %kind, slot, "wrote attribute");
    Ok(())
}

/// Reads the slice size and root node offset of a growable instance.
pub fn growable_root(file: &mut BackingFile, offset: u64) -> Result<(u64, u64)> {
    let at = offset + file.version().instance_entry_len() as u64;
    let slice_bytes = file.read_offset_at(at)?;
    let root = at + file.version().offset_width() as u64;
    Ok((slice_bytes, root))
}
