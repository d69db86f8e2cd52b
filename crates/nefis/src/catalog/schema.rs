//! Schema catalog: fields, records and table definitions.
//!
//! Field entry (current format, 180 bytes):
//!
//! ```text
//! ┌────────┬──────┬─────────┬────────┬──────────┬──────┬─────────────┬──────┬──────────┐
//! │ prefix │ type │ total   │ single │ quantity │ unit │ description │ ndim │ dims[5]  │
//! │ (40)   │ (8)  │ (8)     │ (4)    │ (16)     │ (16) │ (64)        │ (4)  │ (20)     │
//! └────────┴──────┴─────────┴────────┴──────────┴──────┴─────────────┴──────┴──────────┘
//! ```
//!
//! Record entry: prefix, total size (offset width), field count, then the
//! field names. Table definition entry: prefix, record name, ndim, five
//! extents and five storage-order entries.

use crate::catalog::directory::{Catalog, Directory};
use crate::catalog::entry::{pad_name, EntryKind, EntryReader, EntryWriter};
use crate::error::{NefisError, Result};
use crate::file::BackingFile;
use crate::format::{align, ElementType, MAX_DESC, MAX_DIM, MAX_NAME, MAX_TYPE};

/// A typed, dimensioned leaf value definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Element type.
    pub element_type: ElementType,
    /// Bytes per single value.
    pub single_bytes: u32,
    /// Dimension extents, 1 to 5 entries, each at least 1.
    pub dims: Vec<u32>,
    /// Physical quantity.
    pub quantity: String,
    /// Unit of measure.
    pub unit: String,
    /// Free text description.
    pub description: String,
}

impl FieldDef {
    /// Creates a scalar field definition.
    pub fn new(name: impl Into<String>, element_type: ElementType, single_bytes: u32) -> Self {
        Self {
            name: name.into(),
            element_type,
            single_bytes,
            dims: vec![1],
            quantity: String::new(),
            unit: String::new(),
            description: String::new(),
        }
    }

    /// Sets the dimension extents.
    pub fn with_dims(mut self, dims: &[u32]) -> Self {
        self.dims = dims.to_vec();
        self
    }

    /// Sets quantity and unit.
    pub fn with_quantity(mut self, quantity: impl Into<String>, unit: impl Into<String>) -> Self {
        self.quantity = quantity.into();
        self.unit = unit.into();
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Number of single values in the field.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::SizeOverflow`] if the count exceeds 64 bits.
    pub fn value_count(&self) -> Result<u64> {
        checked_product(&self.name, self.dims.iter().map(|&d| u64::from(d)))
    }

    /// Total bytes of the field.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::SizeOverflow`] if the size exceeds 64 bits.
    pub fn total_bytes(&self) -> Result<u64> {
        let count = self.value_count()?;
        count
            .checked_mul(u64::from(self.single_bytes))
            .ok_or_else(|| size_overflow(&self.name))
    }

    fn validate(&mut self) -> Result<()> {
        if self.dims.is_empty() {
            self.dims.push(1);
        }
        if self.dims.len() > MAX_DIM {
            return Err(NefisError::InvalidDimensions {
                name: self.name.clone(),
                ndim: self.dims.len(),
            });
        }
        if let Some(pos) = self.dims.iter().position(|&d| d == 0) {
            return Err(NefisError::InvalidExtent {
                name: self.name.clone(),
                dim: pos + 1,
                extent: 0,
            });
        }
        if !self.element_type.supports_width(self.single_bytes) {
            return Err(NefisError::UnsupportedElement {
                element_type: self.element_type,
                bytes: self.single_bytes,
            });
        }
        self.total_bytes().map(|_| ())
    }
}

/// An ordered tuple of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDef {
    /// Record name.
    pub name: String,
    /// Field names in storage order.
    pub fields: Vec<String>,
    /// Total bytes, each field aligned to the record quantum.
    pub size_bytes: u64,
}

/// A dimensioned table pattern over one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table definition name.
    pub name: String,
    /// Record name.
    pub record: String,
    /// Extents, 0 marking the growable dimension.
    pub dims: Vec<u32>,
    /// Storage order: `order[0]` is the 1-based dimension varying fastest on disk.
    pub order: Vec<u32>,
}

impl TableDef {
    /// Creates a table definition with the natural storage order.
    pub fn new(name: impl Into<String>, record: impl Into<String>, dims: &[u32]) -> Self {
        Self {
            name: name.into(),
            record: record.into(),
            dims: dims.to_vec(),
            order: (1..=dims.len() as u32).collect(),
        }
    }

    /// Sets the storage order.
    pub fn with_order(mut self, order: &[u32]) -> Self {
        self.order = order.to_vec();
        self
    }

    /// Index (0-based) of the growable dimension, if any.
    pub fn growable_dim(&self) -> Option<usize> {
        self.dims.iter().position(|&d| d == 0)
    }

    /// Number of records in one slice: the product of the fixed extents.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::SizeOverflow`] if the count exceeds 64 bits.
    pub fn fixed_cells(&self) -> Result<u64> {
        checked_product(
            &self.name,
            self.dims.iter().filter(|&&d| d > 0).map(|&d| u64::from(d)),
        )
    }

    /// Bytes of one slice (or of the whole table when nothing grows) for
    /// records of `record_bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::SizeOverflow`] if the size exceeds 64 bits.
    pub fn slice_bytes(&self, record_bytes: u64) -> Result<u64> {
        self.fixed_cells()?
            .checked_mul(record_bytes)
            .ok_or_else(|| size_overflow(&self.name))
    }

    fn validate(&mut self) -> Result<()> {
        if self.dims.is_empty() {
            self.dims.push(1);
        }
        let ndim = self.dims.len();
        if ndim > MAX_DIM {
            return Err(NefisError::InvalidDimensions {
                name: self.name.clone(),
                ndim,
            });
        }
        let growable = self.dims.iter().filter(|&&d| d == 0).count();
        if growable > 1 {
            return Err(NefisError::GrowableDimensions {
                name: self.name.clone(),
                count: growable,
            });
        }
        if self.order.is_empty() {
            self.order = (1..=ndim as u32).collect();
        }
        let mut sorted = self.order.clone();
        sorted.sort_unstable();
        if sorted != (1..=ndim as u32).collect::<Vec<_>>() {
            return Err(NefisError::InvalidAxisOrder {
                order: self.order.iter().map(|&o| o as usize).collect(),
                ndim,
            });
        }
        Ok(())
    }
}

fn size_overflow(name: &str) -> NefisError {
    NefisError::SizeOverflow {
        name: name.trim_end().to_string(),
    }
}

fn checked_product(name: &str, mut factors: impl Iterator<Item = u64>) -> Result<u64> {
    factors
        .try_fold(1u64, |acc, f| acc.checked_mul(f))
        .ok_or_else(|| size_overflow(name))
}

fn check_writable(file: &BackingFile) -> Result<()> {
    if file.is_writable() {
        Ok(())
    } else {
        Err(NefisError::ReadOnly)
    }
}

/// Validates and stores a field definition.
///
/// # Errors
///
/// Returns an error for invalid dimensions or type widths, or if a field
/// with the same name exists.
pub fn define_field(file: &mut BackingFile, field: &FieldDef) -> Result<FieldDef> {
    check_writable(file)?;
    let mut field = field.clone();
    field.validate()?;
    let name = pad_name(&field.name)?;

    let codec = file.codec();
    let version = codec.version();
    let len = version.field_entry_len();
    let rest = (len - 2 * version.offset_width()) as u64;
    let mut writer = EntryWriter::new(codec, EntryKind::Field, &name, len, rest);
    writer.text(field.element_type.tag(), MAX_TYPE);
    writer.offset(field.total_bytes()?);
    writer.u32(field.single_bytes);
    writer.text(&field.quantity, MAX_NAME);
    writer.text(&field.unit, MAX_NAME);
    writer.text(&field.description, MAX_DESC);
    writer.u32(field.dims.len() as u32);
    for i in 0..MAX_DIM {
        writer.u32(field.dims.get(i).copied().unwrap_or(1));
    }

    Directory::new(file, Catalog::Field).insert(&field.name, writer.finish(), 0)?;
    field.name = field.name.trim_end().to_string();
    Ok(field)
}

/// Decodes the field entry at `offset`.
pub fn read_field(file: &mut BackingFile, offset: u64) -> Result<FieldDef> {
    let codec = file.codec();
    let mut buf = vec![0u8; codec.version().field_entry_len()];
    file.read_at(offset, &mut buf)?;
    let (mut reader, name) = EntryReader::new(codec, &buf);
    let tag = reader.text(MAX_TYPE);
    let element_type =
        ElementType::from_tag(&tag).ok_or_else(|| NefisError::UnknownElementType(tag.clone()))?;
    let _total = reader.offset();
    let single_bytes = reader.u32();
    let quantity = reader.text(MAX_NAME);
    let unit = reader.text(MAX_NAME);
    let description = reader.text(MAX_DESC);
    let ndim = (reader.u32() as usize).clamp(1, MAX_DIM);
    let dims: Vec<u32> = (0..MAX_DIM).map(|_| reader.u32()).take(ndim).collect();
    Ok(FieldDef {
        name,
        element_type,
        single_bytes,
        dims,
        quantity,
        unit,
        description,
    })
}

/// Looks up a field by name.
pub fn lookup_field(file: &mut BackingFile, name: &str) -> Result<FieldDef> {
    let offset = Directory::new(file, Catalog::Field).require(name)?;
    read_field(file, offset)
}

/// Stores a record over already defined fields.
///
/// # Errors
///
/// Returns an undefined-reference error if a field does not exist and a
/// name conflict if the record exists.
pub fn define_record(file: &mut BackingFile, name: &str, fields: &[&str]) -> Result<RecordDef> {
    check_writable(file)?;
    let padded = pad_name(name)?;
    if fields.is_empty() {
        return Err(NefisError::InvalidDimensions {
            name: name.to_string(),
            ndim: 0,
        });
    }
    let mut size_bytes = 0u64;
    let mut field_names = Vec::with_capacity(fields.len());
    for field in fields {
        let def = lookup_field(file, field)?;
        size_bytes = def
            .total_bytes()
            .ok()
            .and_then(align)
            .and_then(|bytes| size_bytes.checked_add(bytes))
            .ok_or_else(|| size_overflow(name))?;
        field_names.push(def.name);
    }

    let codec = file.codec();
    let version = codec.version();
    let len = version.record_entry_len(fields.len());
    let rest = (len - 2 * version.offset_width()) as u64;
    let mut writer = EntryWriter::new(codec, EntryKind::Record, &padded, len, rest);
    writer.offset(size_bytes);
    writer.u32(fields.len() as u32);
    for field in &field_names {
        writer.text(field, MAX_NAME);
    }

    Directory::new(file, Catalog::Record).insert(name, writer.finish(), 0)?;
    Ok(RecordDef {
        name: name.trim_end().to_string(),
        fields: field_names,
        size_bytes,
    })
}

/// Decodes the record entry at `offset`.
pub fn read_record(file: &mut BackingFile, offset: u64) -> Result<RecordDef> {
    let codec = file.codec();
    let version = codec.version();
    let mut head = vec![0u8; version.record_entry_len(0)];
    file.read_at(offset, &mut head)?;
    let (mut reader, name) = EntryReader::new(codec, &head);
    let size_bytes = reader.offset();
    let count = reader.u32() as usize;

    let mut names = vec![0u8; MAX_NAME * count];
    file.read_at(offset + head.len() as u64, &mut names)?;
    let fields = names
        .chunks_exact(MAX_NAME)
        .map(crate::catalog::entry::unpad)
        .collect();
    Ok(RecordDef {
        name,
        fields,
        size_bytes,
    })
}

/// Looks up a record by name.
pub fn lookup_record(file: &mut BackingFile, name: &str) -> Result<RecordDef> {
    let offset = Directory::new(file, Catalog::Record).require(name)?;
    read_record(file, offset)
}

/// Stores a table definition over an existing record.
///
/// # Errors
///
/// Returns an error for invalid dimensions or order, an undefined-reference
/// error if the record does not exist and a name conflict if the table
/// definition exists.
pub fn define_table_def(file: &mut BackingFile, table: &TableDef) -> Result<TableDef> {
    check_writable(file)?;
    let mut table = table.clone();
    table.validate()?;
    let padded = pad_name(&table.name)?;
    let record = lookup_record(file, &table.record)?;
    table.slice_bytes(record.size_bytes)?;
    table.record = record.name;

    let codec = file.codec();
    let version = codec.version();
    let len = version.table_def_entry_len();
    let rest = (len - 2 * version.offset_width()) as u64;
    let mut writer = EntryWriter::new(codec, EntryKind::TableDef, &padded, len, rest);
    writer.text(&table.record, MAX_NAME);
    writer.u32(table.dims.len() as u32);
    for i in 0..MAX_DIM {
        writer.u32(table.dims.get(i).copied().unwrap_or(1));
    }
    for i in 0..MAX_DIM {
        writer.u32(table.order.get(i).copied().unwrap_or(i as u32 + 1));
    }

    Directory::new(file, Catalog::TableDef).insert(&table.name, writer.finish(), 0)?;
    table.name = table.name.trim_end().to_string();
    Ok(table)
}

/// Decodes the table definition entry at `offset`.
pub fn read_table_def(file: &mut BackingFile, offset: u64) -> Result<TableDef> {
    let codec = file.codec();
    let mut buf = vec![0u8; codec.version().table_def_entry_len()];
    file.read_at(offset, &mut buf)?;
    let (mut reader, name) = EntryReader::new(codec, &buf);
    let record = reader.text(MAX_NAME);
    let ndim = (reader.u32() as usize).clamp(1, MAX_DIM);
    let dims: Vec<u32> = (0..MAX_DIM).map(|_| reader.u32()).collect();
    let order: Vec<u32> = (0..MAX_DIM).map(|_| reader.u32()).collect();
    Ok(TableDef {
        name,
        record,
        dims: dims[..ndim].to_vec(),
        order: order[..ndim].to_vec(),
    })
}

/// Looks up a table definition by name.
pub fn lookup_table_def(file: &mut BackingFile, name: &str) -> Result<TableDef> {
    let offset = Directory::new(file, Catalog::TableDef).require(name)?;
    read_table_def(file, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Coding, FileKind, FormatVersion};
    use tempfile::TempDir;

    fn create_def_file(dir: &TempDir, version: FormatVersion) -> BackingFile {
        let path = dir.path().join("schema.def");
        BackingFile::create(&path, FileKind::Definition, version, Coding::Neutral).unwrap()
    }

    #[test]
    fn test_field_roundtrip_both_versions() {
        let dir = TempDir::new().unwrap();
        for version in [FormatVersion::Current, FormatVersion::Legacy] {
            let mut file = create_def_file(&dir, version);
            let field = FieldDef::new("WATERLEVEL", ElementType::Real, 4)
                .with_dims(&[3, 2])
                .with_quantity("level", "m")
                .with_description("water level above datum");
            define_field(&mut file, &field).unwrap();

            let read = lookup_field(&mut file, "WATERLEVEL").unwrap();
            assert_eq!(read, field);
            assert_eq!(read.total_bytes().unwrap(), 24);
        }
    }

    #[test]
    fn test_field_validation() {
        let dir = TempDir::new().unwrap();
        let mut file = create_def_file(&dir, FormatVersion::Current);

        let scalar = define_field(&mut file, &FieldDef::new("S", ElementType::Integer, 4).with_dims(&[]))
            .unwrap();
        assert_eq!(scalar.dims, vec![1]);

        let too_many = FieldDef::new("T", ElementType::Real, 4).with_dims(&[1, 1, 1, 1, 1, 1]);
        assert!(matches!(
            define_field(&mut file, &too_many),
            Err(NefisError::InvalidDimensions { ndim: 6, .. })
        ));

        let zero = FieldDef::new("Z", ElementType::Real, 4).with_dims(&[2, 0]);
        assert!(matches!(
            define_field(&mut file, &zero),
            Err(NefisError::InvalidExtent { dim: 2, .. })
        ));

        let odd = FieldDef::new("O", ElementType::Real, 2);
        let err = define_field(&mut file, &odd).unwrap_err();
        assert_eq!(err.code(), 5002);
    }

    #[test]
    fn test_record_aligns_fields() {
        let dir = TempDir::new().unwrap();
        let mut file = create_def_file(&dir, FormatVersion::Current);
        define_field(&mut file, &FieldDef::new("FLAG", ElementType::Logical, 2)).unwrap();
        define_field(&mut file, &FieldDef::new("NAME", ElementType::Character, 5)).unwrap();
        define_field(&mut file, &FieldDef::new("DEPTH", ElementType::Real, 8).with_dims(&[2]))
            .unwrap();

        let record = define_record(&mut file, "STATION", &["FLAG", "NAME", "DEPTH"]).unwrap();
        assert_eq!(record.size_bytes, 4 + 8 + 16);

        let read = lookup_record(&mut file, "STATION").unwrap();
        assert_eq!(read, record);
    }

    #[test]
    fn test_record_with_unknown_field() {
        let dir = TempDir::new().unwrap();
        let mut file = create_def_file(&dir, FormatVersion::Legacy);
        define_field(&mut file, &FieldDef::new("A", ElementType::Real, 4)).unwrap();
        let err = define_record(&mut file, "R", &["A", "MISSING"]).unwrap_err();
        assert!(matches!(
            err,
            NefisError::UndefinedName {
                catalog: Catalog::Field,
                ..
            }
        ));
        assert!(lookup_record(&mut file, "R").is_err());
    }

    #[test]
    fn test_table_def_roundtrip_and_validation() {
        let dir = TempDir::new().unwrap();
        let mut file = create_def_file(&dir, FormatVersion::Current);
        define_field(&mut file, &FieldDef::new("A", ElementType::Real, 4)).unwrap();
        define_record(&mut file, "R", &["A"]).unwrap();

        let table = TableDef::new("MAP", "R", &[10, 0]).with_order(&[2, 1]);
        define_table_def(&mut file, &table).unwrap();
        let read = lookup_table_def(&mut file, "MAP").unwrap();
        assert_eq!(read, table);
        assert_eq!(read.growable_dim(), Some(1));
        assert_eq!(read.fixed_cells().unwrap(), 10);

        let two_growable = TableDef::new("BAD", "R", &[0, 0]);
        assert!(matches!(
            define_table_def(&mut file, &two_growable),
            Err(NefisError::GrowableDimensions { count: 2, .. })
        ));

        let bad_order = TableDef::new("BAD", "R", &[2, 2]).with_order(&[1, 1]);
        assert!(matches!(
            define_table_def(&mut file, &bad_order),
            Err(NefisError::InvalidAxisOrder { .. })
        ));

        let missing = TableDef::new("BAD", "NOPE", &[2]);
        assert!(matches!(
            define_table_def(&mut file, &missing),
            Err(NefisError::UndefinedName {
                catalog: Catalog::Record,
                ..
            })
        ));
    }
}
