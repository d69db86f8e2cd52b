//! The store handle: one open definition/data file pair (or merged file).
//!
//! All per-file state (end-of-file counters, bucket tables, byte order,
//! enumeration cursors, the metadata cache and the last error) lives in
//! the [`Store`] and is released when it is closed or dropped.

use crate::array::{AccessPlan, FieldLayout, MetadataCache, Selector, SparseIndex};
use crate::catalog::instance::{self, AttributeKind, AttributeValue, InstanceInfo, InstanceRegion};
use crate::catalog::schema::{self, FieldDef, RecordDef, TableDef};
use crate::catalog::{Catalog, Directory};
use crate::config::{AccessMode, StoreConfig};
use crate::error::{ErrorReport, NefisError, Result};
use crate::file::BackingFile;
use crate::format::{align, Coding, Element, ElementType, FileKind, FormatVersion};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
enum Files {
    Split { def: BackingFile, dat: BackingFile },
    Merged(BackingFile),
}

impl Files {
    fn def(&mut self) -> &mut BackingFile {
        match self {
            Files::Split { def, .. } => def,
            Files::Merged(file) => file,
        }
    }

    fn dat(&mut self) -> &mut BackingFile {
        match self {
            Files::Split { dat, .. } => dat,
            Files::Merged(file) => file,
        }
    }

    fn def_ref(&self) -> &BackingFile {
        match self {
            Files::Split { def, .. } => def,
            Files::Merged(file) => file,
        }
    }

    fn dat_ref(&self) -> &BackingFile {
        match self {
            Files::Split { dat, .. } => dat,
            Files::Merged(file) => file,
        }
    }

    fn for_catalog(&mut self, catalog: Catalog) -> &mut BackingFile {
        match catalog {
            Catalog::Instance => self.dat(),
            Catalog::Field | Catalog::Record | Catalog::TableDef => self.def(),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            Files::Split { def, dat } => {
                def.flush()?;
                dat.flush()
            }
            Files::Merged(file) => file.flush(),
        }
    }

    fn paths(&self) -> Vec<PathBuf> {
        match self {
            Files::Split { def, dat } => vec![def.path().to_path_buf(), dat.path().to_path_buf()],
            Files::Merged(file) => vec![file.path().to_path_buf()],
        }
    }
}

#[derive(Debug, Default)]
struct Cursor {
    offsets: Vec<u64>,
    position: usize,
    /// End-of-file when `offsets` was collected.
    eof: u64,
}

/// Resolves a path to the identity used for duplicate-open detection.
pub(crate) fn file_identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn open_or_create(path: &Path, kind: FileKind, config: &StoreConfig) -> Result<BackingFile> {
    let create = match config.access {
        AccessMode::Create => true,
        AccessMode::Update => !path.exists(),
        AccessMode::ReadOnly => false,
    };
    if create {
        BackingFile::create(path, kind, config.format, config.coding)
    } else {
        BackingFile::open(path, config.access.is_writable())
    }
}

fn expect_kind(file: &BackingFile, kind: FileKind) -> Result<()> {
    if file.header().kind != kind {
        return Err(NefisError::WrongFileKind {
            path: file.path().to_path_buf(),
            expected: kind.describe(),
        });
    }
    Ok(())
}

fn check_element(layout: &FieldLayout, element_type: ElementType, width: usize) -> Result<()> {
    if layout.element_type != element_type || layout.single_bytes as usize != width {
        return Err(NefisError::UnsupportedElement {
            element_type: layout.element_type,
            bytes: width as u32,
        });
    }
    Ok(())
}

fn buffer_size(plan: &AccessPlan) -> Result<usize> {
    usize::try_from(plan.buffer_len()).map_err(|_| NefisError::SizeOverflow {
        name: "selection".to_string(),
    })
}

/// An open NEFIS store.
///
/// # Example
///
/// ```rust,ignore
/// use nefis::{AccessMode, Coding, ElementType, FieldDef, Selector, Store, TableDef};
///
/// # fn main() -> nefis::Result<()> {
/// let mut store = Store::create_or_open("run.dat", "run.def", Coding::Neutral, AccessMode::Create)?;
/// store.define_field(&FieldDef::new("WATERLEVEL", ElementType::Real, 4))?;
/// store.define_record("HIS", &["WATERLEVEL"])?;
/// store.define_table_def(&TableDef::new("his-series", "HIS", &[0]))?;
/// store.define_instance("his-series", "his-series")?;
/// store.put_values("his-series", "WATERLEVEL", &[Selector::single(1)], &[1], &[0.25f32])?;
/// assert_eq!(store.max_index("his-series")?, 1);
/// store.close()
/// # }
/// ```
#[derive(Debug)]
pub struct Store {
    files: Files,
    config: StoreConfig,
    identities: Vec<PathBuf>,
    cache: MetadataCache,
    cursors: HashMap<Catalog, Cursor>,
    last_error: Option<ErrorReport>,
}

impl Store {
    /// Opens or creates a store.
    ///
    /// Passing the same path twice selects a single merged file.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be created or opened or is not a
    /// NEFIS file of the expected kind.
    pub fn create_or_open(
        data_path: impl AsRef<Path>,
        def_path: impl AsRef<Path>,
        coding: Coding,
        access: AccessMode,
    ) -> Result<Self> {
        Self::open_with_config(data_path, def_path, StoreConfig::new(access, coding))
    }

    /// Opens or creates a store with an explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`Store::create_or_open`].
    pub fn open_with_config(
        data_path: impl AsRef<Path>,
        def_path: impl AsRef<Path>,
        config: StoreConfig,
    ) -> Result<Self> {
        let data_path = data_path.as_ref();
        let def_path = def_path.as_ref();
        let merged = data_path == def_path || file_identity(data_path) == file_identity(def_path);

        let files = if merged {
            let file = open_or_create(data_path, FileKind::Merged, &config)?;
            expect_kind(&file, FileKind::Merged)?;
            Files::Merged(file)
        } else {
            let dat = open_or_create(data_path, FileKind::Data, &config)?;
            if dat.header().kind == FileKind::Merged {
                // An existing merged file serves as both halves.
                Files::Merged(dat)
            } else {
                expect_kind(&dat, FileKind::Data)?;
                let def = open_or_create(def_path, FileKind::Definition, &config)?;
                expect_kind(&def, FileKind::Definition)?;
                Files::Split { def, dat }
            }
        };
        let merged = matches!(files, Files::Merged(_));
        let identities = files.paths().iter().map(|p| file_identity(p)).collect();

        debug!(
            data = %data_path.display(),
            definition = %def_path.display(),
            merged,
            access = ?config.access,
            "opened store"
        );
        Ok(Self {
            files,
            config,
            identities,
            cache: MetadataCache::new(),
            cursors: HashMap::new(),
            last_error: None,
        })
    }

    /// Writes back the bucket tables and closes the files.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        debug!(paths = ?self.identities, "closed store");
        Ok(())
    }

    /// Writes back the end-of-file counters and bucket tables.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    pub fn flush(&mut self) -> Result<()> {
        let result = self.files.flush();
        self.track(result)
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!(code = e.code(), error = %e, "store operation failed");
            self.last_error = Some(ErrorReport::from(e));
        }
        result
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.config.access.is_writable() {
            Ok(())
        } else {
            Err(NefisError::ReadOnly)
        }
    }

    /// `(code, message)` of the most recent failed call on this handle.
    pub fn last_error(&self) -> Option<&ErrorReport> {
        self.last_error.as_ref()
    }

    /// Canonical paths of the backing files.
    pub fn paths(&self) -> &[PathBuf] {
        &self.identities
    }

    /// Whether definitions and data share one file.
    pub fn is_merged(&self) -> bool {
        matches!(self.files, Files::Merged(_))
    }

    /// Format version of the data file.
    pub fn version(&self) -> FormatVersion {
        self.files.dat_ref().version()
    }

    /// Banner text of the data file header.
    pub fn data_header(&self) -> &str {
        &self.files.dat_ref().header().text
    }

    /// Banner text of the definition file header.
    pub fn definition_header(&self) -> &str {
        &self.files.def_ref().header().text
    }

    /// Number of memoized field layouts.
    pub fn cached_layouts(&self) -> usize {
        self.cache.len()
    }

    // ----- definitions -------------------------------------------------

    /// Defines a field.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid dimensions or type widths, or a name
    /// conflict.
    pub fn define_field(&mut self, field: &FieldDef) -> Result<FieldDef> {
        let result = self
            .ensure_writable()
            .and_then(|_| schema::define_field(self.files.def(), field));
        self.track(result)
    }

    /// Defines a record over existing fields.
    ///
    /// # Errors
    ///
    /// Returns an undefined-reference error for unknown fields or a name
    /// conflict.
    pub fn define_record(&mut self, name: &str, fields: &[&str]) -> Result<RecordDef> {
        let result = self
            .ensure_writable()
            .and_then(|_| schema::define_record(self.files.def(), name, fields));
        self.track(result)
    }

    /// Defines a table over an existing record.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid dimensions or order, an unknown record
    /// or a name conflict.
    pub fn define_table_def(&mut self, table: &TableDef) -> Result<TableDef> {
        let result = self
            .ensure_writable()
            .and_then(|_| schema::define_table_def(self.files.def(), table));
        self.track(result)
    }

    /// Creates a table instance conforming to `table_def`.
    ///
    /// Fixed tables reserve their whole data region; growable tables
    /// reserve a header and an empty sparse index.
    ///
    /// # Errors
    ///
    /// Returns an undefined-reference error for an unknown table definition
    /// or record, or a name conflict.
    pub fn define_instance(&mut self, name: &str, table_def: &str) -> Result<()> {
        let result = self.define_instance_inner(name, table_def);
        self.track(result)
    }

    fn define_instance_inner(&mut self, name: &str, table_def: &str) -> Result<()> {
        self.ensure_writable()?;
        let table = schema::lookup_table_def(self.files.def(), table_def)?;
        let record = schema::lookup_record(self.files.def(), &table.record)?;
        let bytes = table.slice_bytes(record.size_bytes)?;
        let region = match table.growable_dim() {
            Some(_) => InstanceRegion::Growable { slice_bytes: bytes },
            None => InstanceRegion::Fixed { bytes },
        };
        instance::define_instance(self.files.dat(), name, &table.name, region)?;
        Ok(())
    }

    // ----- element access ----------------------------------------------

    fn layout(&mut self, instance: &str, field: &str) -> Result<FieldLayout> {
        if self.config.cache_metadata {
            if let Some(layout) = self.cache.find(instance, field) {
                return Ok(layout.clone());
            }
        }
        let layout = self.resolve_layout(instance, field)?;
        if self.config.cache_metadata {
            self.cache.insert(instance, field, layout.clone());
        }
        Ok(layout)
    }

    fn resolve_layout(&mut self, instance_name: &str, field_name: &str) -> Result<FieldLayout> {
        let info = instance::lookup_instance(self.files.dat(), instance_name)?;
        let def = self.files.def();
        let table = schema::lookup_table_def(def, &info.table_def)?;
        let record = schema::lookup_record(def, &table.record)?;

        let wanted = field_name.trim_end();
        let mut field_offset = 0u64;
        let mut found = None;
        for name in &record.fields {
            let field = schema::lookup_field(def, name)?;
            if field.name == wanted {
                found = Some(field);
                break;
            }
            field_offset = align(field.total_bytes()?)
                .and_then(|bytes| field_offset.checked_add(bytes))
                .ok_or_else(|| NefisError::SizeOverflow {
                    name: record.name.clone(),
                })?;
        }
        let field = match found {
            Some(field) => field,
            None => {
                // Distinguish an unknown field from one outside this record.
                schema::lookup_field(def, wanted)?;
                return Err(NefisError::FieldNotInRecord {
                    field: wanted.to_string(),
                    record: record.name,
                });
            }
        };

        let dat = self.files.dat();
        let growable_dim = table.growable_dim();
        let (data_offset, slice_bytes) = match growable_dim {
            Some(_) => {
                let (slice_bytes, root) = instance::growable_root(dat, info.offset)?;
                (root, slice_bytes)
            }
            None => (
                info.offset + dat.version().instance_entry_len() as u64,
                table.slice_bytes(record.size_bytes)?,
            ),
        };
        debug!(
            instance = instance_name,
            field = wanted,
            field_offset,
            record_bytes = record.size_bytes,
            "resolved field layout"
        );
        Ok(FieldLayout {
            element_type: field.element_type,
            single_bytes: field.single_bytes,
            field_bytes: field.total_bytes()?,
            field_offset,
            record_bytes: record.size_bytes,
            dims: table.dims,
            order: table.order,
            data_offset,
            growable_dim,
            slice_bytes,
        })
    }

    /// Reads a strided selection of one field into a new buffer.
    ///
    /// `selectors[i]` and `order[i]` describe caller axis `i`: its index
    /// range and the 1-based table dimension it addresses. Caller axis 0
    /// varies fastest in the returned buffer. Values are in host byte order.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown names, invalid selectors, or a growable
    /// index that was never written.
    pub fn get(
        &mut self,
        instance: &str,
        field: &str,
        selectors: &[Selector],
        order: &[usize],
    ) -> Result<Vec<u8>> {
        let result = self
            .read_plan(instance, field, selectors, order)
            .and_then(|(layout, plan, len)| {
                let mut buf = vec![0u8; len];
                self.read_cells(instance, &layout, &plan, &mut buf)?;
                Ok(buf)
            });
        self.track(result)
    }

    /// Reads a strided selection into `buf` and returns the bytes filled.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::BufferTooSmall`] before any data is read if
    /// `buf` cannot hold the selection; see also [`Store::get`].
    pub fn get_into(
        &mut self,
        instance: &str,
        field: &str,
        selectors: &[Selector],
        order: &[usize],
        buf: &mut [u8],
    ) -> Result<usize> {
        let result = self
            .read_plan(instance, field, selectors, order)
            .and_then(|(layout, plan, needed)| {
                if buf.len() < needed {
                    return Err(NefisError::BufferTooSmall {
                        needed,
                        actual: buf.len(),
                    });
                }
                self.read_cells(instance, &layout, &plan, &mut buf[..needed])?;
                Ok(needed)
            });
        self.track(result)
    }

    fn plan(
        &mut self,
        instance: &str,
        field: &str,
        selectors: &[Selector],
        order: &[usize],
    ) -> Result<(FieldLayout, AccessPlan)> {
        let layout = self.layout(instance, field)?;
        let plan = AccessPlan::new(&layout, selectors, order)?;
        Ok((layout, plan))
    }

    /// Plans a read and rejects growable indices past the last written one
    /// before the buffer is sized.
    fn read_plan(
        &mut self,
        instance: &str,
        field: &str,
        selectors: &[Selector],
        order: &[usize],
    ) -> Result<(FieldLayout, AccessPlan, usize)> {
        let (layout, plan) = self.plan(instance, field, selectors, order)?;
        if layout.growable_dim.is_some() {
            let max = SparseIndex::at(layout.data_offset).max_index(self.files.dat())?;
            if let Some(index) = plan.growable_beyond(max) {
                return Err(NefisError::IndexNotWritten {
                    instance: instance.trim_end().to_string(),
                    index,
                });
            }
        }
        let len = buffer_size(&plan)?;
        Ok((layout, plan, len))
    }

    fn read_cells(
        &mut self,
        instance: &str,
        layout: &FieldLayout,
        plan: &AccessPlan,
        buf: &mut [u8],
    ) -> Result<()> {
        let dat = self.files.dat();
        let trie = layout.growable_dim.map(|_| SparseIndex::at(layout.data_offset));
        let field_bytes = layout.field_bytes as usize;
        let mut current: Option<(u64, u64)> = None;
        plan.for_each_cell(|cell| {
            let base = match (trie, cell.growable_index) {
                (Some(trie), Some(index)) => match current {
                    Some((cached, block)) if cached == index => block,
                    _ => {
                        let block = trie.resolve(dat, index)?.ok_or_else(|| {
                            NefisError::IndexNotWritten {
                                instance: instance.trim_end().to_string(),
                                index,
                            }
                        })?;
                        current = Some((index, block));
                        block
                    }
                },
                _ => layout.data_offset,
            };
            let at = base + cell.record_index * layout.record_bytes + layout.field_offset;
            let start = cell.buffer_index as usize * field_bytes;
            dat.read_at(at, &mut buf[start..start + field_bytes])
        })?;
        dat.codec()
            .convert_values(layout.element_type, layout.single_bytes as usize, buf);
        Ok(())
    }

    /// Writes a strided selection of one field from `data` (host byte order).
    ///
    /// Writing along a growable dimension allocates missing slices.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown names, invalid selectors, a short
    /// buffer or a read-only store.
    pub fn put(
        &mut self,
        instance: &str,
        field: &str,
        selectors: &[Selector],
        order: &[usize],
        data: &[u8],
    ) -> Result<()> {
        let result = self.put_inner(instance, field, selectors, order, data, None);
        self.track(result)
    }

    fn put_inner(
        &mut self,
        instance: &str,
        field: &str,
        selectors: &[Selector],
        order: &[usize],
        data: &[u8],
        element: Option<(ElementType, usize)>,
    ) -> Result<()> {
        self.ensure_writable()?;
        let (layout, plan) = self.plan(instance, field, selectors, order)?;
        if let Some((element_type, width)) = element {
            check_element(&layout, element_type, width)?;
        }
        let needed = buffer_size(&plan)?;
        if data.len() < needed {
            return Err(NefisError::BufferTooSmall {
                needed,
                actual: data.len(),
            });
        }

        let dat = self.files.dat();
        let mut scratch = data[..needed].to_vec();
        dat.codec()
            .convert_values(layout.element_type, layout.single_bytes as usize, &mut scratch);

        let trie = layout.growable_dim.map(|_| SparseIndex::at(layout.data_offset));
        let field_bytes = layout.field_bytes as usize;
        let mut current: Option<(u64, u64)> = None;
        plan.for_each_cell(|cell| {
            let base = match (trie, cell.growable_index) {
                (Some(trie), Some(index)) => match current {
                    Some((cached, block)) if cached == index => block,
                    _ => {
                        let block = trie.resolve_or_create(dat, index, layout.slice_bytes)?;
                        current = Some((index, block));
                        block
                    }
                },
                _ => layout.data_offset,
            };
            let at = base + cell.record_index * layout.record_bytes + layout.field_offset;
            let start = cell.buffer_index as usize * field_bytes;
            dat.write_at(at, &scratch[start..start + field_bytes])
        })
    }

    /// Reads a strided selection as typed values.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::UnsupportedElement`] if the field's type or
    /// width does not match `T`; see also [`Store::get`].
    pub fn get_values<T: Element>(
        &mut self,
        instance: &str,
        field: &str,
        selectors: &[Selector],
        order: &[usize],
    ) -> Result<Vec<T>> {
        let result = self
            .read_plan(instance, field, selectors, order)
            .and_then(|(layout, plan, len)| {
                check_element(&layout, T::ELEMENT_TYPE, T::WIDTH)?;
                let mut buf = vec![0u8; len];
                self.read_cells(instance, &layout, &plan, &mut buf)?;
                Ok(buf.chunks_exact(T::WIDTH).map(T::from_host_bytes).collect())
            });
        self.track(result)
    }

    /// Writes typed values into a strided selection.
    ///
    /// # Errors
    ///
    /// See [`Store::get_values`] and [`Store::put`].
    pub fn put_values<T: Element>(
        &mut self,
        instance: &str,
        field: &str,
        selectors: &[Selector],
        order: &[usize],
        values: &[T],
    ) -> Result<()> {
        let mut bytes = vec![0u8; values.len() * T::WIDTH];
        for (chunk, value) in bytes.chunks_exact_mut(T::WIDTH).zip(values) {
            value.to_host_bytes(chunk);
        }
        let element = Some((T::ELEMENT_TYPE, T::WIDTH));
        let result = self.put_inner(instance, field, selectors, order, &bytes, element);
        self.track(result)
    }

    /// Largest index written along the growable dimension of `instance`
    /// (0 if none); for fixed tables, the largest extent.
    ///
    /// # Errors
    ///
    /// Returns an undefined-reference error for an unknown instance.
    pub fn max_index(&mut self, instance: &str) -> Result<u64> {
        let result = self.max_index_inner(instance);
        self.track(result)
    }

    fn max_index_inner(&mut self, instance_name: &str) -> Result<u64> {
        let info = instance::lookup_instance(self.files.dat(), instance_name)?;
        let table = schema::lookup_table_def(self.files.def(), &info.table_def)?;
        match table.growable_dim() {
            Some(_) => {
                let dat = self.files.dat();
                let (_, root) = instance::growable_root(dat, info.offset)?;
                SparseIndex::at(root).max_index(dat)
            }
            None => Ok(table.dims.iter().copied().max().map_or(0, u64::from)),
        }
    }

    // ----- attributes --------------------------------------------------

    /// Reads a named attribute of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::AttributeNotFound`] if it was never set.
    pub fn get_attribute(
        &mut self,
        instance: &str,
        name: &str,
        kind: AttributeKind,
    ) -> Result<AttributeValue> {
        let result = instance::get_attribute(self.files.dat(), instance, name, kind);
        self.track(result)
    }

    /// Sets a named attribute, overwriting a previous value of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::AttributeSlotsFull`] when the five slots of the
    /// kind hold other names.
    pub fn put_attribute(
        &mut self,
        instance: &str,
        name: &str,
        value: AttributeValue,
    ) -> Result<()> {
        let result = self
            .ensure_writable()
            .and_then(|_| instance::put_attribute(self.files.dat(), instance, name, &value));
        self.track(result)
    }

    /// Attributes of `kind` on `instance`, in slot order.
    pub fn inquire_attributes(
        &mut self,
        instance: &str,
        kind: AttributeKind,
    ) -> Result<Vec<(String, AttributeValue)>> {
        let result = instance::lookup_instance(self.files.dat(), instance).map(|info| {
            info.attributes
                .into_iter()
                .filter(|(_, value)| value.kind() == kind)
                .collect()
        });
        self.track(result)
    }

    // ----- inquiry -----------------------------------------------------

    /// Definition of the named field.
    pub fn inquire_field(&mut self, name: &str) -> Result<FieldDef> {
        let result = schema::lookup_field(self.files.def(), name);
        self.track(result)
    }

    /// Definition of the named record.
    pub fn inquire_record(&mut self, name: &str) -> Result<RecordDef> {
        let result = schema::lookup_record(self.files.def(), name);
        self.track(result)
    }

    /// Definition of the named table.
    pub fn inquire_table_def(&mut self, name: &str) -> Result<TableDef> {
        let result = schema::lookup_table_def(self.files.def(), name);
        self.track(result)
    }

    /// The named table instance.
    pub fn inquire_instance(&mut self, name: &str) -> Result<InstanceInfo> {
        let result = instance::lookup_instance(self.files.dat(), name);
        self.track(result)
    }

    fn collect_entries<T>(
        &mut self,
        catalog: Catalog,
        read: fn(&mut BackingFile, u64) -> Result<T>,
    ) -> Result<Vec<T>> {
        let file = self.files.for_catalog(catalog);
        let offsets = Directory::new(file, catalog).offsets()?;
        offsets.into_iter().map(|offset| read(file, offset)).collect()
    }

    fn step_cursor<T>(
        &mut self,
        catalog: Catalog,
        restart: bool,
        read: fn(&mut BackingFile, u64) -> Result<T>,
    ) -> Result<Option<T>> {
        let eof = self.files.for_catalog(catalog).eof();
        let position = match self.cursors.get(&catalog) {
            Some(cursor) if !restart && cursor.eof == eof => None,
            // New entries sort after every visited offset.
            Some(cursor) if !restart => Some(cursor.position),
            _ => Some(0),
        };
        if let Some(position) = position {
            let offsets = Directory::new(self.files.for_catalog(catalog), catalog).offsets()?;
            self.cursors.insert(
                catalog,
                Cursor {
                    offsets,
                    position,
                    eof,
                },
            );
        }
        let next = self.cursors.get_mut(&catalog).and_then(|cursor| {
            let offset = cursor.offsets.get(cursor.position).copied();
            if offset.is_some() {
                cursor.position += 1;
            }
            offset
        });
        next.map(|offset| read(self.files.for_catalog(catalog), offset))
            .transpose()
    }

    /// All fields in directory order.
    pub fn fields(&mut self) -> Result<Vec<FieldDef>> {
        let result = self.collect_entries(Catalog::Field, schema::read_field);
        self.track(result)
    }

    /// All records in directory order.
    pub fn records(&mut self) -> Result<Vec<RecordDef>> {
        let result = self.collect_entries(Catalog::Record, schema::read_record);
        self.track(result)
    }

    /// All table definitions in directory order.
    pub fn table_defs(&mut self) -> Result<Vec<TableDef>> {
        let result = self.collect_entries(Catalog::TableDef, schema::read_table_def);
        self.track(result)
    }

    /// All table instances in directory order.
    pub fn instances(&mut self) -> Result<Vec<InstanceInfo>> {
        let result = self.collect_entries(Catalog::Instance, instance::read_instance);
        self.track(result)
    }

    /// Restarts field enumeration and returns the first field.
    pub fn first_field(&mut self) -> Result<Option<FieldDef>> {
        let result = self.step_cursor(Catalog::Field, true, schema::read_field);
        self.track(result)
    }

    /// Next field of the enumeration, `None` after the last.
    pub fn next_field(&mut self) -> Result<Option<FieldDef>> {
        let result = self.step_cursor(Catalog::Field, false, schema::read_field);
        self.track(result)
    }

    /// Restarts record enumeration and returns the first record.
    pub fn first_record(&mut self) -> Result<Option<RecordDef>> {
        let result = self.step_cursor(Catalog::Record, true, schema::read_record);
        self.track(result)
    }

    /// Next record of the enumeration.
    pub fn next_record(&mut self) -> Result<Option<RecordDef>> {
        let result = self.step_cursor(Catalog::Record, false, schema::read_record);
        self.track(result)
    }

    /// Restarts table definition enumeration.
    pub fn first_table_def(&mut self) -> Result<Option<TableDef>> {
        let result = self.step_cursor(Catalog::TableDef, true, schema::read_table_def);
        self.track(result)
    }

    /// Next table definition of the enumeration.
    pub fn next_table_def(&mut self) -> Result<Option<TableDef>> {
        let result = self.step_cursor(Catalog::TableDef, false, schema::read_table_def);
        self.track(result)
    }

    /// Restarts instance enumeration.
    pub fn first_instance(&mut self) -> Result<Option<InstanceInfo>> {
        let result = self.step_cursor(Catalog::Instance, true, instance::read_instance);
        self.track(result)
    }

    /// Next instance of the enumeration.
    pub fn next_instance(&mut self) -> Result<Option<InstanceInfo>> {
        let result = self.step_cursor(Catalog::Instance, false, instance::read_instance);
        self.track(result)
    }
}
