//! Error and Result types for NEFIS store operations.
//!
//! Every error carries a stable four-digit numeric code (see
//! [`NefisError::code`]) so that callers which only understand
//! `(code, message)` pairs can keep using them through [`ErrorReport`].

use crate::catalog::{AttributeKind, Catalog};
use crate::format::ElementType;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// A convenience `Result` type for NEFIS operations.
pub type Result<T> = std::result::Result<T, NefisError>;

/// The error type for NEFIS store operations.
#[derive(Debug, Error)]
pub enum NefisError {
    /// A name is empty, too long or contains non-ASCII bytes.
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// An entry with this name already exists in the catalog.
    #[error("{catalog} '{name}' already exists")]
    DuplicateName {
        /// Catalog the insert was attempted in.
        catalog: Catalog,
        /// Conflicting name.
        name: String,
    },

    /// A referenced entry does not exist in the catalog.
    #[error("{catalog} '{name}' does not exist")]
    UndefinedName {
        /// Catalog that was searched.
        catalog: Catalog,
        /// Name that was not found.
        name: String,
    },

    /// The field is defined but not part of the instance's record.
    #[error("Field '{field}' is not part of record '{record}'")]
    FieldNotInRecord {
        /// Field name.
        field: String,
        /// Record name.
        record: String,
    },

    /// Dimension count outside `[1, 5]`.
    #[error("Number of dimensions not within the range [1,5]: '{name}' has {ndim}")]
    InvalidDimensions {
        /// Field or table definition name.
        name: String,
        /// Requested dimension count.
        ndim: usize,
    },

    /// A dimension extent that is not allowed at that position.
    #[error("Invalid extent {extent} for dimension {dim} of '{name}'")]
    InvalidExtent {
        /// Field or table definition name.
        name: String,
        /// 1-based dimension number.
        dim: usize,
        /// Rejected extent.
        extent: u32,
    },

    /// More than one growable dimension in a table definition.
    #[error("Table definition '{name}' has {count} growable dimensions, at most one is allowed")]
    GrowableDimensions {
        /// Table definition name.
        name: String,
        /// Number of zero extents given.
        count: usize,
    },

    /// Element type and width combination is not supported.
    #[error("Unsupported element: {element_type} with {bytes} bytes per value")]
    UnsupportedElement {
        /// Element type.
        element_type: ElementType,
        /// Requested bytes per single value.
        bytes: u32,
    },

    /// Element type tag is not one of the known types.
    #[error("Unknown element type '{0}'")]
    UnknownElementType(String),

    /// Axis order is not a permutation of the table dimensions.
    #[error("Invalid axis order {order:?} for a table with {ndim} dimensions")]
    InvalidAxisOrder {
        /// Requested order.
        order: Vec<usize>,
        /// Table dimension count.
        ndim: usize,
    },

    /// Number of selectors does not match the table dimension count.
    #[error("Expected {expected} axis selectors, got {actual}")]
    SelectorCount {
        /// Table dimension count.
        expected: usize,
        /// Selectors given.
        actual: usize,
    },

    /// Selector start lies after its stop.
    #[error("Axis {axis}: start {start} is greater than stop {stop}")]
    StartAfterStop {
        /// Caller axis (0-based).
        axis: usize,
        /// Selector start.
        start: u32,
        /// Selector stop.
        stop: u32,
    },

    /// Selector step is zero.
    #[error("Axis {axis}: step must be at least 1")]
    InvalidStep {
        /// Caller axis (0-based).
        axis: usize,
    },

    /// Selector start is zero (indices are 1-based).
    #[error("Axis {axis}: start must be at least 1")]
    StartBelowOne {
        /// Caller axis (0-based).
        axis: usize,
    },

    /// Selector stop beyond the declared extent of a fixed dimension.
    #[error("Axis {axis}: stop {stop} exceeds dimension extent {extent}")]
    StopBeyondExtent {
        /// Caller axis (0-based).
        axis: usize,
        /// Selector stop.
        stop: u32,
        /// Declared extent.
        extent: u32,
    },

    /// Caller buffer smaller than the selection.
    #[error("Buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall {
        /// Bytes required by the selection.
        needed: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// Growable index that has never been written.
    #[error("Index {index} of table instance '{instance}' has never been written")]
    IndexNotWritten {
        /// Table instance name.
        instance: String,
        /// 1-based growable index.
        index: u64,
    },

    /// Growable index does not fit in the sparse index.
    #[error("Index {0} exceeds the growable dimension range")]
    IndexOutOfRange(u64),

    /// Named attribute absent on the instance.
    #[error("Attribute '{name}' not found on table instance '{instance}'")]
    AttributeNotFound {
        /// Table instance name.
        instance: String,
        /// Attribute name.
        name: String,
    },

    /// All attribute slots of one kind are taken.
    #[error("All {kind} attribute slots of table instance '{instance}' are in use")]
    AttributeSlotsFull {
        /// Table instance name.
        instance: String,
        /// Attribute kind.
        kind: AttributeKind,
    },

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// File header does not carry a NEFIS banner.
    #[error("Unrecognized file header in {}", .path.display())]
    UnrecognizedHeader {
        /// File that was opened.
        path: PathBuf,
    },

    /// NEFIS banner with an unknown version token.
    #[error("Unsupported file version in {}: {header:?}", .path.display())]
    UnsupportedVersion {
        /// File that was opened.
        path: PathBuf,
        /// Header text.
        header: String,
    },

    /// File is a NEFIS file of the wrong kind.
    #[error("{} is not a {expected} file", .path.display())]
    WrongFileKind {
        /// File that was opened.
        path: PathBuf,
        /// Kind that was expected.
        expected: &'static str,
    },

    /// Fewer bytes read or written than requested.
    #[error("Short transfer at offset {offset}: expected {expected} bytes, got {actual}")]
    Truncated {
        /// File offset of the transfer.
        offset: u64,
        /// Requested length.
        expected: usize,
        /// Transferred length.
        actual: usize,
    },

    /// Mutation attempted on a read-only store.
    #[error("Store is opened read-only")]
    ReadOnly,

    /// Access mode character not one of `c`, `u`, `r`.
    #[error("Invalid access mode '{0}'")]
    InvalidAccessMode(char),

    /// Byte size of a definition, a region or a selection exceeds 64 bits.
    #[error("Size of '{name}' exceeds the addressable range")]
    SizeOverflow {
        /// Field, record, table or instance name.
        name: String,
    },

    /// Coding character not one of `B`, `L`, `N`, `H`.
    #[error("Invalid coding '{0}'")]
    InvalidCoding(char),

    /// New end-of-file would not be strictly greater than the old one.
    #[error("File has reached its maximum size: eof {eof}, requested {requested} more bytes")]
    EofOverflow {
        /// Current end-of-file.
        eof: u64,
        /// Requested extension.
        requested: u64,
    },

    /// Registry is full.
    #[error("Too many open stores, at most {0} are allowed")]
    TooManyStores(usize),

    /// File is already open in the registry.
    #[error("File {} is already open", .0.display())]
    AlreadyOpen(PathBuf),

    /// Handle unknown to the registry.
    #[error("Unknown store handle {0}")]
    UnknownHandle(usize),
}

impl NefisError {
    /// Returns the stable numeric code of this error.
    pub fn code(&self) -> i32 {
        match self {
            NefisError::InvalidName { .. } => 5000,
            NefisError::DuplicateName { catalog, .. } => match catalog {
                Catalog::Field => 5007,
                Catalog::Record => 5010,
                Catalog::TableDef => 5014,
                Catalog::Instance => 5019,
            },
            NefisError::UndefinedName { catalog, .. } => match catalog {
                Catalog::Field => 5009,
                Catalog::Record => 5013,
                Catalog::TableDef => 5017,
                Catalog::Instance => 6004,
            },
            NefisError::FieldNotInRecord { .. } => 6005,
            NefisError::InvalidDimensions { .. }
            | NefisError::InvalidExtent { .. }
            | NefisError::SizeOverflow { .. } => 5001,
            NefisError::UnsupportedElement { .. } => 5002,
            NefisError::UnknownElementType(_) => 5006,
            NefisError::GrowableDimensions { .. } => 5020,
            NefisError::InvalidAxisOrder { .. } | NefisError::SelectorCount { .. } => 3000,
            NefisError::StartAfterStop { .. } => 3001,
            NefisError::InvalidStep { .. } => 3002,
            NefisError::StartBelowOne { .. } => 3003,
            NefisError::StopBeyondExtent { .. } => 3004,
            NefisError::BufferTooSmall { .. } => 3005,
            NefisError::IndexNotWritten { .. } => 3006,
            NefisError::IndexOutOfRange(_) => 3007,
            NefisError::AttributeNotFound { .. } => 6015,
            NefisError::AttributeSlotsFull { .. } => 6010,
            NefisError::Io(_) => 8000,
            NefisError::UnrecognizedHeader { .. } => 8009,
            NefisError::UnsupportedVersion { .. } => 8032,
            NefisError::WrongFileKind { .. } => 8016,
            NefisError::Truncated { .. } => 8030,
            NefisError::ReadOnly => 8031,
            NefisError::InvalidAccessMode(_) => 8029,
            NefisError::InvalidCoding(_) => 8028,
            NefisError::EofOverflow { .. } => 5024,
            NefisError::TooManyStores(_) => 8003,
            NefisError::AlreadyOpen(_) => 8001,
            NefisError::UnknownHandle(_) => 8004,
        }
    }

    /// Returns `true` for errors caused by a name already present in a catalog.
    pub fn is_name_conflict(&self) -> bool {
        matches!(self, NefisError::DuplicateName { .. })
    }

    /// Returns `true` for errors caused by a missing catalog entry or attribute.
    pub fn is_undefined_reference(&self) -> bool {
        matches!(
            self,
            NefisError::UndefinedName { .. }
                | NefisError::FieldNotInRecord { .. }
                | NefisError::AttributeNotFound { .. }
        )
    }

    /// Returns `true` for capacity exhaustion errors.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            NefisError::AttributeSlotsFull { .. } | NefisError::TooManyStores(_)
        )
    }
}

static REPORT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// The `(code, message)` pair recorded for the most recent failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// Numeric error code.
    pub code: i32,
    /// Human readable message.
    pub message: String,
    /// Process-wide order of the failure; later reports compare greater.
    pub sequence: u64,
}

impl From<&NefisError> for ErrorReport {
    fn from(err: &NefisError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            sequence: REPORT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NEFIS error {}: {}", self.code, self.message)
    }
}
