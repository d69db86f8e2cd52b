//! Catalogs stored in the hash directory: schema definitions and table instances.

pub mod directory;
pub mod entry;
pub mod instance;
pub mod schema;

pub use directory::{hash_key, Catalog, Directory};
pub use instance::{AttributeKind, AttributeValue, InstanceInfo, InstanceRegion};
pub use schema::{FieldDef, RecordDef, TableDef};
