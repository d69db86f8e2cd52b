//! NEFIS - self-describing tabular binary store
//!
//! A store is a pair of files: a definition file holding the schema
//! catalogs (fields, records, table definitions) and a data file holding
//! table instances and their values. Both can also share one merged file.
//!
//! # Components
//!
//! - [`Store`]: one open store; definitions, strided element access,
//!   attributes and catalog inquiry
//! - [`StoreRegistry`]: integer handles over many open stores
//! - [`format`]: header layout, byte-order codec and on-disk entry sizes
//! - [`catalog`]: hash directory and the schema and instance catalogs
//! - [`array`]: sparse growable index, strided access plans, layout cache
//!
//! # Example
//!
//! ```rust,ignore
//! use nefis::{AccessMode, Coding, ElementType, FieldDef, Selector, Store, TableDef};
//!
//! let mut store = Store::create_or_open("flow.dat", "flow.def", Coding::Neutral, AccessMode::Create)?;
//!
//! // A 3x4 grid of depths per time step; time is the growable dimension.
//! store.define_field(&FieldDef::new("DEPTH", ElementType::Real, 4).with_dims(&[3, 4]))?;
//! store.define_record("MAP", &["DEPTH"])?;
//! store.define_table_def(&TableDef::new("map-series", "MAP", &[0]))?;
//! store.define_instance("map-series", "map-series")?;
//!
//! let depths = vec![0.5f32; 12];
//! store.put_values("map-series", "DEPTH", &[Selector::single(1)], &[1], &depths)?;
//! store.put_values("map-series", "DEPTH", &[Selector::single(2)], &[1], &depths)?;
//! assert_eq!(store.max_index("map-series")?, 2);
//!
//! let back: Vec<f32> = store.get_values("map-series", "DEPTH", &[Selector::range(1, 2)], &[1])?;
//! assert_eq!(back.len(), 24);
//! store.close()?;
//! ```

#![deny(missing_docs)]

pub mod array;
pub mod catalog;
pub mod config;
pub mod error;
pub mod file;
pub mod format;
pub mod registry;
pub mod store;

pub use array::Selector;
pub use catalog::{AttributeKind, AttributeValue, FieldDef, InstanceInfo, RecordDef, TableDef};
pub use config::{AccessMode, StoreConfig};
pub use error::{ErrorReport, NefisError, Result};
pub use format::{Coding, Element, ElementType, FormatVersion};
pub use registry::{StoreHandle, StoreRegistry, MAX_OPEN_STORES};
pub use store::Store;
