//! Numbered store handles for callers that address stores by integer.
//!
//! ```text
//! StoreRegistry
//! ├── slot 0: Some(Store)   <- StoreHandle(0)
//! ├── slot 1: None          (closed, reused by the next open)
//! └── slot 2: Some(Store)   <- StoreHandle(2)
//! ```
//!
//! A file may be open through at most one handle at a time.

use crate::config::StoreConfig;
use crate::error::{ErrorReport, NefisError, Result};
use crate::store::{file_identity, Store};
use std::path::Path;
use tracing::{debug, warn};

/// Maximum number of stores open at once.
pub const MAX_OPEN_STORES: usize = 512;

/// Opaque handle to a store owned by a [`StoreRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreHandle(usize);

impl StoreHandle {
    /// Numeric value of the handle.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// Owner of all stores opened by handle.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    slots: Vec<Option<Store>>,
    last_error: Option<ErrorReport>,
}

impl StoreRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stores currently open.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Opens a store and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::TooManyStores`] when [`MAX_OPEN_STORES`] are
    /// open, [`NefisError::AlreadyOpen`] if either file is open through
    /// another handle, or any error of [`Store::open_with_config`].
    pub fn open(
        &mut self,
        data_path: impl AsRef<Path>,
        def_path: impl AsRef<Path>,
        config: StoreConfig,
    ) -> Result<StoreHandle> {
        let result = self.open_inner(data_path.as_ref(), def_path.as_ref(), config);
        self.record(result)
    }

    fn open_inner(
        &mut self,
        data_path: &Path,
        def_path: &Path,
        config: StoreConfig,
    ) -> Result<StoreHandle> {
        if self.open_count() >= MAX_OPEN_STORES {
            return Err(NefisError::TooManyStores(MAX_OPEN_STORES));
        }
        for path in [data_path, def_path] {
            let identity = file_identity(path);
            let taken = self
                .slots
                .iter()
                .flatten()
                .any(|store| store.paths().contains(&identity));
            if taken {
                return Err(NefisError::AlreadyOpen(path.to_path_buf()));
            }
        }

        let store = Store::open_with_config(data_path, def_path, config)?;
        let handle = match self.slots.iter().position(Option::is_none) {
            Some(free) => {
                self.slots[free] = Some(store);
                StoreHandle(free)
            }
            None => {
                self.slots.push(Some(store));
                StoreHandle(self.slots.len() - 1)
            }
        };
        debug!(handle = handle.0, "registered store");
        Ok(handle)
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.last_error = Some(ErrorReport::from(e));
        }
        result
    }

    fn slot(&self, handle: StoreHandle) -> Result<&Store> {
        self.slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(NefisError::UnknownHandle(handle.0))
    }

    /// Shared access to an open store.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::UnknownHandle`] for a closed or foreign handle.
    pub fn get(&self, handle: StoreHandle) -> Result<&Store> {
        self.slot(handle)
    }

    /// Exclusive access to an open store.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::UnknownHandle`] for a closed or foreign handle.
    pub fn get_mut(&mut self, handle: StoreHandle) -> Result<&mut Store> {
        let found = self.slots.get_mut(handle.0).and_then(Option::as_mut);
        match found {
            Some(store) => Ok(store),
            None => {
                let err = NefisError::UnknownHandle(handle.0);
                self.last_error = Some(ErrorReport::from(&err));
                Err(err)
            }
        }
    }

    /// Closes one store. Closing an already closed handle does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::UnknownHandle`] for a handle this registry never
    /// issued, or the error of the final flush.
    pub fn close(&mut self, handle: StoreHandle) -> Result<()> {
        let result = match self.slots.get_mut(handle.0) {
            None => Err(NefisError::UnknownHandle(handle.0)),
            Some(slot) => match slot.take() {
                Some(store) => store.close(),
                None => Ok(()),
            },
        };
        self.record(result)
    }

    /// Closes every open store, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn close_all(&mut self) -> Result<()> {
        let mut first = None;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(store) = slot.take() {
                if let Err(e) = store.close() {
                    warn!(handle = index, "Failed to close store: {:?}", e);
                    first.get_or_insert(e);
                }
            }
        }
        let result = first.map_or(Ok(()), Err);
        self.record(result)
    }

    /// Most recent failure of the store behind `handle` or of the registry
    /// itself, whichever happened last.
    pub fn last_error(&self, handle: StoreHandle) -> Option<&ErrorReport> {
        let store = self.slot(handle).ok().and_then(Store::last_error);
        match (store, self.last_error.as_ref()) {
            (Some(a), Some(b)) => Some(if a.sequence > b.sequence { a } else { b }),
            (a, b) => a.or(b),
        }
    }
}
