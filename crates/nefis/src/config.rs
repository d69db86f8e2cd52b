//! Store configuration.

use crate::error::{NefisError, Result};
use crate::format::{Coding, FormatVersion};

/// How the backing files are opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Create new files, truncating existing ones.
    Create,
    /// Open existing files for writing, creating missing ones.
    #[default]
    Update,
    /// Open existing files without write access.
    ReadOnly,
}

impl AccessMode {
    /// Parses the single-character access mode (`c`, `u`, `r`).
    pub fn from_char(c: char) -> Result<Self> {
        match c.to_ascii_lowercase() {
            'c' => Ok(AccessMode::Create),
            'u' => Ok(AccessMode::Update),
            'r' => Ok(AccessMode::ReadOnly),
            _ => Err(NefisError::InvalidAccessMode(c)),
        }
    }

    /// Whether the mode permits mutation.
    pub fn is_writable(self) -> bool {
        self != AccessMode::ReadOnly
    }
}

/// Configuration for opening a [`crate::Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Access mode.
    pub access: AccessMode,
    /// Byte order requested for newly created files. Existing files keep the
    /// order recorded in their header.
    pub coding: Coding,
    /// Format version of newly created files.
    pub format: FormatVersion,
    /// Memoize field layouts per handle.
    pub cache_metadata: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            access: AccessMode::default(),
            coding: Coding::default(),
            format: FormatVersion::default(),
            cache_metadata: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with the given access mode and coding.
    pub fn new(access: AccessMode, coding: Coding) -> Self {
        Self {
            access,
            coding,
            ..Self::default()
        }
    }

    /// Sets the format version used when files are created.
    pub fn with_format(mut self, format: FormatVersion) -> Self {
        self.format = format;
        self
    }

    /// Enables or disables the metadata cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_metadata = enabled;
        self
    }
}
