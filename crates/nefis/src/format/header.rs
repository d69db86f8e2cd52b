//! File header: banner text, kind and version detection, byte-order flag.
//!
//! ```text
//! ┌──────────────────────────────────────────────┬──────┐
//! │ banner text, space padded                     │ flag │
//! │ (59 bytes, 127 for a merged file)             │ (1)  │
//! ├───────────────────────────────────────────────┴──────┤
//! │ end-of-file offset                                   │
//! ├──────────────────────────────────────────────────────┤
//! │ hash buckets, 997 per catalog                        │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::error::{NefisError, Result};
use crate::format::codec::{endian_from_flag, Coding, Endian};
use crate::format::layout::{FormatVersion, BUCKETS_PER_CATALOG};
use std::path::Path;

/// Header length of a data or definition file.
pub const SPLIT_HEADER_LEN: usize = 60;

/// Header length of a merged definition-and-data file.
pub const MERGED_HEADER_LEN: usize = 128;

const COMPANY: &str = "Deltares";
const CURRENT_TOKEN: &str = "5.00.00";
const LEGACY_TOKEN: &str = "Version 4.00.00";

/// Role of a backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Holds table instances and their values.
    Data,
    /// Holds fields, records and table definitions.
    Definition,
    /// Holds everything.
    Merged,
}

impl FileKind {
    /// Header length for this kind.
    pub const fn header_len(self) -> usize {
        match self {
            FileKind::Merged => MERGED_HEADER_LEN,
            FileKind::Data | FileKind::Definition => SPLIT_HEADER_LEN,
        }
    }

    /// Number of hash buckets stored after the header.
    pub const fn bucket_count(self) -> usize {
        match self {
            FileKind::Data => BUCKETS_PER_CATALOG,
            FileKind::Definition => 3 * BUCKETS_PER_CATALOG,
            FileKind::Merged => 4 * BUCKETS_PER_CATALOG,
        }
    }

    /// End-of-file of a freshly created file.
    pub const fn initial_eof(self, version: FormatVersion) -> u64 {
        (self.header_len() + version.offset_width() * (self.bucket_count() + 1)) as u64
    }

    pub(crate) fn describe(self) -> &'static str {
        match self {
            FileKind::Data => "NEFIS data",
            FileKind::Definition => "NEFIS definition",
            FileKind::Merged => "NEFIS definition and data",
        }
    }

    fn banner(self, version: FormatVersion) -> String {
        let token = match version {
            FormatVersion::Current => CURRENT_TOKEN,
            FormatVersion::Legacy => LEGACY_TOKEN,
        };
        match self {
            FileKind::Data => format!("{COMPANY}, NEFIS Data File; {token}"),
            FileKind::Definition => format!("{COMPANY}, NEFIS Definition File; {token}"),
            FileKind::Merged => match version {
                FormatVersion::Current => format!(
                    "{COMPANY}, NEFIS Definition and Data File; NEFIS Version {token}"
                ),
                FormatVersion::Legacy => {
                    format!("{COMPANY}, NEFIS Definition and Data File; {token}")
                }
            },
        }
    }

    fn detect(text: &str) -> Option<Self> {
        if text.contains("NEFIS Definition and Data File") {
            Some(FileKind::Merged)
        } else if text.contains("NEFIS Data File") || text.contains("DATA FILE") {
            Some(FileKind::Data)
        } else if text.contains("NEFIS Definition File") || text.contains("DEFN FILE") {
            Some(FileKind::Definition)
        } else {
            None
        }
    }
}

fn detect_version(text: &str) -> Option<FormatVersion> {
    if text.contains("Versie 1.") || text.contains("File; Version 4.") {
        Some(FormatVersion::Legacy)
    } else if text.contains("File; 5.") || text.contains("NEFIS Version 5.") {
        Some(FormatVersion::Current)
    } else {
        None
    }
}

/// Decoded file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Role of the file.
    pub kind: FileKind,
    /// Format version.
    pub version: FormatVersion,
    /// Byte order of all stored integers and values.
    pub endian: Endian,
    /// Banner text without padding and flag.
    pub text: String,
}

impl FileHeader {
    /// Builds the header of a new file.
    pub fn create(kind: FileKind, version: FormatVersion, coding: Coding) -> Result<(Self, Vec<u8>)> {
        let (endian, flag) = coding.resolve(version)?;
        let text = kind.banner(version);
        let len = kind.header_len();
        let mut bytes = vec![b' '; len];
        let n = text.len().min(len - 1);
        bytes[..n].copy_from_slice(&text.as_bytes()[..n]);
        bytes[len - 1] = flag;
        let header = Self {
            kind,
            version,
            endian,
            text,
        };
        Ok((header, bytes))
    }

    /// Parses the first bytes of an existing file.
    ///
    /// `prefix` must hold at least [`SPLIT_HEADER_LEN`] bytes; for a merged
    /// file the flag is taken from byte 127, so 128 bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the banner is not a NEFIS banner, if the version
    /// token is unknown or if the byte-order flag is invalid.
    pub fn parse(prefix: &[u8], path: &Path) -> Result<Self> {
        let unrecognized = || NefisError::UnrecognizedHeader {
            path: path.to_path_buf(),
        };
        if prefix.len() < SPLIT_HEADER_LEN {
            return Err(unrecognized());
        }
        let short = String::from_utf8_lossy(&prefix[..SPLIT_HEADER_LEN - 1]);
        let mut kind = FileKind::detect(&short);
        // The merged banner is longer than a split header.
        if kind.is_none() || prefix.len() >= MERGED_HEADER_LEN {
            let long_len = prefix.len().min(MERGED_HEADER_LEN) - 1;
            let long = String::from_utf8_lossy(&prefix[..long_len]);
            if let Some(FileKind::Merged) = FileKind::detect(&long) {
                kind = Some(FileKind::Merged);
            }
        }
        let kind = kind.ok_or_else(unrecognized)?;
        let len = kind.header_len();
        if prefix.len() < len {
            return Err(unrecognized());
        }
        let text = String::from_utf8_lossy(&prefix[..len - 1]).trim_end().to_string();
        let version = detect_version(&text).ok_or_else(|| NefisError::UnsupportedVersion {
            path: path.to_path_buf(),
            header: text.clone(),
        })?;
        let endian = endian_from_flag(prefix[len - 1], version).ok_or_else(unrecognized)?;
        Ok(Self {
            kind,
            version,
            endian,
            text,
        })
    }
}
