//! Byte-order codec.
//!
//! Each file declares the byte order of everything it stores. The codec reads
//! and writes catalog integers in that order and converts value buffers
//! between the file order and the host order, dispatching on the element
//! type: integers, logicals and reals swap whole width, complex values swap
//! each half and character data is never touched.

use crate::error::{NefisError, Result};
use crate::format::layout::{FormatVersion, NIL};
use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use std::fmt;
use std::sync::OnceLock;

/// Concrete byte order of a file or of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

static HOST_ENDIAN: OnceLock<Endian> = OnceLock::new();

impl Endian {
    /// Byte order of the running host, probed once from the layout of `1u32`.
    pub fn host() -> Self {
        *HOST_ENDIAN.get_or_init(|| {
            if 1u32.to_ne_bytes()[0] == 1 {
                Endian::Little
            } else {
                Endian::Big
            }
        })
    }

    /// The opposite byte order.
    pub fn opposite(self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        }
    }
}

/// Byte-order request used when creating a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coding {
    /// Format default: little endian for current files, big endian for legacy files.
    #[default]
    Neutral,
    /// Whatever the host uses.
    Native,
    /// Little endian.
    Little,
    /// Big endian.
    Big,
}

impl Coding {
    /// Parses the single-character coding flag (`N`, `H`, `L`, `B`).
    pub fn from_char(c: char) -> Result<Self> {
        match c.to_ascii_uppercase() {
            'N' => Ok(Coding::Neutral),
            'H' => Ok(Coding::Native),
            'L' => Ok(Coding::Little),
            'B' => Ok(Coding::Big),
            _ => Err(NefisError::InvalidCoding(c)),
        }
    }

    /// Resolves the request to the byte order and header flag of a new file.
    pub(crate) fn resolve(self, version: FormatVersion) -> Result<(Endian, u8)> {
        let host = Endian::host();
        match version {
            FormatVersion::Current => {
                let endian = match self {
                    Coding::Neutral | Coding::Little => Endian::Little,
                    Coding::Big => Endian::Big,
                    Coding::Native => host,
                };
                let flag = match endian {
                    Endian::Little => b'L',
                    Endian::Big => b'B',
                };
                Ok((endian, flag))
            }
            // Legacy files only know "neutral" (big endian) and "binary" (host order).
            FormatVersion::Legacy => match self {
                Coding::Neutral | Coding::Big => Ok((Endian::Big, b'N')),
                Coding::Native => Ok((host, b'B')),
                Coding::Little if host == Endian::Little => Ok((host, b'B')),
                Coding::Little => Err(NefisError::InvalidCoding('L')),
            },
        }
    }
}

/// Byte order implied by the flag stored in the last header byte.
pub(crate) fn endian_from_flag(flag: u8, version: FormatVersion) -> Option<Endian> {
    match (version, flag) {
        (FormatVersion::Current, b'L') => Some(Endian::Little),
        (FormatVersion::Current, b'B') => Some(Endian::Big),
        (FormatVersion::Legacy, b'N') => Some(Endian::Big),
        (FormatVersion::Legacy, b'B') => Some(Endian::host()),
        _ => None,
    }
}

/// Type tag of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Signed integer of 2, 4 or 8 bytes.
    Integer,
    /// IEEE float of 4 or 8 bytes.
    Real,
    /// Fixed-width character data.
    Character,
    /// Boolean stored as a 2 or 4 byte integer.
    Logical,
    /// Pair of IEEE floats, 8 or 16 bytes in total.
    Complex,
}

impl ElementType {
    /// The 8-character tag stored on disk.
    pub fn tag(self) -> &'static str {
        match self {
            ElementType::Integer => "INTEGER",
            ElementType::Real => "REAL",
            ElementType::Character => "CHARACTE",
            ElementType::Logical => "LOGICAL",
            ElementType::Complex => "COMPLEX",
        }
    }

    /// Parses a stored or user supplied tag, ignoring case and padding.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_uppercase();
        if tag.starts_with("CHARACTE") {
            return Some(ElementType::Character);
        }
        match tag.as_str() {
            "INTEGER" => Some(ElementType::Integer),
            "REAL" => Some(ElementType::Real),
            "LOGICAL" => Some(ElementType::Logical),
            "COMPLEX" => Some(ElementType::Complex),
            _ => None,
        }
    }

    /// Whether a single value of this type may be `bytes` wide.
    pub fn supports_width(self, bytes: u32) -> bool {
        match self {
            ElementType::Integer => matches!(bytes, 2 | 4 | 8),
            ElementType::Real => matches!(bytes, 4 | 8),
            ElementType::Character => bytes >= 1,
            ElementType::Logical => matches!(bytes, 2 | 4),
            ElementType::Complex => matches!(bytes, 8 | 16),
        }
    }

    /// Reverses the byte order of every value in `buf` in place.
    ///
    /// The swap is its own inverse, so the same call converts in both
    /// directions.
    pub fn swap_values(self, width: usize, buf: &mut [u8]) {
        let chunk = match self {
            ElementType::Character => return,
            ElementType::Complex => width / 2,
            ElementType::Integer | ElementType::Real | ElementType::Logical => width,
        };
        if chunk < 2 {
            return;
        }
        for value in buf.chunks_exact_mut(chunk) {
            value.reverse();
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementType::Character => "CHARACTER",
            other => other.tag(),
        })
    }
}

/// Reads and writes integers in a file's byte order and offset width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    endian: Endian,
    version: FormatVersion,
}

macro_rules! codec_rw {
    ($read:ident, $write:ident, $ty:ty) => {
        #[doc = concat!("Reads a `", stringify!($ty), "` in file order.")]
        pub fn $read(&self, buf: &[u8]) -> $ty {
            match self.endian {
                Endian::Little => LittleEndian::$read(buf),
                Endian::Big => BigEndian::$read(buf),
            }
        }

        #[doc = concat!("Writes a `", stringify!($ty), "` in file order.")]
        pub fn $write(&self, buf: &mut [u8], value: $ty) {
            match self.endian {
                Endian::Little => LittleEndian::$write(buf, value),
                Endian::Big => BigEndian::$write(buf, value),
            }
        }
    };
}

impl Codec {
    /// Creates a codec for a file with the given byte order and version.
    pub fn new(endian: Endian, version: FormatVersion) -> Self {
        Self { endian, version }
    }

    /// Byte order of the file.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Format version of the file.
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Whether values must be swapped between file and host.
    pub fn swaps(&self) -> bool {
        self.endian != Endian::host()
    }

    codec_rw!(read_u32, write_u32, u32);
    codec_rw!(read_i32, write_i32, i32);
    codec_rw!(read_f32, write_f32, f32);
    codec_rw!(read_u64, write_u64, u64);

    /// Reads an offset, widening legacy 32-bit offsets and mapping the
    /// on-disk sentinel to [`NIL`].
    pub fn read_offset(&self, buf: &[u8]) -> u64 {
        match self.version {
            FormatVersion::Legacy => match self.read_u32(buf) {
                u32::MAX => NIL,
                value => u64::from(value),
            },
            FormatVersion::Current => self.read_u64(buf),
        }
    }

    /// Writes an offset in the file's width.
    ///
    /// Legacy offsets are narrowed; allocation keeps them below `u32::MAX`.
    pub fn write_offset(&self, buf: &mut [u8], value: u64) {
        match self.version {
            FormatVersion::Legacy => {
                let narrow = if value == NIL { u32::MAX } else { value as u32 };
                self.write_u32(buf, narrow);
            }
            FormatVersion::Current => self.write_u64(buf, value),
        }
    }

    /// Converts a value buffer between file order and host order.
    pub fn convert_values(&self, element_type: ElementType, width: usize, buf: &mut [u8]) {
        if self.swaps() {
            element_type.swap_values(width, buf);
        }
    }
}

/// A host value type that can be moved through [`crate::Store::get_values`]
/// and [`crate::Store::put_values`].
pub trait Element: Copy + Default {
    /// Element type a field must have to hold this value.
    const ELEMENT_TYPE: ElementType;
    /// Bytes per value.
    const WIDTH: usize;

    /// Decodes one value from host-order bytes.
    fn from_host_bytes(buf: &[u8]) -> Self;

    /// Encodes one value into host-order bytes.
    fn to_host_bytes(self, buf: &mut [u8]);
}

macro_rules! impl_element {
    ($ty:ty, $kind:expr, $width:expr, $read:ident, $write:ident) => {
        impl Element for $ty {
            const ELEMENT_TYPE: ElementType = $kind;
            const WIDTH: usize = $width;

            fn from_host_bytes(buf: &[u8]) -> Self {
                NativeEndian::$read(buf)
            }

            fn to_host_bytes(self, buf: &mut [u8]) {
                NativeEndian::$write(buf, self)
            }
        }
    };
}

impl_element!(i16, ElementType::Integer, 2, read_i16, write_i16);
impl_element!(i32, ElementType::Integer, 4, read_i32, write_i32);
impl_element!(i64, ElementType::Integer, 8, read_i64, write_i64);
impl_element!(f32, ElementType::Real, 4, read_f32, write_f32);
impl_element!(f64, ElementType::Real, 8, read_f64, write_f64);
