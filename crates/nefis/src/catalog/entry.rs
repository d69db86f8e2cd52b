//! Fixed-layout catalog entry encoding.
//!
//! Entries are built in memory with [`EntryWriter`] and decoded with
//! [`EntryReader`]; both walk the buffer sequentially in the file's byte order
//! and offset width.

use crate::error::{NefisError, Result};
use crate::format::{Codec, MAX_NAME, NIL};

/// Kind tag stored in every entry prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    /// Field definition.
    Field = 1,
    /// Record definition.
    Record = 2,
    /// Table definition.
    TableDef = 3,
    /// Table instance with only fixed dimensions.
    FixedInstance = 4,
    /// Table instance with a growable dimension.
    GrowableInstance = 5,
}

impl EntryKind {
    /// Converts the stored digit to an entry kind.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(EntryKind::Field),
            2 => Some(EntryKind::Record),
            3 => Some(EntryKind::TableDef),
            4 => Some(EntryKind::FixedInstance),
            5 => Some(EntryKind::GrowableInstance),
            _ => None,
        }
    }
}

/// Validates a catalog or attribute name and returns it space padded.
///
/// # Errors
///
/// Returns [`NefisError::InvalidName`] for empty, over-long or non-ASCII names.
pub fn pad_name(name: &str) -> Result<[u8; MAX_NAME]> {
    let invalid = |reason| NefisError::InvalidName {
        name: name.to_string(),
        reason,
    };
    let trimmed = name.trim_end();
    if trimmed.is_empty() {
        return Err(invalid("name is empty"));
    }
    if !trimmed.is_ascii() {
        return Err(invalid("name must be ASCII"));
    }
    if trimmed.len() > MAX_NAME {
        return Err(invalid("name is longer than 16 characters"));
    }
    let mut padded = [b' '; MAX_NAME];
    padded[..trimmed.len()].copy_from_slice(trimmed.as_bytes());
    Ok(padded)
}

/// Copies `text` into a space padded field of `width` bytes, truncating.
fn pad_text(text: &str, width: usize) -> Vec<u8> {
    let mut out = vec![b' '; width];
    let bytes = text.as_bytes();
    let n = bytes.len().min(width);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Decodes a space padded text field.
pub fn unpad(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end().to_string()
}

/// Sequential writer for one entry.
pub struct EntryWriter {
    buf: Vec<u8>,
    pos: usize,
    codec: Codec,
}

impl EntryWriter {
    /// Starts an entry of `len` bytes and writes its prefix with an unset
    /// `next` offset.
    pub fn new(codec: Codec, kind: EntryKind, name: &[u8; MAX_NAME], len: usize, rest: u64) -> Self {
        let mut writer = Self {
            buf: vec![b' '; len],
            pos: 0,
            codec,
        };
        writer.offset(NIL);
        writer.offset(rest);
        let tag_width = codec.version().tag_width();
        let mut tag = vec![b' '; tag_width];
        tag[tag_width - 1] = b'0' + kind as u8;
        writer.bytes(&tag);
        writer.bytes(name);
        writer
    }

    /// Writes an offset-width integer.
    pub fn offset(&mut self, value: u64) {
        let width = self.codec.version().offset_width();
        self.codec
            .write_offset(&mut self.buf[self.pos..self.pos + width], value);
        self.pos += width;
    }

    /// Writes a 4-byte unsigned integer.
    pub fn u32(&mut self, value: u32) {
        self.codec.write_u32(&mut self.buf[self.pos..self.pos + 4], value);
        self.pos += 4;
    }

    /// Writes a 4-byte signed integer.
    pub fn i32(&mut self, value: i32) {
        self.codec.write_i32(&mut self.buf[self.pos..self.pos + 4], value);
        self.pos += 4;
    }

    /// Writes a 4-byte float.
    pub fn f32(&mut self, value: f32) {
        self.codec.write_f32(&mut self.buf[self.pos..self.pos + 4], value);
        self.pos += 4;
    }

    /// Writes raw bytes.
    pub fn bytes(&mut self, data: &[u8]) {
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
    }

    /// Writes space padded text of exactly `width` bytes.
    pub fn text(&mut self, text: &str, width: usize) {
        let padded = pad_text(text, width);
        self.bytes(&padded);
    }

    /// Skips `n` bytes, leaving them blank.
    pub fn skip(&mut self, n: usize) {
        self.pos += n;
    }

    /// Returns the encoded entry.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Sequential reader for one entry.
pub struct EntryReader<'a> {
    buf: &'a [u8],
    pos: usize,
    codec: Codec,
}

impl<'a> EntryReader<'a> {
    /// Starts reading after the prefix, returning the reader and the entry name.
    pub fn new(codec: Codec, buf: &'a [u8]) -> (Self, String) {
        let name_at = codec.version().name_offset();
        let name = unpad(&buf[name_at..name_at + MAX_NAME]);
        let reader = Self {
            buf,
            pos: name_at + MAX_NAME,
            codec,
        };
        (reader, name)
    }

    /// Reads an offset-width integer.
    pub fn offset(&mut self) -> u64 {
        let width = self.codec.version().offset_width();
        let value = self.codec.read_offset(&self.buf[self.pos..self.pos + width]);
        self.pos += width;
        value
    }

    /// Reads a 4-byte unsigned integer.
    pub fn u32(&mut self) -> u32 {
        let value = self.codec.read_u32(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        value
    }

    /// Reads a 4-byte signed integer.
    pub fn i32(&mut self) -> i32 {
        let value = self.codec.read_i32(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        value
    }

    /// Reads a 4-byte float.
    pub fn f32(&mut self) -> f32 {
        let value = self.codec.read_f32(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        value
    }

    /// Reads space padded text of `width` bytes.
    pub fn text(&mut self, width: usize) -> String {
        let value = unpad(&self.buf[self.pos..self.pos + width]);
        self.pos += width;
        value
    }

    /// Current position inside the entry.
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Reads the `next` offset and kind tag of an entry prefix.
pub fn read_prefix(codec: Codec, prefix: &[u8]) -> (u64, Option<EntryKind>) {
    let width = codec.version().offset_width();
    let next = codec.read_offset(&prefix[..width]);
    let tag_at = 2 * width;
    let tag = &prefix[tag_at..tag_at + codec.version().tag_width()];
    let kind = std::str::from_utf8(tag)
        .ok()
        .and_then(|t| t.trim().parse::<u8>().ok())
        .and_then(EntryKind::from_u8);
    (next, kind)
}
