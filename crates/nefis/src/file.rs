//! Raw positioned file I/O for one backing file.
//!
//! A [`BackingFile`] owns the open file together with all of its mutable
//! bookkeeping: the end-of-file counter that every allocation bumps, and the
//! hash bucket heads of every catalog stored in it. Both live in memory while
//! the file is open and are written back to their fixed place after the header
//! by [`BackingFile::flush`].

use crate::error::{NefisError, Result};
use crate::format::{Codec, Coding, FileHeader, FileKind, FormatVersion, TRIE_FANOUT, NIL};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// One open data, definition or merged file.
#[derive(Debug)]
pub struct BackingFile {
    file: File,
    path: PathBuf,
    header: FileHeader,
    codec: Codec,
    eof: u64,
    buckets: Vec<u64>,
    writable: bool,
    dirty: bool,
}

impl BackingFile {
    /// Creates (or truncates) a file and writes an empty header and bucket table.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn create(
        path: &Path,
        kind: FileKind,
        version: FormatVersion,
        coding: Coding,
    ) -> Result<Self> {
        let (header, bytes) = FileHeader::create(kind, version, coding)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut backing = Self {
            file,
            path: path.to_path_buf(),
            codec: Codec::new(header.endian, version),
            header,
            eof: kind.initial_eof(version),
            buckets: vec![NIL; kind.bucket_count()],
            writable: true,
            dirty: true,
        };
        backing.write_at(0, &bytes)?;
        backing.flush()?;

        debug!(
            path = %path.display(),
            ?kind,
            ?version,
            endian = ?backing.codec.endian(),
            "created NEFIS file"
        );
        Ok(backing)
    }

    /// Opens an existing file and loads its end-of-file counter and buckets.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, its header is not recognized
    /// or the bucket table is truncated.
    pub fn open(path: &Path, writable: bool) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(writable).open(path)?;

        let mut prefix = Vec::with_capacity(FileKind::Merged.header_len());
        (&mut file)
            .take(FileKind::Merged.header_len() as u64)
            .read_to_end(&mut prefix)?;
        let header = FileHeader::parse(&prefix, path)?;
        let codec = Codec::new(header.endian, header.version);
        let kind = header.kind;

        let mut backing = Self {
            file,
            path: path.to_path_buf(),
            header,
            codec,
            eof: 0,
            buckets: Vec::new(),
            writable,
            dirty: false,
        };

        let width = codec.version().offset_width();
        let mut table = vec![0u8; width * (kind.bucket_count() + 1)];
        backing.read_at(kind.header_len() as u64, &mut table)?;
        let mut slots = table.chunks_exact(width).map(|slot| codec.read_offset(slot));
        backing.eof = slots.next().unwrap_or(NIL);
        backing.buckets = slots.collect();

        debug!(
            path = %path.display(),
            ?kind,
            version = ?codec.version(),
            endian = ?codec.endian(),
            eof = backing.eof,
            "opened NEFIS file"
        );
        Ok(backing)
    }

    /// Path the file was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decoded header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Codec for this file's byte order and offset width.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Format version.
    pub fn version(&self) -> FormatVersion {
        self.codec.version()
    }

    /// Current end-of-file counter.
    pub fn eof(&self) -> u64 {
        self.eof
    }

    /// Whether the file accepts writes.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Head of hash bucket `index` (over all catalogs stored in this file).
    pub fn bucket(&self, index: usize) -> u64 {
        self.buckets.get(index).copied().unwrap_or(NIL)
    }

    /// Sets the head of hash bucket `index`.
    pub fn set_bucket(&mut self, index: usize, offset: u64) {
        if let Some(slot) = self.buckets.get_mut(index) {
            *slot = offset;
            self.dirty = true;
        }
    }

    /// Bucket heads in `range`.
    pub fn buckets(&self, range: std::ops::Range<usize>) -> &[u64] {
        &self.buckets[range]
    }

    /// Reads exactly `buf.len()` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::Truncated`] if the file ends early.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled < buf.len() {
            return Err(NefisError::Truncated {
                offset,
                expected: buf.len(),
                actual: filled,
            });
        }
        Ok(())
    }

    /// Writes all of `data` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::ReadOnly`] for a read-only file.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(NefisError::ReadOnly);
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Reserves `len` bytes at the end of the file and returns their offset.
    ///
    /// Only the counter moves; the caller writes the bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NefisError::EofOverflow`] if the new end-of-file would not be
    /// strictly greater than the current one or exceeds the format's range.
    pub fn allocate(&mut self, len: u64) -> Result<u64> {
        if !self.writable {
            return Err(NefisError::ReadOnly);
        }
        let overflow = || NefisError::EofOverflow {
            eof: self.eof,
            requested: len,
        };
        let new_eof = self.eof.checked_add(len).ok_or_else(overflow)?;
        if new_eof <= self.eof || new_eof > self.version().max_eof() {
            return Err(overflow());
        }
        let offset = self.eof;
        self.eof = new_eof;
        self.dirty = true;
        trace!(offset, len, "allocated");
        Ok(offset)
    }

    /// Reserves `len` bytes and extends the physical file so they read as zero.
    ///
    /// # Errors
    ///
    /// See [`BackingFile::allocate`].
    pub fn allocate_zeroed(&mut self, len: u64) -> Result<u64> {
        let offset = self.allocate(len)?;
        if self.file.metadata()?.len() < self.eof {
            self.file.set_len(self.eof)?;
        }
        Ok(offset)
    }

    /// Reads one stored offset.
    pub fn read_offset_at(&mut self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        let width = self.version().offset_width();
        self.read_at(offset, &mut buf[..width])?;
        Ok(self.codec.read_offset(&buf[..width]))
    }

    /// Writes one stored offset.
    pub fn write_offset_at(&mut self, offset: u64, value: u64) -> Result<()> {
        let mut buf = [0u8; 8];
        let width = self.version().offset_width();
        self.codec.write_offset(&mut buf[..width], value);
        self.write_at(offset, &buf[..width])
    }

    /// Reads a 256-slot sparse index node.
    pub fn read_node(&mut self, offset: u64) -> Result<Vec<u64>> {
        let width = self.version().offset_width();
        let mut raw = vec![0u8; width * TRIE_FANOUT];
        self.read_at(offset, &mut raw)?;
        Ok(raw
            .chunks_exact(width)
            .map(|slot| self.codec.read_offset(slot))
            .collect())
    }

    /// Writes a 256-slot sparse index node.
    pub fn write_node(&mut self, offset: u64, node: &[u64]) -> Result<()> {
        let raw = self.encode_offsets(node);
        self.write_at(offset, &raw)
    }

    fn encode_offsets(&self, offsets: &[u64]) -> Vec<u8> {
        let width = self.version().offset_width();
        let mut raw = vec![0u8; width * offsets.len()];
        for (slot, value) in raw.chunks_exact_mut(width).zip(offsets) {
            self.codec.write_offset(slot, *value);
        }
        raw
    }

    /// Writes the end-of-file counter and bucket heads back to the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn flush(&mut self) -> Result<()> {
        if !self.writable || !self.dirty {
            return Ok(());
        }
        let mut table = Vec::with_capacity(self.buckets.len() + 1);
        table.push(self.eof);
        table.extend_from_slice(&self.buckets);
        let raw = self.encode_offsets(&table);
        let at = self.header.kind.header_len() as u64;
        self.write_at(at, &raw)?;
        self.file.flush()?;
        self.dirty = false;
        trace!(path = %self.path.display(), eof = self.eof, "flushed bucket table");
        Ok(())
    }
}

impl Drop for BackingFile {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush {} on drop: {:?}", self.path.display(), e);
        }
    }
}
