//! # Logfile — append-only segment files
//!
//! One [`LogFile`] owns a single segment of a ShoalKV database: an
//! append-only file of back-to-back records with no padding, framing, or
//! checksums. Segments are named by their 16-digit zero-padded decimal id
//! and are immutable once a newer segment has become the append target.
//!
//! ## Record layout
//!
//! ```text
//! ┌──────────────────┬────────────────────┬───────────┬─────────────┐
//! │ key_size (u32 LE)│ value_size (u32 LE)│ key bytes │ value bytes │
//! └──────────────────┴────────────────────┴───────────┴─────────────┘
//! ```
//!
//! A record occupies `8 + key_size + value_size` bytes. The *item offset*
//! is the offset of `key_size`; the *value offset* is
//! `item_offset + 8 + key_size`.
//!
//! ## Durability
//!
//! Every successful [`LogFile::append`] has been fsynced before it
//! returns. Replay via [`LogFile::iter`] stops silently at the first
//! offset that does not decode as a complete record, so a record torn by
//! a crash mid-append is simply never observed.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bytes taken by the two length prefixes at the start of every record.
pub const RECORD_HEADER_BYTES: u64 = 8;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// A positional read hit end-of-file before `wanted` bytes arrived.
    #[error("short read at offset {offset}: wanted {wanted} bytes")]
    ShortRead { offset: u64, wanted: usize },
}

pub type Result<T> = std::result::Result<T, LogError>;

/// Formats a segment id as its on-disk file name.
pub fn segment_file_name(id: u32) -> String {
    format!("{id:016}")
}

/// One decoded record, as yielded by [`LogFile::iter`] and
/// [`LogFile::read_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Offset of the record's length prefixes within the segment.
    pub item_offset: u64,
    /// Offset of the first value byte within the segment.
    pub value_offset: u64,
}

/// An open segment file with a write cursor.
///
/// The cursor starts at zero on open; after replaying an existing
/// segment the engine adopts the iterator's final offset via
/// [`set_write_pos`](LogFile::set_write_pos). Appends go through the
/// owned handle; reads open their own handle per call so they never
/// share a seek cursor with the writer or with each other.
#[derive(Debug)]
pub struct LogFile {
    id: u32,
    path: PathBuf,
    file: File,
    write_pos: u64,
    max_size: u64,
}

impl LogFile {
    /// Opens segment `id` inside `dir`, creating the file if absent.
    pub fn open(dir: &Path, id: u32, max_size: u64) -> Result<Self> {
        let path = dir.join(segment_file_name(id));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        Ok(Self {
            id,
            path,
            file,
            write_pos: 0,
            max_size,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_pos(&self) -> u64 {
        self.write_pos
    }

    /// Cursor at or past the configured maximum size.
    ///
    /// Soft bound: the engine checks this before a write, never after,
    /// so a single append may push the cursor past the maximum.
    pub fn is_full(&self) -> bool {
        self.write_pos >= self.max_size
    }

    /// Appends one record at the write cursor and fsyncs it.
    ///
    /// Returns `(item_offset, value_offset)`. The cursor advances only
    /// after the record is durable; on any error it stays at the
    /// pre-write position.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(u64, u64)> {
        let item_offset = self.write_pos;

        let mut buf =
            Vec::with_capacity(RECORD_HEADER_BYTES as usize + key.len() + value.len());
        buf.write_u32::<LittleEndian>(key.len() as u32)?;
        buf.write_u32::<LittleEndian>(value.len() as u32)?;
        buf.extend_from_slice(key);
        buf.extend_from_slice(value);

        self.file.seek(SeekFrom::Start(item_offset))?;
        self.file.write_all(&buf)?;
        self.file.flush()?;
        self.file.sync_all()?;

        self.write_pos = item_offset + buf.len() as u64;
        let value_offset = item_offset + RECORD_HEADER_BYTES + key.len() as u64;
        Ok((item_offset, value_offset))
    }

    /// Reads exactly `len` bytes at `value_offset` into a fresh buffer.
    pub fn read_value(&self, value_offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(value_offset))?;
        let mut buf = vec![0u8; len];
        f.read_exact(&mut buf)
            .map_err(|e| at_offset(e, value_offset, len))?;
        Ok(buf)
    }

    /// Decodes the whole record whose length prefixes start at
    /// `item_offset`.
    pub fn read_item(&self, item_offset: u64) -> Result<Record> {
        let f = File::open(&self.path)?;
        let mut rdr = BufReader::new(f);
        rdr.seek(SeekFrom::Start(item_offset))?;
        read_record_at(&mut rdr, item_offset)
    }

    /// Replays the segment from offset zero.
    ///
    /// Iteration ends silently at the first offset that does not decode
    /// as a complete record (short prefix, short key or value, plain
    /// EOF). [`LogIter::pos`] then reports that offset, which the
    /// engine adopts as the segment's write cursor. Any other I/O
    /// failure mid-replay is yielded as an `Err` item and also ends
    /// the iteration; only a torn tail is swallowed.
    pub fn iter(&self) -> Result<LogIter> {
        let f = File::open(&self.path)?;
        Ok(LogIter {
            rdr: BufReader::new(f),
            pos: 0,
            done: false,
        })
    }

    /// Adopts `pos` as the write cursor after replay.
    ///
    /// Bytes past `pos` belong to a torn tail; the file is cut back so
    /// they cannot decode as records at a later open.
    pub fn set_write_pos(&mut self, pos: u64) -> Result<()> {
        if self.file.metadata()?.len() > pos {
            self.file.set_len(pos)?;
        }
        self.write_pos = pos;
        Ok(())
    }
}

/// Single-pass record iterator over one segment, starting at offset zero.
pub struct LogIter {
    rdr: BufReader<File>,
    pos: u64,
    done: bool,
}

impl LogIter {
    /// Offset of the first byte that did not decode as a complete record.
    pub fn pos(&self) -> u64 {
        self.pos
    }
}

impl Iterator for LogIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Result<Record>> {
        if self.done {
            return None;
        }
        match read_record_at(&mut self.rdr, self.pos) {
            Ok(rec) => {
                self.pos = rec.value_offset + rec.value.len() as u64;
                Some(Ok(rec))
            }
            // a record cut off by end-of-file is a torn tail, not an error
            Err(LogError::ShortRead { .. }) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn read_record_at<R: Read>(rdr: &mut R, item_offset: u64) -> Result<Record> {
    let key_size = rdr
        .read_u32::<LittleEndian>()
        .map_err(|e| at_offset(e, item_offset, 4))? as usize;
    let value_size = rdr
        .read_u32::<LittleEndian>()
        .map_err(|e| at_offset(e, item_offset + 4, 4))? as usize;

    let mut key = vec![0u8; key_size];
    rdr.read_exact(&mut key)
        .map_err(|e| at_offset(e, item_offset + RECORD_HEADER_BYTES, key_size))?;

    let value_offset = item_offset + RECORD_HEADER_BYTES + key_size as u64;
    let mut value = vec![0u8; value_size];
    rdr.read_exact(&mut value)
        .map_err(|e| at_offset(e, value_offset, value_size))?;

    Ok(Record {
        key,
        value,
        item_offset,
        value_offset,
    })
}

fn at_offset(e: io::Error, offset: u64, wanted: usize) -> LogError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        LogError::ShortRead { offset, wanted }
    } else {
        LogError::Io(e)
    }
}
