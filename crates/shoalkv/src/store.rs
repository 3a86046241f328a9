//! The storage engine: open/recovery, reads, writes, segment rollover.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use keydir::{DirEntry, KeyDir};
use logfile::LogFile;
use parking_lot::RwLock;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, StoreError};

/// Value recorded in the log when a key is removed. Replay drops a key
/// when it sees this value.
pub const TOMBSTONE: &[u8] = b"\0{shoal:tombstone}\0";

/// Second reserved value. Never written today; rejected on `put` so the
/// byte string stays available to the format.
pub const RESERVED_MARK: &[u8] = b"\0{shoal:reserved}\0";

/// An open ShoalKV database.
///
/// All methods take `&self`; the store is meant to be shared across
/// threads behind an `Arc`. Writes serialize on one engine-wide lock.
/// Reads take that lock shared, only long enough to resolve a segment
/// id to a file, and then read an immutable region of that file through
/// a private handle.
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
    config: Config,
    keydir: KeyDir,
    segments: RwLock<SegmentSet>,
}

/// Open segments by id plus the id currently receiving appends.
///
/// Writers hold the enclosing lock exclusively for the whole
/// check-full / rollover / append / index-update step; readers hold it
/// shared while resolving an id.
#[derive(Debug)]
struct SegmentSet {
    files: HashMap<u32, LogFile>,
    active: u32,
}

impl SegmentSet {
    fn active_file(&self) -> &LogFile {
        self.files.get(&self.active).expect("active segment is open")
    }

    fn active_file_mut(&mut self) -> &mut LogFile {
        self.files
            .get_mut(&self.active)
            .expect("active segment is open")
    }
}

impl Store {
    /// Opens the database in `dir`, creating the directory if needed.
    ///
    /// Recovery replays every segment in ascending id order: a tombstone
    /// drops its key from the directory, any other record overwrites the
    /// key's entry. Later writes therefore shadow earlier ones and the
    /// directory ends up describing the latest accepted write for every
    /// key. Each segment's write cursor is set to its replay iterator's
    /// final offset, which discards torn tails.
    ///
    /// An empty directory is a valid empty database; the first write
    /// creates segment 0. A file whose name is not a decimal segment id
    /// fails the open with [`StoreError::CorruptDirectory`].
    pub fn open(dir: impl AsRef<Path>, config: Config) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let id = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
                .ok_or_else(|| StoreError::CorruptDirectory(path.clone()))?;
            ids.push(id);
        }
        if ids.is_empty() {
            ids.push(0);
        }
        ids.sort_unstable();

        let keydir = KeyDir::new(config.num_shards);
        let mut files = HashMap::with_capacity(ids.len());
        for &id in &ids {
            let mut file = LogFile::open(&dir, id, config.max_log_file_size)?;
            let mut iter = file.iter()?;
            let mut replayed = 0u64;
            for rec in iter.by_ref() {
                let rec = rec?;
                if rec.value == TOMBSTONE {
                    keydir.remove(&rec.key);
                } else {
                    keydir.put(
                        &rec.key,
                        DirEntry {
                            file_id: id,
                            value_offset: rec.value_offset,
                            value_len: rec.value.len() as u32,
                        },
                    );
                }
                replayed += 1;
            }
            let cursor = iter.pos();
            file.set_write_pos(cursor)?;
            debug!(id, replayed, cursor, "segment replayed");
            files.insert(id, file);
        }

        let active = *ids.last().expect("segment id list is never empty");
        Ok(Self {
            dir,
            config,
            keydir,
            segments: RwLock::new(SegmentSet { files, active }),
        })
    }

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// Keys are non-empty byte strings; keys and values are each capped
    /// at `u32::MAX` bytes by the record format. The two reserved
    /// sentinel values are rejected with [`StoreError::ReservedValue`].
    ///
    /// The record is durable on disk before the in-memory directory is
    /// updated. A crash between the two loses only the directory entry,
    /// which the next open rebuilds from the log.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if value == TOMBSTONE || value == RESERVED_MARK {
            return Err(StoreError::ReservedValue);
        }
        let mut set = self.segments.write();
        let entry = self.append_locked(&mut set, key, value)?;
        self.keydir.put(key, entry);
        Ok(())
    }

    /// Returns the latest value stored under `key`, or `None` if the key
    /// is absent or was removed.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.keydir.get(key) else {
            return Ok(None);
        };
        let set = self.segments.read();
        let file = set
            .files
            .get(&entry.file_id)
            .expect("keydir entry points at an open segment");
        let value = file.read_value(entry.value_offset, entry.value_len as usize)?;
        Ok(Some(value))
    }

    /// Removes `key`, reporting whether it was present.
    ///
    /// A tombstone record is appended and fsynced before the key leaves
    /// the directory, so the deletion survives a crash. Readers racing
    /// this call may observe the key until the directory update lands.
    pub fn remove(&self, key: &[u8]) -> Result<bool> {
        let mut set = self.segments.write();
        if self.keydir.get(key).is_none() {
            return Ok(false);
        }
        self.append_locked(&mut set, key, TOMBSTONE)?;
        self.keydir.remove(key);
        Ok(true)
    }

    /// Reclaims space held by overwritten and deleted records.
    pub fn compact(&self) -> Result<()> {
        Err(StoreError::NotImplemented)
    }

    /// Consumes the store. Every accepted write is already on disk, so
    /// closing only drops the file handles.
    pub fn close(self) {}

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.keydir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keydir.is_empty()
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Appends one record to the active segment, rolling over first if
    /// it is full. Caller holds the write lock on `segments`.
    fn append_locked(&self, set: &mut SegmentSet, key: &[u8], value: &[u8]) -> Result<DirEntry> {
        if set.active_file().is_full() {
            self.roll(set)?;
        }
        let file_id = set.active;
        let (_, value_offset) = set.active_file_mut().append(key, value)?;
        Ok(DirEntry {
            file_id,
            value_offset,
            value_len: value.len() as u32,
        })
    }

    /// Opens segment `active + 1` and makes it the append target. The
    /// previous active segment stays open for reads; directory entries
    /// keep pointing into it.
    fn roll(&self, set: &mut SegmentSet) -> Result<()> {
        let next = set.active + 1;
        let file = LogFile::open(&self.dir, next, self.config.max_log_file_size)?;
        debug!(sealed = set.active, active = next, "segment rollover");
        set.files.insert(next, file);
        set.active = next;
        Ok(())
    }
}
