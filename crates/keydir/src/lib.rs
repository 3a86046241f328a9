//! # Keydir — sharded in-memory key directory
//!
//! The keydir maps every live key to the location of its latest value on
//! disk. It is the read path's first stop and is rebuilt from the log at
//! every open, so it is never persisted.
//!
//! ## Key properties
//! - **Sharded locking**: a key is routed to one of N shards by FNV-1a
//!   hash; operations on distinct shards never contend.
//! - **Owned keys**: shards copy key bytes on insert, so callers may
//!   reuse their buffers after the call returns.
//! - **Copy-out reads**: `get` returns the entry by value; no reference
//!   escapes a shard lock.
//!
//! ## Example
//! ```rust
//! use keydir::{DirEntry, KeyDir};
//!
//! let dir = KeyDir::new(8);
//! dir.put(b"hello", DirEntry { file_id: 0, value_offset: 13, value_len: 5 });
//! assert_eq!(dir.get(b"hello").unwrap().value_offset, 13);
//! assert!(dir.remove(b"hello"));
//! assert!(dir.get(b"hello").is_none());
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;

/// Location of the latest accepted value written for a key:
/// which segment it is in, where the value bytes start, and how long
/// they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// Id of the segment holding the value.
    pub file_id: u32,
    /// Offset of the first value byte within that segment.
    pub value_offset: u64,
    /// Value length in bytes.
    pub value_len: u32,
}

#[derive(Debug)]
struct Shard {
    entries: Mutex<HashMap<Vec<u8>, DirEntry>>,
}

/// A fixed set of independently locked key → [`DirEntry`] maps.
///
/// The shard count is chosen at construction and determines lock
/// partitioning only; it has no effect on which entries exist.
#[derive(Debug)]
pub struct KeyDir {
    shards: Vec<Shard>,
}

impl KeyDir {
    /// Creates a keydir with `num_shards` shards.
    ///
    /// # Panics
    ///
    /// Panics if `num_shards` is zero.
    pub fn new(num_shards: usize) -> Self {
        assert!(num_shards > 0, "keydir needs at least one shard");
        let shards = (0..num_shards)
            .map(|_| Shard {
                entries: Mutex::new(HashMap::new()),
            })
            .collect();
        Self { shards }
    }

    fn shard(&self, key: &[u8]) -> &Shard {
        &self.shards[fnv1a_32(key) as usize % self.shards.len()]
    }

    /// Inserts or overwrites the entry for `key`, copying the key bytes
    /// into shard-owned storage.
    pub fn put(&self, key: &[u8], entry: DirEntry) {
        self.shard(key).entries.lock().insert(key.to_vec(), entry);
    }

    /// Returns a copy of the entry for `key`, if present.
    pub fn get(&self, key: &[u8]) -> Option<DirEntry> {
        self.shard(key).entries.lock().get(key).copied()
    }

    /// Removes `key`, reporting whether a mapping was present.
    pub fn remove(&self, key: &[u8]) -> bool {
        self.shard(key).entries.lock().remove(key).is_some()
    }

    /// Total number of live keys, summed shard by shard.
    ///
    /// Exact when quiescent. Under concurrent mutation the shards are
    /// locked in turn, so the sum is not a point-in-time snapshot.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.entries.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Per-shard key counts, in shard order.
    pub fn shard_sizes(&self) -> Vec<usize> {
        self.shards.iter().map(|s| s.entries.lock().len()).collect()
    }
}

/// 32-bit FNV-1a. Used for shard routing only; never touches disk.
fn fnv1a_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(file_id: u32, value_offset: u64, value_len: u32) -> DirEntry {
        DirEntry {
            file_id,
            value_offset,
            value_len,
        }
    }

    #[test]
    fn put_get_remove() {
        let dir = KeyDir::new(4);
        assert!(dir.get(b"missing").is_none());

        dir.put(b"k", entry(0, 8, 3));
        assert_eq!(dir.get(b"k"), Some(entry(0, 8, 3)));

        assert!(dir.remove(b"k"));
        assert!(dir.get(b"k").is_none());
        assert!(!dir.remove(b"k"));
    }

    #[test]
    fn put_overwrites_in_place() {
        let dir = KeyDir::new(4);
        dir.put(b"k", entry(0, 8, 3));
        dir.put(b"k", entry(2, 100, 9));
        assert_eq!(dir.get(b"k"), Some(entry(2, 100, 9)));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn shard_counts_sum_to_len() {
        let dir = KeyDir::new(4);
        for i in 0..100u32 {
            dir.put(format!("key-{i}").as_bytes(), entry(0, u64::from(i), 1));
        }
        assert_eq!(dir.len(), 100);
        assert_eq!(dir.shard_sizes().iter().sum::<usize>(), 100);

        for i in 0..50u32 {
            assert!(dir.remove(format!("key-{i}").as_bytes()));
        }
        assert_eq!(dir.len(), 50);
        assert_eq!(dir.shard_sizes().iter().sum::<usize>(), 50);
    }

    #[test]
    fn same_key_always_routes_to_one_shard() {
        let dir = KeyDir::new(16);
        for _ in 0..10 {
            dir.put(b"stable", entry(0, 0, 0));
        }
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.shard_sizes().iter().filter(|&&n| n > 0).count(), 1);
    }

    #[test]
    fn fnv1a_reference_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn concurrent_inserts_from_many_threads() {
        let dir = Arc::new(KeyDir::new(8));
        let mut handles = Vec::new();
        for t in 0..4u32 {
            let dir = Arc::clone(&dir);
            handles.push(std::thread::spawn(move || {
                for i in 0..250u32 {
                    let key = format!("t{t}-{i}");
                    dir.put(key.as_bytes(), entry(t, u64::from(i), 4));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(dir.len(), 1000);
        assert_eq!(dir.get(b"t3-249"), Some(entry(3, 249, 4)));
    }

    #[test]
    fn single_shard_still_works() {
        let dir = KeyDir::new(1);
        dir.put(b"a", entry(0, 0, 1));
        dir.put(b"b", entry(0, 9, 1));
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.shard_sizes(), vec![2]);
    }
}
