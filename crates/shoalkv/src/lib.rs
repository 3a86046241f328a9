//! # ShoalKV
//!
//! An embedded, persistent key–value store on the Bitcask design: an
//! append-only segmented log on disk paired with an in-memory sharded
//! directory from keys to the location of their latest value.
//!
//! - every accepted write is fsynced before the call returns;
//! - the directory is rebuilt from the log at open, so a crash between
//!   the append and the in-memory update loses nothing;
//! - a lookup costs one shard lock plus one positional read.
//!
//! ```text
//!          put / remove                     get
//!               │                            │
//!       ┌───────▼─────────┐        ┌─────────▼────────┐
//!       │ active segment  │        │      keydir      │
//!       │ (append + fsync)│        │  (sharded map)   │
//!       └───────┬─────────┘        └─────────┬────────┘
//!               │                            │
//!       ┌───────▼────────────────────────────▼────────┐
//!       │   segments 0..n  (sealed ones read-only)    │
//!       └─────────────────────────────────────────────┘
//! ```
//!
//! A database is a directory of segment files named by 16-digit
//! zero-padded decimal ids, nothing else: no manifest, no lock file.
//! Segment `n` is sealed once segment `n + 1` exists; only the largest
//! id ever receives appends.
//!
//! ## Example
//! ```no_run
//! use shoalkv::{Config, Store};
//!
//! # fn main() -> shoalkv::Result<()> {
//! let store = Store::open("./db", Config::small())?;
//! store.put(b"name", b"jhon")?;
//! assert_eq!(store.get(b"name")?.as_deref(), Some(&b"jhon"[..]));
//! store.remove(b"name")?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod store;

pub use config::Config;
pub use error::{Result, StoreError};
pub use store::{Store, RESERVED_MARK, TOMBSTONE};
