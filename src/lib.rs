//! # LogDB
//!
//! A minimal log-structured merge key-value store.
//!
//! ## Core idea
//! Writes land as append-only log records in level 0. When a level holds
//! more records than its capacity it is merged into the next, larger level,
//! and the top level is eventually folded into a sorted key-value base
//! file. Every level rewrite is an atomic file replace, so a reader never
//! sees a half-written level.
//!
//! ```no_run
//! use logdb::{LogDb, LogRecord, Options};
//!
//! let db = LogDb::open(Options::new("/tmp/logdb").base_capacity(4))?;
//! db.ingest(&[LogRecord::set("k", "v"), LogRecord::delete("old")])?;
//! db.materialize()?;
//! assert_eq!(db.get(b"k")?, Some(b"v".to_vec()));
//! db.close()?;
//! # Ok::<(), logdb::Error>(())
//! ```

pub mod codec;
pub mod compaction;
pub mod db;
pub mod durable;
pub mod error;
pub mod fault;
pub mod iterator;
pub mod level;
pub mod manifest;
pub mod materialize;
pub mod types;

// Public re-exports for the top-level API
pub use db::{LogDb, Options, Stats};
pub use error::{Error, Result};
pub use types::{Action, KvPair, LogRecord};
