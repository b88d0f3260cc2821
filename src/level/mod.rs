use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};

use crate::codec::{self, reader::FileReader};
use crate::durable;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::iterator::{is_ascending, is_strictly_ascending};
use crate::types::{KvPair, LogRecord};

/// Level 0 file: unsorted write-ahead buffer.
pub const LEVEL0_FILE: &str = "latest.temp";
/// Materialized base file.
pub const BASE_FILE: &str = "real.db";

/// File name for level `id` in a store with `level_count` log levels.
/// `id == level_count` addresses the base file.
pub fn file_name(id: usize, level_count: usize) -> String {
    match id {
        0 => LEVEL0_FILE.to_string(),
        n if n == level_count => BASE_FILE.to_string(),
        n => format!("l{n}.dbl"),
    }
}

/// How a level stores its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelKind {
    /// Log records in append order (level 0).
    UnsortedLog,
    /// Log records ascending by key, duplicates kept in recency order.
    SortedLog,
    /// Key-value pairs strictly ascending, no action tag.
    SortedBase,
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelKind::UnsortedLog => write!(f, "unsorted-log"),
            LevelKind::SortedLog => write!(f, "sorted-log"),
            LevelKind::SortedBase => write!(f, "sorted-base"),
        }
    }
}

/// The decoded content of one level, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelData {
    UnsortedLog(Vec<LogRecord>),
    SortedLog(Vec<LogRecord>),
    SortedBase(Vec<KvPair>),
}

impl LevelData {
    pub fn empty(kind: LevelKind) -> Self {
        match kind {
            LevelKind::UnsortedLog => LevelData::UnsortedLog(Vec::new()),
            LevelKind::SortedLog => LevelData::SortedLog(Vec::new()),
            LevelKind::SortedBase => LevelData::SortedBase(Vec::new()),
        }
    }

    pub fn kind(&self) -> LevelKind {
        match self {
            LevelData::UnsortedLog(_) => LevelKind::UnsortedLog,
            LevelData::SortedLog(_) => LevelKind::SortedLog,
            LevelData::SortedBase(_) => LevelKind::SortedBase,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LevelData::UnsortedLog(r) | LevelData::SortedLog(r) => r.len(),
            LevelData::SortedBase(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            LevelData::UnsortedLog(r) | LevelData::SortedLog(r) => codec::encode_all(r),
            LevelData::SortedBase(p) => codec::encode_all(p),
        }
    }

    /// Decode a level file and re-verify every checksum. Sorted kinds are
    /// also checked for order.
    pub fn decode(kind: LevelKind, data: &[u8]) -> Result<Self> {
        match kind {
            LevelKind::UnsortedLog => Ok(LevelData::UnsortedLog(decode_logs(data)?)),
            LevelKind::SortedLog => {
                let records = decode_logs(data)?;
                if !is_ascending(&records) {
                    return Err(Error::Corruption("sorted log level out of order".into()));
                }
                Ok(LevelData::SortedLog(records))
            }
            LevelKind::SortedBase => {
                let pairs: Vec<KvPair> = codec::decode_all(data)?;
                for pair in &pairs {
                    pair.verify()?;
                }
                if !is_strictly_ascending(&pairs) {
                    return Err(Error::Corruption(
                        "base file out of order or has duplicate keys".into(),
                    ));
                }
                Ok(LevelData::SortedBase(pairs))
            }
        }
    }
}

fn decode_logs(data: &[u8]) -> Result<Vec<LogRecord>> {
    let records: Vec<LogRecord> = codec::decode_all(data)?;
    for record in &records {
        record.verify()?;
    }
    Ok(records)
}

/// Mutable state guarded by a level's lock.
#[derive(Debug, Default)]
pub struct LevelState {
    /// Records durably on disk in this level. Never ahead of the file.
    pub record_count: usize,
}

/// One tier of the cascade: one file, one lock, one counter.
///
/// The lock guards both the file and `record_count`. Every file access
/// goes through a held guard.
pub struct Level {
    id: usize,
    kind: LevelKind,
    path: PathBuf,
    capacity: usize,
    state: Mutex<LevelState>,
}

impl Level {
    pub fn new(id: usize, kind: LevelKind, path: PathBuf, capacity: usize) -> Self {
        Level {
            id,
            kind,
            path,
            capacity,
            state: Mutex::new(LevelState::default()),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn kind(&self) -> LevelKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lock(&self) -> MutexGuard<'_, LevelState> {
        self.state.lock()
    }

    /// Current record count (takes the lock briefly).
    pub fn record_count(&self) -> usize {
        self.state.lock().record_count
    }

    /// Raw file contents. The caller holds this level's lock.
    pub fn read_bytes(&self, _guard: &LevelState) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    /// Read and verify the level file. The caller holds this level's lock.
    pub fn read(&self, _guard: &LevelState) -> Result<LevelData> {
        let reader = FileReader::new(&self.path)?;
        LevelData::decode(self.kind, reader.bytes())
    }

    /// Atomically replace the level file with already-encoded content.
    /// The caller holds this level's lock.
    pub fn replace(&self, _guard: &LevelState, bytes: &[u8]) -> Result<()> {
        durable::atomic_replace(&self.path, bytes)
    }

    pub fn truncate(&self, guard: &LevelState) -> Result<()> {
        self.replace(guard, &[])
    }

    /// Create the file if missing, repair a torn level-0 tail, verify the
    /// content and load the record count. Called once when the store opens.
    pub fn load(&self) -> Result<usize> {
        durable::ensure_file(&self.path)?;
        let mut state = self.state.lock();

        if self.kind == LevelKind::UnsortedLog {
            self.cut_torn_tail()?;
        }
        let count = self.read(&state)?.len();
        state.record_count = count;
        Ok(count)
    }

    /// A crash during an append can leave half a record at the end of
    /// level 0. Everything before it is intact; drop the partial record.
    fn cut_torn_tail(&self) -> Result<()> {
        let reader = FileReader::new(&self.path)?;
        for frame in reader.iter::<LogRecord>() {
            match frame {
                Ok(_) => {}
                Err(Error::Decode {
                    kind: DecodeErrorKind::Truncated,
                    offset,
                }) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        offset,
                        dropped = reader.bytes().len() - offset,
                        "cutting torn tail of level 0"
                    );
                    return durable::atomic_replace(&self.path, &reader.bytes()[..offset]);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .finish()
    }
}
