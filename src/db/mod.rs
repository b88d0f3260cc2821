//! The level store.
//!
//! ```text
//!  ingest ──► L0 latest.temp ──► L1 l1.dbl ──► ... ──► L(N-1) ──► real.db
//!            (append order)     (sorted logs)                    (base)
//! ```
//!
//! Every level, the base included, owns one lock guarding its file and its
//! record count. Locks are always taken in descending level id, so a
//! compaction holds destination then source and a snapshot holds the base
//! first.

pub mod options;

use std::fs;

use tracing::{debug, info, warn};

use crate::codec;
use crate::compaction;
use crate::durable;
use crate::error::{Error, Result};
use crate::fault::{self, points};
use crate::iterator::{ordered_merge, sort_batch};
use crate::level::{self, Level, LevelData, LevelKind};
use crate::manifest::{Fingerprint, Manifest};
use crate::materialize::materialize;
use crate::types::{KvPair, LogRecord, Value};

pub use options::{LevelStats, Options, Stats};

/// Handle to an open store. Share it between threads with `Arc`.
pub struct LogDb {
    options: Options,
    /// Log levels 0..N-1 followed by the base at index N.
    levels: Vec<Level>,
    manifest: Manifest,
}

impl LogDb {
    /// Open the store in `options.dir`, creating missing files and
    /// finishing any compaction a crash interrupted.
    pub fn open(options: Options) -> Result<Self> {
        options.validate()?;
        fs::create_dir_all(&options.dir)?;

        let n = options.level_count;
        let caps = compaction::capacities(&options);
        let levels = (0..=n)
            .map(|id| {
                let kind = match id {
                    0 => LevelKind::UnsortedLog,
                    i if i == n => LevelKind::SortedBase,
                    _ => LevelKind::SortedLog,
                };
                let capacity = caps.get(id).copied().unwrap_or(usize::MAX);
                let path = options.dir.join(level::file_name(id, n));
                Level::new(id, kind, path, capacity)
            })
            .collect::<Vec<_>>();

        for level in &levels {
            durable::ensure_file(level.path())?;
        }

        let manifest = Manifest::open(&options.dir)?;
        let db = LogDb {
            options,
            levels,
            manifest,
        };

        db.recover_compactions()?;
        db.manifest.reset()?;

        for level in &db.levels {
            level.load()?;
        }

        info!(
            dir = %db.options.dir.display(),
            levels = n,
            pending = db.levels[..n].iter().map(Level::record_count).sum::<usize>(),
            base = db.base().record_count(),
            "opened store"
        );
        Ok(db)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Append a batch to level 0, then rebalance.
    ///
    /// The batch is durable once the append returns. A later balance
    /// failure is reported as [`Error::Compaction`] but does not undo it.
    pub fn ingest(&self, batch: &[LogRecord]) -> Result<()> {
        if batch.is_empty() {
            debug!("empty batch, nothing to ingest");
            return Ok(());
        }
        for record in batch {
            record.verify()?;
        }
        let bytes = codec::encode_all(batch);

        {
            let level0 = &self.levels[0];
            let mut state = level0.lock();
            durable::durable_append(level0.path(), &bytes)?;
            state.record_count += batch.len();
            debug!(
                records = batch.len(),
                level0 = state.record_count,
                "ingested batch"
            );
        }

        self.balance()
    }

    /// Compact every over-capacity level into the next one until all fit.
    ///
    /// The top log level has no capacity unless auto-materialization is on,
    /// in which case it drains into the base.
    pub fn balance(&self) -> Result<()> {
        let caps: Vec<usize> = self.log_levels().iter().map(Level::capacity).collect();
        let include_top = self.options.auto_materialize;

        while let Some(src) = compaction::over_capacity(&self.record_counts(), &caps, include_top) {
            let dest = src + 1;
            let progressed = self
                .compact_pair(dest, src, false)
                .map_err(|e| Error::Compaction {
                    src,
                    dest,
                    source: Box::new(e),
                })?;
            if !progressed {
                debug!(src, dest, "no compaction progress, stopping balance");
                break;
            }
        }
        Ok(())
    }

    /// Merge level `src` into level `dest` regardless of capacity.
    ///
    /// `dest` must be `src + 1`; `dest == level_count` addresses the base.
    pub fn compact(&self, dest: usize, src: usize) -> Result<()> {
        let n = self.options.level_count;
        if dest != src + 1 || dest > n {
            return Err(Error::InvalidCompaction(format!(
                "cannot compact level {src} into level {dest} (levels 0..{n}, base {n})"
            )));
        }
        self.compact_pair(dest, src, true).map(|_| ())
    }

    /// Returns whether anything was moved or a stale count was corrected.
    fn compact_pair(&self, dest: usize, src: usize, force: bool) -> Result<bool> {
        let dst_level = &self.levels[dest];
        let src_level = &self.levels[src];

        let mut dst_state = dst_level.lock();
        let mut src_state = src_level.lock();

        // Another thread may have drained the source while we waited.
        if !force && src_state.record_count <= src_level.capacity() {
            debug!(src, dest, "source back within capacity, skipping compaction");
            return Ok(false);
        }

        let src_bytes = src_level.read_bytes(&src_state)?;
        let src_data = LevelData::decode(src_level.kind(), &src_bytes)?;
        if src_data.is_empty() {
            if src_state.record_count == 0 {
                debug!(src, dest, "source empty, skipping compaction");
                return Ok(false);
            }
            // The file was emptied behind a failed write; trust the disk.
            warn!(
                src,
                stale_count = src_state.record_count,
                "source file empty, resetting record count"
            );
            src_state.record_count = 0;
            return Ok(true);
        }
        let moved = src_data.len();

        let dst_data = dst_level.read(&dst_state)?;
        let merged = compaction::merge_into(src_data, dst_data)?;
        let merged_bytes = merged.encode();

        self.manifest.begin(
            src,
            dest,
            Fingerprint::of(&src_bytes),
            Fingerprint::of(&merged_bytes),
        )?;

        fault::check(points::COMPACTION_BEFORE_DEST_WRITE)?;
        dst_level.replace(&dst_state, &merged_bytes)?;

        fault::check(points::COMPACTION_BEFORE_SOURCE_TRUNCATE)?;
        src_level.truncate(&src_state)?;

        if let Err(e) = self.manifest.commit(src, dest) {
            warn!(src, dest, error = %e, "could not journal compaction commit");
        }

        dst_state.record_count = merged.len();
        src_state.record_count = 0;

        info!(
            src,
            dest,
            moved,
            dest_count = dst_state.record_count,
            "compacted level"
        );
        Ok(true)
    }

    /// Drain every log level into the base file.
    ///
    /// Levels written to concurrently may hold new records by the time this
    /// returns; everything that was present when each step ran is folded.
    pub fn materialize(&self) -> Result<()> {
        for src in 0..self.options.level_count {
            self.compact_pair(src + 1, src, true)?;
        }
        info!(base = self.base().record_count(), "materialized store");
        Ok(())
    }

    /// Current state with every log level folded onto the base.
    /// Nothing is written.
    pub fn snapshot(&self) -> Result<Vec<KvPair>> {
        let guards: Vec<_> = self
            .levels
            .iter()
            .rev()
            .map(|level| (level, level.lock()))
            .collect();

        let mut base = Vec::new();
        let mut logs: Vec<LogRecord> = Vec::new();

        // Base first, then log levels from oldest (N-1) to newest (0).
        for (level, guard) in &guards {
            match level.read(guard)? {
                LevelData::SortedBase(pairs) => base = pairs,
                LevelData::SortedLog(records) => logs = ordered_merge(records, logs),
                LevelData::UnsortedLog(records) => logs = ordered_merge(sort_batch(records), logs),
            }
        }
        drop(guards);

        Ok(materialize(logs, base))
    }

    /// Value of `key` in the current snapshot.
    pub fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        let snapshot = self.snapshot()?;
        let found = snapshot
            .binary_search_by(|pair| pair.key.as_slice().cmp(key))
            .ok()
            .map(|i| snapshot[i].value.clone());
        Ok(found)
    }

    pub fn stats(&self) -> Stats {
        let top = self.options.level_count - 1;
        let top_capped = self.options.auto_materialize;
        let levels = self
            .log_levels()
            .iter()
            .map(|level| LevelStats {
                id: level.id(),
                kind: level.kind(),
                record_count: level.record_count(),
                capacity: (level.id() < top || top_capped).then(|| level.capacity()),
            })
            .collect();
        Stats {
            levels,
            base_count: self.base().record_count(),
        }
    }

    /// Tear down the handle. Clears the manifest when no compaction is
    /// left uncommitted.
    pub fn close(self) -> Result<()> {
        if self.manifest.pending()?.is_empty() {
            self.manifest.reset()?;
        } else {
            warn!("uncommitted compaction in manifest, keeping it for the next open");
        }
        info!(dir = %self.options.dir.display(), "closed store");
        Ok(())
    }

    fn log_levels(&self) -> &[Level] {
        &self.levels[..self.options.level_count]
    }

    fn base(&self) -> &Level {
        &self.levels[self.options.level_count]
    }

    fn record_counts(&self) -> Vec<usize> {
        self.log_levels().iter().map(Level::record_count).collect()
    }

    /// Finish or discard compactions a crash interrupted.
    fn recover_compactions(&self) -> Result<()> {
        for pending in self.manifest.pending()? {
            let (src, dest) = (pending.src, pending.dest);
            let (Some(src_level), Some(dst_level)) = (self.levels.get(src), self.levels.get(dest))
            else {
                return Err(Error::Corruption(format!(
                    "manifest names level pair {src} -> {dest}, store has {} levels",
                    self.options.level_count
                )));
            };

            let src_bytes = fs::read(src_level.path())?;
            let dest_bytes = fs::read(dst_level.path())?;

            if pending.should_roll_forward(&src_bytes, &dest_bytes) {
                warn!(src, dest, "rolling forward interrupted compaction");
                durable::atomic_replace(src_level.path(), &[])?;
            } else {
                warn!(src, dest, "interrupted compaction left no merged destination, keeping files");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LogDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogDb")
            .field("options", &self.options)
            .field("levels", &self.levels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn set(key: &str, value: &str) -> LogRecord {
        LogRecord::set(key.as_bytes().to_vec(), value.as_bytes().to_vec())
    }

    #[test]
    fn opens_all_files() {
        let dir = tempdir().unwrap();
        let db = LogDb::open(Options::new(dir.path()).level_count(3)).unwrap();
        for name in ["latest.temp", "l1.dbl", "l2.dbl", "real.db", "MANIFEST"] {
            assert!(dir.path().join(name).exists(), "missing {name}");
        }
        assert_eq!(db.stats().levels.len(), 3);
        db.close().unwrap();
    }

    #[test]
    fn compact_rejects_non_adjacent_pairs() {
        let dir = tempdir().unwrap();
        let db = LogDb::open(Options::new(dir.path()).level_count(3)).unwrap();
        assert!(matches!(db.compact(2, 0), Err(Error::InvalidCompaction(_))));
        assert!(matches!(db.compact(4, 3), Err(Error::InvalidCompaction(_))));
        assert!(matches!(db.compact(0, 1), Err(Error::InvalidCompaction(_))));
        assert!(db.compact(3, 2).is_ok());
    }

    #[test]
    fn corrupt_batch_is_rejected_whole() {
        let dir = tempdir().unwrap();
        let db = LogDb::open(Options::new(dir.path())).unwrap();
        let mut bad = set("b", "2");
        bad.checksum ^= 0xFF;

        let result = db.ingest(&[set("a", "1"), bad]);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
        assert_eq!(db.stats().levels[0].record_count, 0);
        assert!(fs::read(dir.path().join("latest.temp")).unwrap().is_empty());
    }

    #[test]
    fn get_sees_unmaterialized_writes() {
        let dir = tempdir().unwrap();
        let db = LogDb::open(Options::new(dir.path())).unwrap();
        db.ingest(&[set("a", "1"), set("b", "2")]).unwrap();
        db.ingest(&[set("a", "3"), LogRecord::delete(b"b".to_vec())]).unwrap();

        assert_eq!(db.get(b"a").unwrap(), Some(b"3".to_vec()));
        assert_eq!(db.get(b"b").unwrap(), None);
        assert_eq!(db.stats().base_count, 0);
    }
}
