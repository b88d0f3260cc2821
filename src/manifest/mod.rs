//! Compaction journal
//!
//! Replacing the destination and truncating the source are two separate
//! atomic writes. A crash between them would leave the source's records in
//! both levels. Each compaction therefore journals:
//!
//! 1. `Begin` with fingerprints of the source as read and the merged
//!    destination, before either file is touched
//! 2. `Commit` once the source is truncated
//!
//! On open, a `Begin` with no later `Commit` is finished if the destination
//! holds exactly the merged bytes and the source still holds exactly what
//! was compacted: the source is truncated. Any other combination means the
//! destination write never landed (or the source has moved on) and both
//! files are left alone. The journal is then reset.
//!
//! While running, the journal is also emptied whenever a `Commit` would
//! leave no compaction open, so it only ever holds in-flight intents.

pub mod record;

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::durable;
use crate::error::Result;

pub use record::{Fingerprint, ManifestRecord};

pub const MANIFEST_FILE: &str = "MANIFEST";

/// A compaction that journaled `Begin` but never `Commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCompaction {
    pub src: usize,
    pub dest: usize,
    pub source: Fingerprint,
    pub merged: Fingerprint,
}

impl PendingCompaction {
    /// The destination write landed and the source was not touched since.
    pub fn should_roll_forward(&self, src_bytes: &[u8], dest_bytes: &[u8]) -> bool {
        !src_bytes.is_empty() && self.source.matches(src_bytes) && self.merged.matches(dest_bytes)
    }
}

/// Journal of compaction intents.
pub struct Manifest {
    path: PathBuf,
    // Level pairs with a journaled Begin and no Commit yet. Also serializes
    // writes from compactions of different pairs.
    open: Mutex<Vec<(usize, usize)>>,
}

impl Manifest {
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        durable::ensure_file(&path)?;
        Ok(Manifest {
            path,
            open: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn begin(&self, src: usize, dest: usize, source: Fingerprint, merged: Fingerprint) -> Result<()> {
        let mut open = self.open.lock();
        let record = ManifestRecord::Begin {
            src,
            dest,
            source,
            merged,
        };
        durable::durable_append(&self.path, &record.encode())?;
        if !open.contains(&(src, dest)) {
            open.push((src, dest));
        }
        Ok(())
    }

    /// Close the compaction of `src` into `dest`.
    ///
    /// When no other compaction is open the journal is emptied instead of
    /// appending a `Commit`. A pair whose compaction failed stays open until
    /// a later compaction of the same pair commits.
    pub fn commit(&self, src: usize, dest: usize) -> Result<()> {
        let mut open = self.open.lock();
        open.retain(|&pair| pair != (src, dest));
        if open.is_empty() {
            durable::atomic_replace(&self.path, &[])
        } else {
            durable::durable_append(&self.path, &ManifestRecord::Commit { src, dest }.encode())
        }
    }

    /// Every intact record, in file order.
    ///
    /// Reading stops at the first record that is torn or fails its CRC:
    /// appends are sequential, so nothing valid follows it.
    pub fn records(&self) -> Result<Vec<ManifestRecord>> {
        let data = fs::read(&self.path)?;
        let mut records = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            match ManifestRecord::decode(&data[offset..]) {
                Ok((record, size)) => {
                    records.push(record);
                    offset += size;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        offset,
                        error = %e,
                        "ignoring manifest tail"
                    );
                    break;
                }
            }
        }
        Ok(records)
    }

    /// Compactions that began but did not commit.
    pub fn pending(&self) -> Result<Vec<PendingCompaction>> {
        let mut pending: Vec<PendingCompaction> = Vec::new();

        for record in self.records()? {
            match record {
                ManifestRecord::Begin {
                    src,
                    dest,
                    source,
                    merged,
                } => {
                    // A later Begin on the same pair supersedes the earlier one.
                    pending.retain(|p| (p.src, p.dest) != (src, dest));
                    pending.push(PendingCompaction {
                        src,
                        dest,
                        source,
                        merged,
                    });
                }
                ManifestRecord::Commit { src, dest } => {
                    pending.retain(|p| (p.src, p.dest) != (src, dest));
                }
            }
        }
        Ok(pending)
    }

    /// Empty the journal and forget every open compaction.
    pub fn reset(&self) -> Result<()> {
        let mut open = self.open.lock();
        durable::atomic_replace(&self.path, &[])?;
        open.clear();
        Ok(())
    }
}
