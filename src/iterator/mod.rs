pub mod merge;
pub mod sort;

use crate::types::{KvPair, LogRecord};

pub use merge::{MergeIterator, ordered_merge};
pub use sort::sort_batch;

/// Anything ordered by a byte key.
///
/// Log records and materialized pairs both implement this, so the merge
/// and sort algorithms serve levels and the base file alike.
pub trait Keyed {
    fn key(&self) -> &[u8];
}

impl Keyed for LogRecord {
    fn key(&self) -> &[u8] {
        &self.key
    }
}

impl Keyed for KvPair {
    fn key(&self) -> &[u8] {
        &self.key
    }
}

/// True if keys never decrease. Equal neighbours are allowed.
pub fn is_ascending<T: Keyed>(items: &[T]) -> bool {
    items.windows(2).all(|w| w[0].key() <= w[1].key())
}

/// True if keys strictly increase (no duplicates).
pub fn is_strictly_ascending<T: Keyed>(items: &[T]) -> bool {
    items.windows(2).all(|w| w[0].key() < w[1].key())
}
