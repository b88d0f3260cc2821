use std::iter::Peekable;

use crate::iterator::Keyed;

/// Merges two key-ascending iterators into one ascending stream.
///
/// When both heads have the same key, the `first` iterator's element is
/// yielded before the `second`'s. No deduplication happens here: every
/// element of both inputs comes out exactly once, so the result is the
/// multiset union.
///
/// Used for:
/// - Compaction (newer level merged into older level)
/// - The merge step of the batch sort
/// - Query-time folding of every level onto the base
pub struct MergeIterator<A: Iterator, B: Iterator> {
    first: Peekable<A>,
    second: Peekable<B>,
}

impl<T, A, B> MergeIterator<A, B>
where
    T: Keyed,
    A: Iterator<Item = T>,
    B: Iterator<Item = T>,
{
    pub fn new(first: A, second: B) -> Self {
        MergeIterator {
            first: first.peekable(),
            second: second.peekable(),
        }
    }
}

impl<T, A, B> Iterator for MergeIterator<A, B>
where
    T: Keyed,
    A: Iterator<Item = T>,
    B: Iterator<Item = T>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let take_first = match (self.first.peek(), self.second.peek()) {
            (Some(a), Some(b)) => a.key() <= b.key(),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };
        if take_first {
            self.first.next()
        } else {
            self.second.next()
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (a_lo, a_hi) = self.first.size_hint();
        let (b_lo, b_hi) = self.second.size_hint();
        let hi = match (a_hi, b_hi) {
            (Some(a), Some(b)) => a.checked_add(b),
            _ => None,
        };
        (a_lo.saturating_add(b_lo), hi)
    }
}

/// O(n) merge of two ascending sequences.
///
/// `new` holds the more recent entries. On equal keys the `old` element is
/// emitted first, then the `new` one, so within a run of equal keys order
/// is ascending recency. Callers that want "new overwrites old" fold the
/// result (see `materialize`).
pub fn ordered_merge<T: Keyed>(new: Vec<T>, old: Vec<T>) -> Vec<T> {
    let mut merged = Vec::with_capacity(new.len() + old.len());
    merged.extend(MergeIterator::new(old.into_iter(), new.into_iter()));
    merged
}
