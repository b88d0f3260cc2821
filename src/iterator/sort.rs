use crate::iterator::{Keyed, MergeIterator};

/// Sort an unordered batch ascending by key.
///
/// Recursive divide-and-merge sort. Stable: among equal keys the element
/// that came first in the batch stays first, which preserves append order
/// (recency) for duplicate keys written to level 0.
pub fn sort_batch<T: Keyed>(mut items: Vec<T>) -> Vec<T> {
    if items.len() <= 1 {
        return items;
    }
    let right = items.split_off(items.len() / 2);
    let left = sort_batch(items);
    let right = sort_batch(right);

    let mut sorted = Vec::with_capacity(left.len() + right.len());
    sorted.extend(MergeIterator::new(left.into_iter(), right.into_iter()));
    sorted
}
