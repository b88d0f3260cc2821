use crate::iterator::{is_ascending, is_strictly_ascending};
use crate::types::{Action, KvPair, LogRecord};

/// Fold an ascending log sequence onto a sorted, duplicate-free base.
///
/// `logs` must be ascending by key, with equal keys in ascending recency
/// (what `ordered_merge` and `sort_batch` produce). `base` must be strictly
/// ascending. Both are walked in lockstep:
///
/// - SET on an absent key inserts it
/// - SET on a present key replaces the value (pair checksum recomputed)
/// - DELETE on a present key removes it
/// - DELETE on an absent key does nothing
///
/// The result is again strictly ascending.
pub fn materialize(logs: Vec<LogRecord>, base: Vec<KvPair>) -> Vec<KvPair> {
    debug_assert!(is_ascending(&logs), "logs must be key-ascending");
    debug_assert!(is_strictly_ascending(&base), "base must be duplicate-free");

    let mut out = Vec::with_capacity(base.len() + logs.len());
    let mut base = base.into_iter().peekable();
    let mut logs = logs.into_iter().peekable();

    while let Some(log) = logs.next() {
        while let Some(pair) = base.next_if(|p| p.key < log.key) {
            out.push(pair);
        }

        // Applied oldest to newest, a run of SET/DELETE on one key leaves
        // exactly what its newest entry says.
        let mut newest = log;
        while let Some(next) = logs.next_if(|l| l.key == newest.key) {
            newest = next;
        }

        let _replaced = base.next_if(|p| p.key == newest.key);
        match newest.action {
            Action::Set => out.push(newest.into_pair()),
            Action::Delete => {}
        }
    }

    out.extend(base);
    out
}
