//! Compaction policy
//!
//! Capacity of level i is `base_capacity * multiplier^i`. The top log level
//! (N-1) only drains into the base on `materialize`, or during `balance`
//! when auto-materialization is on.
//!
//! How a source merges into a destination depends on both kinds:
//!
//! | source        | destination   | result                       |
//! |---------------|---------------|------------------------------|
//! | UnsortedLog   | UnsortedLog   | destination ++ source        |
//! | UnsortedLog   | SortedLog     | ordered merge of sorted src  |
//! | SortedLog     | SortedLog     | ordered merge                |
//! | any log       | SortedBase    | materialize (src sorted)     |
//! | anything else |               | `InvalidCompaction`          |

use crate::db::Options;
use crate::error::{Error, Result};
use crate::iterator::{ordered_merge, sort_batch};
use crate::level::{LevelData, LevelKind};
use crate::materialize::materialize;

/// Capacity of every log level, index = level id.
pub fn capacities(options: &Options) -> Vec<usize> {
    let mut caps = Vec::with_capacity(options.level_count);
    let mut cap = options.base_capacity;
    for _ in 0..options.level_count {
        caps.push(cap);
        cap = cap.saturating_mul(options.capacity_multiplier);
    }
    caps
}

/// First level whose count strictly exceeds its capacity.
///
/// The top level is skipped unless `include_top` is set, since draining it
/// means materializing.
pub fn over_capacity(counts: &[usize], caps: &[usize], include_top: bool) -> Option<usize> {
    let scan = if include_top {
        counts.len()
    } else {
        counts.len().saturating_sub(1)
    };
    (0..scan).find(|&i| counts[i] > caps[i])
}

/// Merge the content of a source level into its destination.
///
/// `src` is the newer level. Ties between equal keys keep the
/// destination's entries first so recency stays ascending.
pub fn merge_into(src: LevelData, dst: LevelData) -> Result<LevelData> {
    let merged = match (src, dst) {
        (LevelData::UnsortedLog(new), LevelData::UnsortedLog(mut old)) => {
            old.extend(new);
            LevelData::UnsortedLog(old)
        }
        (LevelData::UnsortedLog(new), LevelData::SortedLog(old)) => {
            LevelData::SortedLog(ordered_merge(sort_batch(new), old))
        }
        (LevelData::SortedLog(new), LevelData::SortedLog(old)) => {
            LevelData::SortedLog(ordered_merge(new, old))
        }
        (LevelData::UnsortedLog(new), LevelData::SortedBase(base)) => {
            LevelData::SortedBase(materialize(sort_batch(new), base))
        }
        (LevelData::SortedLog(new), LevelData::SortedBase(base)) => {
            LevelData::SortedBase(materialize(new, base))
        }
        (src @ (LevelData::SortedLog(_) | LevelData::SortedBase(_)), dst) => {
            return Err(invalid(src.kind(), dst.kind()));
        }
    };
    Ok(merged)
}

fn invalid(src: LevelKind, dst: LevelKind) -> Error {
    Error::InvalidCompaction(format!("cannot merge a {src} level into a {dst} level"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KvPair, LogRecord};

    fn set(key: &str, value: &str) -> LogRecord {
        LogRecord::set(key.as_bytes().to_vec(), value.as_bytes().to_vec())
    }

    #[test]
    fn capacities_grow_geometrically() {
        let options = Options::new("unused")
            .base_capacity(4)
            .level_count(3)
            .capacity_multiplier(2);
        assert_eq!(capacities(&options), vec![4, 8, 16]);
    }

    #[test]
    fn over_capacity_skips_top_by_default() {
        let caps = [4, 8, 16];
        assert_eq!(over_capacity(&[4, 8, 99], &caps, false), None);
        assert_eq!(over_capacity(&[4, 8, 99], &caps, true), Some(2));
        assert_eq!(over_capacity(&[5, 9, 0], &caps, false), Some(0));
        assert_eq!(over_capacity(&[0, 9, 0], &caps, false), Some(1));
    }

    #[test]
    fn unsorted_into_sorted_sorts_first() {
        let src = LevelData::UnsortedLog(vec![set("c", "3"), set("a", "1")]);
        let dst = LevelData::SortedLog(vec![set("a", "0"), set("b", "2")]);
        let LevelData::SortedLog(merged) = merge_into(src, dst).unwrap() else {
            panic!("expected a sorted log");
        };
        let got: Vec<(Vec<u8>, Vec<u8>)> = merged
            .into_iter()
            .map(|r| (r.key, r.value))
            .collect();
        let expected: Vec<(Vec<u8>, Vec<u8>)> = [("a", "0"), ("a", "1"), ("b", "2"), ("c", "3")]
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn unsorted_into_unsorted_appends() {
        let src = LevelData::UnsortedLog(vec![set("a", "new")]);
        let dst = LevelData::UnsortedLog(vec![set("z", "old")]);
        let merged = merge_into(src, dst).unwrap();
        assert_eq!(
            merged,
            LevelData::UnsortedLog(vec![set("z", "old"), set("a", "new")])
        );
    }

    #[test]
    fn log_into_base_materializes() {
        let src = LevelData::SortedLog(vec![set("a", "1"), LogRecord::delete(b"b".to_vec())]);
        let dst = LevelData::SortedBase(vec![KvPair::new(b"b".to_vec(), b"x".to_vec())]);
        let merged = merge_into(src, dst).unwrap();
        assert_eq!(
            merged,
            LevelData::SortedBase(vec![KvPair::new(b"a".to_vec(), b"1".to_vec())])
        );
    }

    #[test]
    fn backwards_pairs_are_rejected() {
        let sorted = LevelData::SortedLog(vec![set("a", "1")]);
        let base = LevelData::SortedBase(Vec::new());
        assert!(matches!(
            merge_into(sorted, LevelData::UnsortedLog(Vec::new())),
            Err(Error::InvalidCompaction(_))
        ));
        assert!(matches!(
            merge_into(base, LevelData::SortedLog(Vec::new())),
            Err(Error::InvalidCompaction(_))
        ));
    }
}
