use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::level::LevelKind;

/// Configuration for a [`LogDb`](super::LogDb).
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding the level files and the manifest.
    pub dir: PathBuf,

    /// Capacity of level 0, in records (default: 10)
    pub base_capacity: usize,

    /// Number of log levels N, base file excluded (default: 4, min 2)
    pub level_count: usize,

    /// Growth factor between adjacent levels (default: 2, min 1)
    pub capacity_multiplier: usize,

    /// Let `balance` drain an over-capacity top level into the base
    /// (default: false)
    pub auto_materialize: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logdb"),
            base_capacity: 10,
            level_count: 4,
            capacity_multiplier: 2,
            auto_materialize: false,
        }
    }
}

impl Options {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    pub fn base_capacity(mut self, capacity: usize) -> Self {
        self.base_capacity = capacity;
        self
    }

    pub fn level_count(mut self, count: usize) -> Self {
        self.level_count = count;
        self
    }

    pub fn capacity_multiplier(mut self, multiplier: usize) -> Self {
        self.capacity_multiplier = multiplier;
        self
    }

    pub fn auto_materialize(mut self, enabled: bool) -> Self {
        self.auto_materialize = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.level_count < 2 {
            return Err(Error::InvalidOptions(format!(
                "level_count must be at least 2, got {}",
                self.level_count
            )));
        }
        if self.capacity_multiplier < 1 {
            return Err(Error::InvalidOptions(
                "capacity_multiplier must be at least 1".into(),
            ));
        }
        if self.base_capacity == 0 {
            return Err(Error::InvalidOptions(
                "base_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Point-in-time view of one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelStats {
    pub id: usize,
    pub kind: LevelKind,
    pub record_count: usize,
    /// `None` for the top log level unless auto-materialization is on:
    /// it only drains on `materialize`.
    pub capacity: Option<usize>,
}

/// Snapshot of store-wide counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    /// Log levels 0..N-1, in id order.
    pub levels: Vec<LevelStats>,
    /// Pairs in the base file.
    pub base_count: usize,
}

impl Stats {
    /// Records still sitting in log levels.
    pub fn pending_records(&self) -> usize {
        self.levels.iter().map(|l| l.record_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::new("/tmp/x");
        assert_eq!(options.base_capacity, 10);
        assert_eq!(options.level_count, 4);
        assert_eq!(options.capacity_multiplier, 2);
        assert!(!options.auto_materialize);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            Options::new("d").level_count(1),
            Options::new("d").capacity_multiplier(0),
            Options::new("d").base_capacity(0),
        ];
        for options in bad {
            assert!(matches!(options.validate(), Err(Error::InvalidOptions(_))));
        }
    }
}
