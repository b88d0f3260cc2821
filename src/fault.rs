//! Fault injection for durability testing
//!
//! Durable writes and compaction steps call [`check`] with a named point.
//! When that point is armed on the current thread, the step fails with an
//! `io::Error` instead of running, which lets tests observe exactly what a
//! failed fsync or an interrupted compaction leaves behind.
//!
//! Points are armed per thread, so parallel tests never see each other's
//! faults. An unarmed point costs one thread-local lookup.
//!
//! ```ignore
//! use logdb::fault::{self, points};
//!
//! let _guard = fault::arm(points::ATOMIC_REPLACE_BEFORE_FSYNC);
//! assert!(logdb::durable::atomic_replace(&path, b"new").is_err());
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::io;

thread_local! {
    static ARMED: RefCell<HashSet<&'static str>> = RefCell::new(HashSet::new());
}

/// Disarms its point when dropped.
#[must_use = "the fault point is disarmed as soon as the guard is dropped"]
pub struct FaultGuard {
    point: &'static str,
}

impl Drop for FaultGuard {
    fn drop(&mut self) {
        ARMED.with(|armed| {
            armed.borrow_mut().remove(self.point);
        });
    }
}

/// Arm `point` on the current thread until the returned guard is dropped.
pub fn arm(point: &'static str) -> FaultGuard {
    ARMED.with(|armed| {
        armed.borrow_mut().insert(point);
    });
    FaultGuard { point }
}

/// Whether `point` is armed on the current thread.
pub fn is_armed(point: &str) -> bool {
    ARMED.with(|armed| armed.borrow().contains(point))
}

/// Fail with an injected IO error if `point` is armed.
#[inline]
pub fn check(point: &str) -> io::Result<()> {
    if is_armed(point) {
        tracing::debug!(point, "injected fault");
        return Err(io::Error::other(format!("injected fault at {point}")));
    }
    Ok(())
}

/// All defined fault points.
pub mod points {
    // Durable primitives
    pub const ATOMIC_REPLACE_BEFORE_WRITE: &str = "atomic_replace.before_write";
    pub const ATOMIC_REPLACE_BEFORE_FSYNC: &str = "atomic_replace.before_fsync";
    pub const ATOMIC_REPLACE_BEFORE_RENAME: &str = "atomic_replace.before_rename";
    pub const DURABLE_APPEND_BEFORE_WRITE: &str = "durable_append.before_write";
    pub const DURABLE_APPEND_BEFORE_FSYNC: &str = "durable_append.before_fsync";

    // Compaction steps
    pub const COMPACTION_BEFORE_DEST_WRITE: &str = "compaction.before_dest_write";
    pub const COMPACTION_BEFORE_SOURCE_TRUNCATE: &str = "compaction.before_source_truncate";

    pub fn all() -> &'static [&'static str] {
        &[
            ATOMIC_REPLACE_BEFORE_WRITE,
            ATOMIC_REPLACE_BEFORE_FSYNC,
            ATOMIC_REPLACE_BEFORE_RENAME,
            DURABLE_APPEND_BEFORE_WRITE,
            DURABLE_APPEND_BEFORE_FSYNC,
            COMPACTION_BEFORE_DEST_WRITE,
            COMPACTION_BEFORE_SOURCE_TRUNCATE,
        ]
    }
}
