// Crash recovery tests
// Interrupted compactions, torn level 0 tails, corrupted level files.

use std::fs;

use logdb::fault::{self, points};
use logdb::manifest::{Fingerprint, Manifest};
use logdb::types::{KvPair, LogRecord};
use logdb::{Error, LogDb, Options};

fn set(key: &str, value: &str) -> LogRecord {
    LogRecord::set(key.as_bytes().to_vec(), value.as_bytes().to_vec())
}

fn counts(db: &LogDb) -> Vec<usize> {
    db.stats().levels.iter().map(|l| l.record_count).collect()
}

fn options(dir: &std::path::Path) -> Options {
    Options::new(dir).base_capacity(2).level_count(3)
}

// =============================================================================
// Test 1: Crash between destination write and source truncation rolls forward
// =============================================================================
#[test]
fn interrupted_truncation_rolls_forward() {
    let dir = tempfile::tempdir().unwrap();

    {
        let db = LogDb::open(options(dir.path())).unwrap();
        let _fault = fault::arm(points::COMPACTION_BEFORE_SOURCE_TRUNCATE);
        let err = db.ingest(&[set("a", "1"), set("b", "2"), set("c", "3")]).unwrap_err();
        assert!(matches!(err, Error::Compaction { src: 0, dest: 1, .. }));
        // Both files now hold the same three records. Simulate a crash.
    }
    assert!(!fs::read(dir.path().join("latest.temp")).unwrap().is_empty());
    assert!(!fs::read(dir.path().join("l1.dbl")).unwrap().is_empty());

    let db = LogDb::open(options(dir.path())).unwrap();
    assert_eq!(counts(&db), vec![0, 3, 0]);
    assert!(fs::read(dir.path().join("latest.temp")).unwrap().is_empty());
    assert!(fs::read(dir.path().join("MANIFEST")).unwrap().is_empty());

    db.materialize().unwrap();
    assert_eq!(db.stats().base_count, 3, "records were duplicated");
}

// =============================================================================
// Test 2: Crash before the destination write leaves the source in place
// =============================================================================
#[test]
fn interrupted_before_destination_keeps_source() {
    let dir = tempfile::tempdir().unwrap();

    {
        let db = LogDb::open(options(dir.path())).unwrap();
        let _fault = fault::arm(points::COMPACTION_BEFORE_DEST_WRITE);
        assert!(db.ingest(&[set("a", "1"), set("b", "2"), set("c", "3")]).is_err());
    }

    let db = LogDb::open(options(dir.path())).unwrap();
    assert_eq!(counts(&db), vec![3, 0, 0]);
    assert_eq!(db.snapshot().unwrap().len(), 3);

    db.balance().unwrap();
    assert_eq!(counts(&db), vec![0, 3, 0]);
}

// =============================================================================
// Test 3: A source that changed after the journaled compaction is not cut
// =============================================================================
#[test]
fn refilled_source_is_not_truncated() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = LogDb::open(options(dir.path())).unwrap();
        db.ingest(&[set("a", "1"), set("b", "2"), set("c", "3")]).unwrap();
        db.ingest(&[set("d", "4")]).unwrap();
        db.close().unwrap();
    }

    // Journal a compaction whose destination landed but whose source has
    // since moved on.
    let level1 = fs::read(dir.path().join("l1.dbl")).unwrap();
    let manifest = Manifest::open(dir.path()).unwrap();
    manifest
        .begin(0, 1, Fingerprint::of(b"some older level 0"), Fingerprint::of(&level1))
        .unwrap();

    let db = LogDb::open(options(dir.path())).unwrap();
    assert_eq!(counts(&db), vec![1, 3, 0]);
    assert_eq!(db.get(b"d").unwrap(), Some(b"4".to_vec()));
}

// =============================================================================
// Test 4: Torn level 0 tail is cut on open
// =============================================================================
#[test]
fn torn_tail_is_cut() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latest.temp");
    {
        let db = LogDb::open(options(dir.path())).unwrap();
        db.ingest(&[set("a", "1"), set("b", "2")]).unwrap();
    }
    let clean = fs::read(&path).unwrap();

    // Half of a third record, as a crash mid-append would leave it.
    let partial = logdb::codec::encode_all(&[set("c", "3")]);
    let mut torn = clean.clone();
    torn.extend_from_slice(&partial[..partial.len() - 2]);
    fs::write(&path, &torn).unwrap();

    let db = LogDb::open(options(dir.path())).unwrap();
    assert_eq!(counts(&db), vec![2, 0, 0]);
    assert_eq!(fs::read(&path).unwrap(), clean);
    assert_eq!(db.get(b"c").unwrap(), None);
}

// =============================================================================
// Test 5: Out-of-order sorted level fails to open
// =============================================================================
#[test]
fn unsorted_level_file_is_corruption() {
    let dir = tempfile::tempdir().unwrap();
    LogDb::open(options(dir.path())).unwrap().close().unwrap();

    let bytes = logdb::codec::encode_all(&[set("b", "2"), set("a", "1")]);
    fs::write(dir.path().join("l1.dbl"), bytes).unwrap();

    let err = LogDb::open(options(dir.path())).unwrap_err();
    assert!(matches!(err, Error::Corruption(_)));
    assert!(err.is_corruption());
}

// =============================================================================
// Test 6: A flipped bit in the base file is caught on open
// =============================================================================
#[test]
fn corrupt_base_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    LogDb::open(options(dir.path())).unwrap().close().unwrap();

    let mut bytes = logdb::codec::encode_all(&[KvPair::new(b"key".to_vec(), b"value".to_vec())]);
    // Flip a bit inside the value ("value" -> "walue").
    let at = bytes.iter().position(|&b| b == b'v').unwrap();
    bytes[at] ^= 0x01;
    fs::write(dir.path().join("real.db"), bytes).unwrap();

    let err = LogDb::open(options(dir.path())).unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));
    assert!(err.is_corruption());
}
