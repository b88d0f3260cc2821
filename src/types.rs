use crate::error::{Error, Result};

/// Raw key bytes.
pub type Key = Vec<u8>;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// What a log record does to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    /// Insert or overwrite the key.
    Set = 0x01,
    /// Remove the key. The record's value is empty.
    Delete = 0x02,
}

impl Action {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Action {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Action::Set),
            0x02 => Ok(Action::Delete),
            other => Err(Error::UnknownAction(other)),
        }
    }
}

/// XOR-fold of every byte in `parts`, taken in order.
///
/// A single flipped bit anywhere in the input always changes the result.
pub fn xor_fold(parts: &[&[u8]]) -> u8 {
    parts
        .iter()
        .flat_map(|part| part.iter())
        .fold(0u8, |acc, b| acc ^ b)
}

fn pair_checksum(key: &[u8], value: &[u8]) -> u8 {
    xor_fold(&[key, value])
}

fn record_checksum(key: &[u8], value: &[u8], action: Action) -> u8 {
    xor_fold(&[key, value]) ^ action.as_byte()
}

fn check(stored: u8, computed: u8) -> Result<()> {
    if stored == computed {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch { stored, computed })
    }
}

/// A materialized key-value pair, as stored in the base file.
///
/// Invariant: `checksum == xor_fold(key || value)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: Key,
    pub value: Value,
    pub checksum: u8,
}

impl KvPair {
    pub fn new(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        let checksum = pair_checksum(&key, &value);
        KvPair {
            key,
            value,
            checksum,
        }
    }

    /// Checksum recomputed from the current key and value.
    pub fn compute_checksum(&self) -> u8 {
        pair_checksum(&self.key, &self.value)
    }

    /// Re-verify the stored checksum.
    pub fn verify(&self) -> Result<()> {
        check(self.checksum, self.compute_checksum())
    }
}

/// A SET or DELETE entry in a log level.
///
/// Invariant: `checksum == xor_fold(key || value || action)`, so the
/// checksum also authenticates the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub key: Key,
    pub value: Value,
    pub action: Action,
    pub checksum: u8,
}

impl LogRecord {
    pub fn new(key: impl Into<Key>, value: impl Into<Value>, action: Action) -> Self {
        let key = key.into();
        let value = value.into();
        let checksum = record_checksum(&key, &value, action);
        LogRecord {
            key,
            value,
            action,
            checksum,
        }
    }

    /// Create a SET record.
    pub fn set(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self::new(key, value, Action::Set)
    }

    /// Create a DELETE record (empty value).
    pub fn delete(key: impl Into<Key>) -> Self {
        Self::new(key, Vec::new(), Action::Delete)
    }

    pub fn compute_checksum(&self) -> u8 {
        record_checksum(&self.key, &self.value, self.action)
    }

    /// Re-verify the stored checksum.
    pub fn verify(&self) -> Result<()> {
        check(self.checksum, self.compute_checksum())
    }

    /// Drop the action tag. The pair checksum is recomputed because it
    /// covers different bytes.
    pub fn into_pair(self) -> KvPair {
        KvPair::new(self.key, self.value)
    }
}
