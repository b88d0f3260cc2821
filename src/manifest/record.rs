use crate::error::{Error, Result};

/// Record type stored in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Begin = 0x01,
    Commit = 0x02,
}

impl RecordType {
    fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(RecordType::Begin),
            0x02 => Ok(RecordType::Commit),
            _ => Err(Error::Corruption(format!(
                "invalid manifest record type: {byte}"
            ))),
        }
    }
}

/// Length and CRC32 of a file's full contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub len: u64,
    pub crc: u32,
}

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Fingerprint {
            len: bytes.len() as u64,
            crc: crc32fast::hash(bytes),
        }
    }

    pub fn matches(&self, bytes: &[u8]) -> bool {
        *self == Fingerprint::of(bytes)
    }
}

/// A single manifest entry.
///
/// On-disk format:
/// ```text
/// ┌──────────┬──────────┬──────────┬─────────────────────┐
/// │ CRC (4B) │ Len (4B) │ Type(1B) │ Payload (Len - 1 B) │
/// └──────────┴──────────┴──────────┴─────────────────────┘
/// ```
///
/// Begin payload: `src(4) dest(4) src_len(8) src_crc(4) dest_len(8) dest_crc(4)`.
/// Commit payload: `src(4) dest(4)`. All integers little-endian.
///
/// CRC covers everything after the CRC field itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestRecord {
    /// A compaction is about to replace `dest`. `source` fingerprints the
    /// source file as it was read; `merged` fingerprints the new
    /// destination content.
    Begin {
        src: usize,
        dest: usize,
        source: Fingerprint,
        merged: Fingerprint,
    },
    /// Both files of the compaction are durable.
    Commit { src: usize, dest: usize },
}

const CRC_SIZE: usize = 4;
const LEN_SIZE: usize = 4;
const TYPE_SIZE: usize = 1;
const HEADER_SIZE: usize = CRC_SIZE + LEN_SIZE + TYPE_SIZE;

const PAIR_SIZE: usize = 8;
const FINGERPRINT_SIZE: usize = 12;

impl ManifestRecord {
    fn record_type(&self) -> RecordType {
        match self {
            ManifestRecord::Begin { .. } => RecordType::Begin,
            ManifestRecord::Commit { .. } => RecordType::Commit,
        }
    }

    fn pair(&self) -> (usize, usize) {
        match *self {
            ManifestRecord::Begin { src, dest, .. } | ManifestRecord::Commit { src, dest } => {
                (src, dest)
            }
        }
    }

    /// Serialize this record (including CRC header).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + PAIR_SIZE + 2 * FINGERPRINT_SIZE);

        // CRC placeholder, filled last
        buf.extend_from_slice(&[0u8; CRC_SIZE]);
        // Length placeholder
        buf.extend_from_slice(&[0u8; LEN_SIZE]);

        buf.push(self.record_type() as u8);

        let (src, dest) = self.pair();
        buf.extend_from_slice(&(src as u32).to_le_bytes());
        buf.extend_from_slice(&(dest as u32).to_le_bytes());

        if let ManifestRecord::Begin { source, merged, .. } = self {
            for fp in [source, merged] {
                buf.extend_from_slice(&fp.len.to_le_bytes());
                buf.extend_from_slice(&fp.crc.to_le_bytes());
            }
        }

        let len = (buf.len() - CRC_SIZE - LEN_SIZE) as u32;
        buf[CRC_SIZE..CRC_SIZE + LEN_SIZE].copy_from_slice(&len.to_le_bytes());

        let crc = crc32fast::hash(&buf[CRC_SIZE..]);
        buf[0..CRC_SIZE].copy_from_slice(&crc.to_le_bytes());

        buf
    }

    /// Deserialize the record at the front of `data`.
    /// Returns the record and its encoded size.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Corruption("manifest record too short".into()));
        }

        let stored_crc = read_u32(data, 0);
        let body_len = read_u32(data, CRC_SIZE) as usize;

        let total_len = CRC_SIZE + LEN_SIZE + body_len;
        if body_len < TYPE_SIZE || data.len() < total_len {
            return Err(Error::Corruption("manifest record truncated".into()));
        }

        let computed_crc = crc32fast::hash(&data[CRC_SIZE..total_len]);
        if stored_crc != computed_crc {
            return Err(Error::Corruption("manifest CRC mismatch".into()));
        }

        let offset = CRC_SIZE + LEN_SIZE;
        let record_type = RecordType::from_u8(data[offset])?;
        let payload = &data[offset + TYPE_SIZE..total_len];

        let expected = match record_type {
            RecordType::Begin => PAIR_SIZE + 2 * FINGERPRINT_SIZE,
            RecordType::Commit => PAIR_SIZE,
        };
        if payload.len() != expected {
            return Err(Error::Corruption(format!(
                "manifest payload is {} bytes, expected {expected}",
                payload.len()
            )));
        }

        let src = read_u32(payload, 0) as usize;
        let dest = read_u32(payload, 4) as usize;
        let record = match record_type {
            RecordType::Begin => ManifestRecord::Begin {
                src,
                dest,
                source: read_fingerprint(payload, PAIR_SIZE),
                merged: read_fingerprint(payload, PAIR_SIZE + FINGERPRINT_SIZE),
            },
            RecordType::Commit => ManifestRecord::Commit { src, dest },
        };
        Ok((record, total_len))
    }
}

// Callers check bounds first.
fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(bytes)
}

fn read_fingerprint(data: &[u8], at: usize) -> Fingerprint {
    Fingerprint {
        len: read_u64(data, at),
        crc: read_u32(data, at + 8),
    }
}
