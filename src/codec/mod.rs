//! Record framing for level files.
//!
//! Log record (levels 0..N-1):
//! ```text
//! ┌─────────────┬───────────┬─────┬─────────────┬─────┬───────────┬─────────┐
//! │ checksum(1) │ key (var) │ SEP │ value (var) │ SEP │ action(1) │ NEWLINE │
//! └─────────────┴───────────┴─────┴─────────────┴─────┴───────────┴─────────┘
//! ```
//!
//! Key-value pair (base file): `checksum | key | SEP | value | NEWLINE`.
//!
//! The checksum, key and value fields are escaped: SEP, NEWLINE and ESCAPE
//! inside them are written as `ESCAPE 'u'`, `ESCAPE 'n'` and `ESCAPE 'e'`.
//! So every unescaped NEWLINE ends a record, each record is exactly one
//! line, and arbitrary key and value bytes round-trip.
//!
//! Decoding does not verify checksums. Callers that read from disk run
//! `verify()` on every decoded item.

mod frame;
pub mod reader;

use crate::error::Result;
use crate::types::{Action, KvPair, LogRecord};

pub use reader::FrameIter;

/// Field separator.
pub const SEPARATOR: u8 = 0x1F;
/// Record terminator.
pub const NEWLINE: u8 = b'\n';
/// Escape prefix for reserved bytes inside fields.
pub const ESCAPE: u8 = 0x1B;

/// Something with a one-line on-disk framing.
pub trait Frame: Sized {
    /// Append the encoded frame to `buf`.
    fn encode_into(&self, buf: &mut Vec<u8>);

    /// Decode one frame starting at `data[start..]`.
    /// Returns the item and the offset just past its NEWLINE.
    fn decode_at(data: &[u8], start: usize) -> Result<(Self, usize)>;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Decode the frame at the front of `data`, returning it with the
    /// number of bytes consumed.
    fn decode(data: &[u8]) -> Result<(Self, usize)> {
        Self::decode_at(data, 0)
    }
}

impl Frame for LogRecord {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        frame::escape_into(buf, &[self.checksum]);
        frame::escape_into(buf, &self.key);
        buf.push(SEPARATOR);
        frame::escape_into(buf, &self.value);
        buf.push(SEPARATOR);
        buf.push(self.action.as_byte());
        buf.push(NEWLINE);
    }

    fn decode_at(data: &[u8], start: usize) -> Result<(Self, usize)> {
        let mut cursor = frame::Cursor::new(data, start);
        let checksum = cursor.escaped_byte()?;
        let key = cursor.field(SEPARATOR)?;
        let value = cursor.field(SEPARATOR)?;
        let action = Action::try_from(cursor.byte()?)?;
        cursor.terminator()?;

        let record = LogRecord {
            key,
            value,
            action,
            checksum,
        };
        Ok((record, cursor.position()))
    }
}

impl Frame for KvPair {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        frame::escape_into(buf, &[self.checksum]);
        frame::escape_into(buf, &self.key);
        buf.push(SEPARATOR);
        frame::escape_into(buf, &self.value);
        buf.push(NEWLINE);
    }

    fn decode_at(data: &[u8], start: usize) -> Result<(Self, usize)> {
        let mut cursor = frame::Cursor::new(data, start);
        let checksum = cursor.escaped_byte()?;
        let key = cursor.field(SEPARATOR)?;
        let value = cursor.field(NEWLINE)?;

        let pair = KvPair {
            key,
            value,
            checksum,
        };
        Ok((pair, cursor.position()))
    }
}

/// Encode a sequence of frames back to back.
pub fn encode_all<T: Frame>(items: &[T]) -> Vec<u8> {
    let mut buf = Vec::new();
    for item in items {
        item.encode_into(&mut buf);
    }
    buf
}

/// Decode every frame in `data`. Fails on the first malformed frame.
pub fn decode_all<T: Frame>(data: &[u8]) -> Result<Vec<T>> {
    FrameIter::new(data).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeErrorKind, Error};

    #[test]
    fn plain_record_layout() {
        let record = LogRecord::set(b"ab".to_vec(), b"cd".to_vec());
        let encoded = record.encode();
        assert_eq!(
            encoded,
            vec![record.checksum, b'a', b'b', SEPARATOR, b'c', b'd', SEPARATOR, 0x01, NEWLINE]
        );
    }

    #[test]
    fn reserved_checksum_byte_is_escaped() {
        // Pick a key whose record checksum is exactly NEWLINE.
        let key = vec![NEWLINE ^ Action::Set.as_byte()];
        let record = LogRecord::set(key, Vec::new());
        assert_eq!(record.checksum, NEWLINE);

        let encoded = record.encode();
        assert_eq!(&encoded[..2], &[ESCAPE, b'n']);
        assert_eq!(encoded.iter().filter(|&&b| b == NEWLINE).count(), 1);

        let (decoded, used) = LogRecord::decode(&encoded).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(used, encoded.len());
    }

    #[test]
    fn pair_without_action_byte() {
        let pair = KvPair::new(b"k".to_vec(), b"v".to_vec());
        let encoded = pair.encode();
        assert_eq!(encoded, vec![pair.checksum, b'k', SEPARATOR, b'v', NEWLINE]);
        assert_eq!(KvPair::decode(&encoded).unwrap().0, pair);
    }

    #[test]
    fn decode_reports_record_start_offset() {
        let mut data = LogRecord::set(b"first".to_vec(), b"1".to_vec()).encode();
        let second_start = data.len();
        data.extend_from_slice(&LogRecord::set(b"second".to_vec(), b"2".to_vec()).encode());
        data.pop(); // drop the final newline

        match decode_all::<LogRecord>(&data) {
            Err(Error::Decode { offset, kind }) => {
                assert_eq!(offset, second_start);
                assert_eq!(kind, DecodeErrorKind::Truncated);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }
}
