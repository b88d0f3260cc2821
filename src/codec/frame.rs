use crate::codec::{ESCAPE, NEWLINE, SEPARATOR};
use crate::error::{DecodeErrorKind, Error, Result};

/// Append `bytes` to `buf`, escaping SEP, NEWLINE and ESCAPE.
pub(super) fn escape_into(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.reserve(bytes.len());
    for &b in bytes {
        match b {
            SEPARATOR => buf.extend_from_slice(&[ESCAPE, b'u']),
            NEWLINE => buf.extend_from_slice(&[ESCAPE, b'n']),
            ESCAPE => buf.extend_from_slice(&[ESCAPE, b'e']),
            _ => buf.push(b),
        }
    }
}

fn unescape(code: u8) -> Option<u8> {
    match code {
        b'u' => Some(SEPARATOR),
        b'n' => Some(NEWLINE),
        b'e' => Some(ESCAPE),
        _ => None,
    }
}

/// Position-based scanner over one frame.
///
/// Every error carries the offset where the frame started, not where the
/// scanner stopped, so a reader can cut a torn tail at a frame boundary.
pub(super) struct Cursor<'a> {
    data: &'a [u8],
    start: usize,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(super) fn new(data: &'a [u8], start: usize) -> Self {
        Cursor {
            data,
            start,
            pos: start,
        }
    }

    pub(super) fn position(&self) -> usize {
        self.pos
    }

    fn fail(&self, kind: DecodeErrorKind) -> Error {
        Error::decode(self.start, kind)
    }

    /// Next raw byte.
    pub(super) fn byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| self.fail(DecodeErrorKind::Truncated))?;
        self.pos += 1;
        Ok(b)
    }

    fn escaped(&mut self) -> Result<u8> {
        let code = self.byte()?;
        unescape(code).ok_or_else(|| self.fail(DecodeErrorKind::InvalidEscape(code)))
    }

    /// A single escaped byte (the checksum field).
    pub(super) fn escaped_byte(&mut self) -> Result<u8> {
        match self.byte()? {
            ESCAPE => self.escaped(),
            b @ (SEPARATOR | NEWLINE) => Err(self.fail(DecodeErrorKind::UnexpectedDelimiter(b))),
            b => Ok(b),
        }
    }

    /// Escaped content up to and including the unescaped `end` byte.
    pub(super) fn field(&mut self, end: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            match self.byte()? {
                ESCAPE => out.push(self.escaped()?),
                b if b == end => return Ok(out),
                b @ (SEPARATOR | NEWLINE) => {
                    return Err(self.fail(DecodeErrorKind::UnexpectedDelimiter(b)));
                }
                b => out.push(b),
            }
        }
    }

    /// The NEWLINE closing a frame.
    pub(super) fn terminator(&mut self) -> Result<()> {
        match self.byte()? {
            NEWLINE => Ok(()),
            b => Err(self.fail(DecodeErrorKind::MissingTerminator(b))),
        }
    }
}
