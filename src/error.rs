use std::io;

use thiserror::Error;

/// Why a record failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    /// Input ended in the middle of a record.
    #[error("record truncated")]
    Truncated,
    /// An escape byte was followed by something other than `u`, `n` or `e`.
    #[error("invalid escape sequence {0:#04x}")]
    InvalidEscape(u8),
    /// A separator or newline showed up where field content was expected.
    #[error("unexpected delimiter {0:#04x}")]
    UnexpectedDelimiter(u8),
    /// The byte after the action was not a newline.
    #[error("missing record terminator, found {0:#04x}")]
    MissingTerminator(u8),
}

/// Unified error type for the store.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from disk operations (open, read, write, fsync, rename).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Truncated or malformed record framing. `offset` is where the
    /// offending record starts.
    #[error("decode error at byte {offset}: {kind}")]
    Decode { offset: usize, kind: DecodeErrorKind },

    /// Stored checksum disagrees with the bytes it covers.
    #[error("checksum mismatch: stored {stored:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { stored: u8, computed: u8 },

    /// Action byte is neither SET nor DELETE.
    #[error("unknown action byte {0:#04x}")]
    UnknownAction(u8),

    /// Structurally valid data that breaks an on-disk invariant.
    #[error("corruption: {0}")]
    Corruption(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("invalid compaction: {0}")]
    InvalidCompaction(String),

    /// A compaction triggered by `balance` failed. Any batch that was
    /// ingested before the failure is already durable in level 0.
    #[error("compaction of level {src} into level {dest} failed: {source}")]
    Compaction {
        src: usize,
        dest: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// True for integrity failures that retrying cannot fix.
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::Decode { .. }
            | Error::ChecksumMismatch { .. }
            | Error::UnknownAction(_)
            | Error::Corruption(_) => true,
            Error::Compaction { source, .. } => source.is_corruption(),
            _ => false,
        }
    }

    pub(crate) fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Error::Decode { offset, kind }
    }
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
