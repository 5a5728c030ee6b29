use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on the length of [`Error::brief`] messages.
pub const MAX_MESSAGE_LEN: usize = 63;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a patch from being applied.
///
/// Every variant is terminal for the current invocation. Nothing is retried
/// internally; [`Error::is_retryable`] tells the caller which failures are
/// worth another attempt.
#[derive(Error, Debug)]
pub enum Error {
    /// A file could not be opened, mapped, read or written.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The output buffer could not be allocated.
    #[error("Out of memory allocating {0} bytes")]
    OutOfMemory(u64),

    /// The patch is too short to hold the 32-byte header.
    #[error("Malformed header: need 32 bytes, got {0}")]
    MalformedHeader(usize),

    #[error("Bad magic: not a BSDIFF40 patch")]
    BadMagic,

    /// A header length field is negative, too wide, or overflows.
    #[error("Bad length in {field}: raw {raw:#018x}")]
    BadLength { field: &'static str, raw: u64 },

    /// Control decoding, stream decoding or bounds validation failed.
    #[error("Corrupt patch: {0}")]
    CorruptPatch(String),

    #[error("Deadline of {0:?} exceeded while patching")]
    Timeout(Duration),

    /// The rebuilt file does not match the expected BLAKE3 digest.
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

impl Error {
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptPatch(reason.into())
    }

    /// I/O failures and deadline aborts may succeed on a second attempt;
    /// structural problems with the patch never will.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Timeout(_))
    }

    /// The error message cut to at most [`MAX_MESSAGE_LEN`] bytes, on a char
    /// boundary.
    pub fn brief(&self) -> String {
        let mut msg = self.to_string();
        if msg.len() > MAX_MESSAGE_LEN {
            let mut end = MAX_MESSAGE_LEN;
            while !msg.is_char_boundary(end) {
                end -= 1;
            }
            msg.truncate(end);
        }
        msg
    }
}
