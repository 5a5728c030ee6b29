//! Decompression cursors over the three patch regions.
//!
//! Each region was compressed on its own when the patch was built, so each
//! gets its own decoder. A read either fills the whole buffer or fails; a
//! short stream is treated the same as a codec error.

use crate::error::{Error, Result};
use bzip2::read::BzDecoder;
use std::fmt;
use std::io::{ErrorKind, Read};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Control,
    Diff,
    Extra,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamKind::Control => "control",
            StreamKind::Diff => "diff",
            StreamKind::Extra => "extra",
        })
    }
}

/// A decompressed sub-stream with a running count of bytes delivered.
pub struct SubStream<R> {
    kind: StreamKind,
    inner: R,
    position: u64,
}

impl<'p> SubStream<BzDecoder<&'p [u8]>> {
    /// Open a bzip2 decoder over one compressed region.
    pub fn bzip2(kind: StreamKind, region: &'p [u8]) -> Self {
        Self::new(kind, BzDecoder::new(region))
    }
}

impl<R: Read> SubStream<R> {
    pub fn new(kind: StreamKind, inner: R) -> Self {
        Self {
            kind,
            inner,
            position: 0,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Decompressed bytes delivered so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fill `buf` completely or fail with `CorruptPatch`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                Error::corrupt(format!(
                    "{} stream ended before byte {}",
                    self.kind,
                    self.position + buf.len() as u64
                ))
            } else {
                Error::corrupt(format!(
                    "{} stream decode failed at byte {}: {e}",
                    self.kind, self.position
                ))
            }
        })?;
        self.position += buf.len() as u64;
        Ok(())
    }
}
