use std::time::Duration;

use crate::error::{Error, Result};
use crate::offset::OffsetWidth;

/// Knobs for a single patch application.
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    /// Width of header and control integers.
    pub offset_width: OffsetWidth,
    /// Abort with [`Error::Timeout`] once the edit loop has run this long.
    pub deadline: Option<Duration>,
    /// Refuse patches that declare a larger output, before allocating.
    pub max_new_size: Option<u64>,
    /// Verify the rebuilt bytes against this BLAKE3 digest.
    pub expected_hash: Option<blake3::Hash>,
}

impl PatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset_width(mut self, width: OffsetWidth) -> Self {
        self.offset_width = width;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_new_size(mut self, limit: u64) -> Self {
        self.max_new_size = Some(limit);
        self
    }

    pub fn with_expected_hash(mut self, hash: blake3::Hash) -> Self {
        self.expected_hash = Some(hash);
        self
    }

    pub(crate) fn check_new_size(&self, new_size: u64) -> Result<()> {
        match self.max_new_size {
            Some(limit) if new_size > limit => Err(Error::BadLength {
                field: "new size",
                raw: new_size,
            }),
            _ => Ok(()),
        }
    }
}
