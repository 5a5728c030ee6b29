//! BSDIFF40 container header.
//!
//! ```text
//! offset                 len        field
//! 0                      8          "BSDIFF40"
//! 8                      8          control_len (compressed)
//! 16                     8          diff_len (compressed)
//! 24                     8          new_size
//! 32                     control_len  control stream
//! 32+control_len         diff_len     diff stream
//! 32+control_len+diff_len  ...        extra stream, to end of patch
//! ```

use crate::error::{Error, Result};
use crate::offset::{self, OffsetWidth};

pub const MAGIC: &[u8; 8] = b"BSDIFF40";
pub const HEADER_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    pub control_len: u64,
    pub diff_len: u64,
    pub new_size: u64,
    extra_offset: u64,
}

/// The three compressed regions of a patch, borrowed from the container.
#[derive(Debug, Clone, Copy)]
pub struct Regions<'p> {
    pub control: &'p [u8],
    pub diff: &'p [u8],
    pub extra: &'p [u8],
}

impl PatchHeader {
    /// Parse and validate the fixed header at the start of `patch`.
    ///
    /// Stream offsets are not checked against the container length here; see
    /// [`PatchHeader::regions`].
    pub fn parse(patch: &[u8], width: OffsetWidth) -> Result<Self> {
        if patch.len() < HEADER_LEN {
            return Err(Error::MalformedHeader(patch.len()));
        }
        if &patch[..MAGIC.len()] != MAGIC {
            return Err(Error::BadMagic);
        }

        let control_len = length_field(patch, 8, "control length", width)?;
        let diff_len = length_field(patch, 16, "diff length", width)?;
        let new_size = length_field(patch, 24, "new size", width)?;

        let extra_offset = (HEADER_LEN as u64)
            .checked_add(control_len)
            .and_then(|o| o.checked_add(diff_len))
            .ok_or(Error::BadLength {
                field: "diff length",
                raw: diff_len,
            })?;

        Ok(Self {
            control_len,
            diff_len,
            new_size,
            extra_offset,
        })
    }

    pub const fn control_offset(&self) -> u64 {
        HEADER_LEN as u64
    }

    pub const fn diff_offset(&self) -> u64 {
        HEADER_LEN as u64 + self.control_len
    }

    pub const fn extra_offset(&self) -> u64 {
        self.extra_offset
    }

    /// Split `patch` into its control, diff and extra regions.
    ///
    /// Fails with `CorruptPatch` when a region starts or ends past the end of
    /// the container.
    pub fn regions<'p>(&self, patch: &'p [u8]) -> Result<Regions<'p>> {
        let diff_offset = region_bound(self.diff_offset(), patch.len(), "control")?;
        let extra_offset = region_bound(self.extra_offset(), patch.len(), "diff")?;

        Ok(Regions {
            control: &patch[HEADER_LEN..diff_offset],
            diff: &patch[diff_offset..extra_offset],
            extra: &patch[extra_offset..],
        })
    }
}

/// Non-negative field at `at`. `patch` is already known to hold the header.
fn length_field(patch: &[u8], at: usize, field: &'static str, width: OffsetWidth) -> Result<u64> {
    offset::decode_at(patch, at, width)
        .and_then(|value| u64::try_from(value).ok())
        .ok_or_else(|| Error::BadLength {
            field,
            raw: offset::raw_at(patch, at).unwrap_or_default(),
        })
}

fn region_bound(end: u64, patch_len: usize, stream: &str) -> Result<usize> {
    usize::try_from(end)
        .ok()
        .filter(|&end| end <= patch_len)
        .ok_or_else(|| {
            Error::corrupt(format!(
                "{stream} stream ends at {end}, past patch end {patch_len}"
            ))
        })
}
