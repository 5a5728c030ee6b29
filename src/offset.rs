//! Sign-magnitude integers as stored in BSDIFF40 headers and control triples.
//!
//! Each field is 8 bytes, little-endian. Bit 63 carries the sign and the low
//! bits carry the magnitude, so `-5` and `5` differ only in the top bit. This
//! is not two's complement.

pub const SIGN_BIT: u64 = 1 << 63;

/// How many magnitude bits a field may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffsetWidth {
    /// 63-bit magnitudes, as written by stock bsdiff.
    #[default]
    Full,
    /// 31-bit magnitudes. Caps every size and offset at `0x7fff_ffff`.
    Compact,
}

impl OffsetWidth {
    pub const fn max_magnitude(self) -> u64 {
        match self {
            OffsetWidth::Full => !SIGN_BIT,
            OffsetWidth::Compact => 0x7fff_ffff,
        }
    }
}

/// Decode one field. Returns `None` when a magnitude bit outside `width` is set.
///
/// Negative zero decodes to `0`.
pub fn decode(bytes: [u8; 8], width: OffsetWidth) -> Option<i64> {
    let raw = u64::from_le_bytes(bytes);
    let magnitude = raw & !SIGN_BIT;
    if magnitude > width.max_magnitude() {
        return None;
    }
    // magnitude <= i64::MAX here, so the cast and negation cannot overflow
    let value = magnitude as i64;
    Some(if raw & SIGN_BIT != 0 { -value } else { value })
}

/// Decode the field starting at `at`. `None` if the slice is too short or the
/// value is out of range.
pub fn decode_at(buf: &[u8], at: usize, width: OffsetWidth) -> Option<i64> {
    decode(field_at(buf, at)?, width)
}

/// The undecoded field at `at`, for error reports.
pub fn raw_at(buf: &[u8], at: usize) -> Option<u64> {
    field_at(buf, at).map(u64::from_le_bytes)
}

fn field_at(buf: &[u8], at: usize) -> Option<[u8; 8]> {
    buf.get(at..at.checked_add(8)?)?.try_into().ok()
}

/// Encode a value. `i64::MIN` has no sign-magnitude form and yields `None`.
pub fn encode(value: i64) -> Option<[u8; 8]> {
    if value == i64::MIN {
        return None;
    }
    let magnitude = value.unsigned_abs();
    let raw = if value < 0 { magnitude | SIGN_BIT } else { magnitude };
    Some(raw.to_le_bytes())
}
