//! Patch builders shared by the unit and integration tests.
//!
//! Not part of the public API. The builders panic on values that have no
//! BSDIFF40 encoding.

use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::Write;

use crate::header::MAGIC;
use crate::offset::encode;

pub fn bz(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Raw (uncompressed) control stream for the given triples.
pub fn control_bytes(controls: &[(i64, i64, i64)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(controls.len() * 24);
    for &(add, copy, seek) in controls {
        out.extend_from_slice(&encode(add).unwrap());
        out.extend_from_slice(&encode(copy).unwrap());
        out.extend_from_slice(&encode(seek).unwrap());
    }
    out
}

/// A complete BSDIFF40 container with bzip2-compressed streams.
pub fn build_patch(controls: &[(i64, i64, i64)], diff: &[u8], extra: &[u8], new_size: i64) -> Vec<u8> {
    let control = bz(&control_bytes(controls));
    let diff = bz(diff);
    let extra = bz(extra);

    let mut patch = MAGIC.to_vec();
    patch.extend_from_slice(&encode(control.len() as i64).unwrap());
    patch.extend_from_slice(&encode(diff.len() as i64).unwrap());
    patch.extend_from_slice(&encode(new_size).unwrap());
    patch.extend_from_slice(&control);
    patch.extend_from_slice(&diff);
    patch.extend_from_slice(&extra);
    patch
}

/// Single-triple patch turning `old` into `new`: bytewise difference over the
/// common prefix, the rest as extra.
pub fn naive_patch(old: &[u8], new: &[u8]) -> Vec<u8> {
    let common = old.len().min(new.len());
    let diff: Vec<u8> = new[..common]
        .iter()
        .zip(old)
        .map(|(n, o)| n.wrapping_sub(*o))
        .collect();
    build_patch(
        &[(common as i64, (new.len() - common) as i64, 0)],
        &diff,
        &new[common..],
        new.len() as i64,
    )
}

/// Patch from `old` to `new` in the shape bsdiff emits: matched blocks of
/// `block` bytes become add runs, every other block is replaced by extra
/// bytes, and the old cursor skips the replaced region with a seek.
pub fn blocky_patch(old: &[u8], new: &[u8], block: usize) -> Vec<u8> {
    let mut controls = Vec::new();
    let mut diff = Vec::new();
    let mut extra = Vec::new();
    let mut pos = 0;
    let mut take_add = true;

    while pos < new.len() {
        let len = block.min(new.len() - pos);
        if take_add && pos + len <= old.len() {
            diff.extend(
                new[pos..pos + len]
                    .iter()
                    .zip(&old[pos..pos + len])
                    .map(|(n, o)| n.wrapping_sub(*o)),
            );
            controls.push((len as i64, 0, 0));
        } else {
            extra.extend_from_slice(&new[pos..pos + len]);
            // skip the replaced old bytes while they exist
            let seek = if pos + len <= old.len() { len as i64 } else { 0 };
            controls.push((0, len as i64, seek));
        }
        pos += len;
        take_add = !take_add;
    }
    build_patch(&controls, &diff, &extra, new.len() as i64)
}

/// Deterministic pseudo-random bytes.
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    let step = |s: u64| s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut state = step(seed);
    (0..len)
        .map(|_| {
            state = step(state);
            (state >> 33) as u8
        })
        .collect()
}
