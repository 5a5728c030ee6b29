//! The add/copy/seek loop that rebuilds the new file.
//!
//! Each control triple `(add, copy, seek)` means: take `add` bytes from the
//! diff stream and add the old bytes under the old cursor to them, append
//! `copy` bytes from the extra stream verbatim, then move the old cursor by
//! `seek`. The loop runs until the output reaches the size declared in the
//! header.

use std::io::Read;
use std::ops::Range;
use std::time::Instant;

use crate::config::PatchOptions;
use crate::error::{Error, Result};
use crate::header::PatchHeader;
use crate::offset::{self, OffsetWidth};
use crate::stream::{StreamKind, SubStream};

/// One decoded control triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub add: usize,
    pub copy: usize,
    pub seek: i64,
}

impl Control {
    pub const LEN: usize = 24;

    pub fn decode(buf: &[u8; Self::LEN], width: OffsetWidth) -> Result<Self> {
        let field = |at: usize, name: &str| {
            offset::decode_at(buf, at, width)
                .ok_or_else(|| Error::corrupt(format!("control {name} out of range")))
        };
        let add = field(0, "add length")?;
        let copy = field(8, "copy length")?;
        let seek = field(16, "seek")?;

        let length = |value: i64, name: &str| {
            usize::try_from(value)
                .map_err(|_| Error::corrupt(format!("control {name} is {value}")))
        };
        Ok(Self {
            add: length(add, "add length")?,
            copy: length(copy, "copy length")?,
            seek,
        })
    }
}

/// Parse `patch` and rebuild the new file from `old`.
pub fn apply(old: &[u8], patch: &[u8], options: &PatchOptions) -> Result<Vec<u8>> {
    let header = PatchHeader::parse(patch, options.offset_width)?;
    apply_parsed(old, patch, &header, options)
}

/// Rebuild the new file from a patch whose header is already parsed.
pub fn apply_parsed(
    old: &[u8],
    patch: &[u8],
    header: &PatchHeader,
    options: &PatchOptions,
) -> Result<Vec<u8>> {
    options.check_new_size(header.new_size)?;
    let regions = header.regions(patch)?;
    apply_streams(
        old,
        header.new_size,
        regions.control,
        regions.diff,
        regions.extra,
        options,
    )
}

/// Drive the edit loop over three compressed regions, one bzip2 decoder each.
pub fn apply_streams(
    old: &[u8],
    new_size: u64,
    control: &[u8],
    diff: &[u8],
    extra: &[u8],
    options: &PatchOptions,
) -> Result<Vec<u8>> {
    Engine::new(
        old,
        new_size,
        SubStream::bzip2(StreamKind::Control, control),
        SubStream::bzip2(StreamKind::Diff, diff),
        SubStream::bzip2(StreamKind::Extra, extra),
        options,
    )?
    .run()
}

/// Patch state: the old buffer, the output written so far, and one cursor
/// per sub-stream.
///
/// The output capacity is reserved up front but only filled as triples are
/// replayed, so a patch that lies about its size fails before the memory is
/// touched.
pub struct Engine<'o, 'c, C, D, E> {
    old: &'o [u8],
    new: Vec<u8>,
    new_size: usize,
    old_pos: usize,
    control: SubStream<C>,
    diff: SubStream<D>,
    extra: SubStream<E>,
    options: &'c PatchOptions,
}

impl<'o, 'c, C: Read, D: Read, E: Read> Engine<'o, 'c, C, D, E> {
    /// Reserve the output buffer. Fails with `OutOfMemory` instead of
    /// aborting when `new_size` cannot be satisfied.
    pub fn new(
        old: &'o [u8],
        new_size: u64,
        control: SubStream<C>,
        diff: SubStream<D>,
        extra: SubStream<E>,
        options: &'c PatchOptions,
    ) -> Result<Self> {
        let (new, new_size) = reserve(new_size)?;
        Ok(Self {
            old,
            new,
            new_size,
            old_pos: 0,
            control,
            diff,
            extra,
            options,
        })
    }

    pub fn run(mut self) -> Result<Vec<u8>> {
        let started = Instant::now();
        let mut triples = 0usize;

        while self.new.len() < self.new_size {
            if let Some(deadline) = self.options.deadline {
                if started.elapsed() >= deadline {
                    return Err(Error::Timeout(deadline));
                }
            }

            let ctrl = self.next_control()?;
            log::trace!(
                "triple {triples}: add={} copy={} seek={} at old={} new={}",
                ctrl.add,
                ctrl.copy,
                ctrl.seek,
                self.old_pos,
                self.new.len()
            );
            self.add(ctrl.add)?;
            self.copy(ctrl.copy)?;
            self.seek(ctrl.seek)?;
            triples += 1;
        }

        log::debug!(
            "rebuilt {} bytes from {} old bytes in {triples} triples \
             (control {} / diff {} / extra {} bytes decoded)",
            self.new.len(),
            self.old.len(),
            self.control.position(),
            self.diff.position(),
            self.extra.position()
        );
        Ok(self.new)
    }

    fn next_control(&mut self) -> Result<Control> {
        let mut buf = [0u8; Control::LEN];
        self.control.read_exact(&mut buf)?;
        Control::decode(&buf, self.options.offset_width)
    }

    /// Output end after writing `len` more bytes, if it stays within the
    /// declared size.
    fn bounded_end(&self, len: usize, phase: &str) -> Result<usize> {
        self.new
            .len()
            .checked_add(len)
            .filter(|&end| end <= self.new_size)
            .ok_or_else(|| {
                Error::corrupt(format!(
                    "{phase} of {len} bytes at {} overruns new size {}",
                    self.new.len(),
                    self.new_size
                ))
            })
    }

    /// Extend the output by `len` zeroed bytes and return their range.
    fn grow(&mut self, len: usize, phase: &str) -> Result<Range<usize>> {
        let start = self.new.len();
        let end = self.bounded_end(len, phase)?;
        self.new.resize(end, 0);
        Ok(start..end)
    }

    /// Diff bytes plus old bytes, wrapping. Positions past the end of the old
    /// buffer keep the raw diff byte; the following seek must bring the old
    /// cursor back within the old buffer.
    fn add(&mut self, len: usize) -> Result<()> {
        let range = self.grow(len, "add")?;
        let dst = &mut self.new[range];
        self.diff.read_exact(dst)?;

        let old = self.old.get(self.old_pos..).unwrap_or_default();
        for (n, o) in dst.iter_mut().zip(old) {
            *n = n.wrapping_add(*o);
        }

        // both terms are bounded by isize::MAX-sized buffers
        self.old_pos += len;
        Ok(())
    }

    fn copy(&mut self, len: usize) -> Result<()> {
        let range = self.grow(len, "copy")?;
        self.extra.read_exact(&mut self.new[range])?;
        Ok(())
    }

    /// Move the old cursor; it must land within `[0, old.len()]`.
    fn seek(&mut self, delta: i64) -> Result<()> {
        let target = i64::try_from(self.old_pos)
            .ok()
            .and_then(|pos| pos.checked_add(delta))
            .and_then(|pos| usize::try_from(pos).ok())
            .filter(|&pos| pos <= self.old.len());

        match target {
            Some(pos) => {
                self.old_pos = pos;
                Ok(())
            }
            None => Err(Error::corrupt(format!(
                "seek by {delta} from {} leaves old file of {} bytes",
                self.old_pos,
                self.old.len()
            ))),
        }
    }
}

fn reserve(size: u64) -> Result<(Vec<u8>, usize)> {
    let len = usize::try_from(size).map_err(|_| Error::OutOfMemory(size))?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory(size))?;
    Ok((buf, len))
}
