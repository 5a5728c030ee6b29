//! Apply BSDIFF40 binary patches.
//!
//! A BSDIFF40 patch is a 32-byte header followed by three independently
//! bzip2-compressed streams (control, diff, extra). Replaying the control
//! triples against the old file rebuilds the new one byte for byte.
//!
//! ```no_run
//! use bspatch::{patch_file, PatchOptions};
//! use std::path::Path;
//!
//! let report = patch_file(
//!     Path::new("app-1.0.bin"),
//!     Path::new("app-1.0-to-1.1.bsdiff"),
//!     Path::new("app-1.1.bin"),
//!     &PatchOptions::new(),
//! )?;
//! println!("rebuilt {} bytes, blake3 {}", report.new_size, report.blake3);
//! # Ok::<(), bspatch::Error>(())
//! ```

pub mod apply;
pub mod config;
pub mod engine;
pub mod error;
pub mod header;
pub mod manifest;
pub mod offset;
pub mod stream;
pub mod util;

#[doc(hidden)]
pub mod testing;

pub use apply::{apply_batch, patch_bytes, patch_file};
pub use config::PatchOptions;
pub use error::{Error, Result, MAX_MESSAGE_LEN};
pub use header::PatchHeader;
pub use manifest::{ApplyReport, BatchManifest, BatchSummary};
pub use offset::OffsetWidth;
