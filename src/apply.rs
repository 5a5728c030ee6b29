use anyhow::Context;
use rayon::prelude::*;
use std::fs;
use std::path::Path;

use crate::config::PatchOptions;
use crate::engine;
use crate::error::{Error, Result};
use crate::header::PatchHeader;
use crate::manifest::{ApplyReport, BatchManifest, BatchSummary, JobOutcome, JobResult, PatchJob};
use crate::util;

/// Rebuild the new file in memory and check it against `options.expected_hash`.
pub fn patch_bytes(old: &[u8], patch: &[u8], options: &PatchOptions) -> Result<Vec<u8>> {
    let new = engine::apply(old, patch, options)?;
    verify(&new, options)?;
    Ok(new)
}

/// Apply the patch at `patch_path` to `old_path` and write the result to
/// `new_path`.
///
/// The output is written only after the whole file has been rebuilt and
/// verified, through a temp file renamed into place. On failure `new_path`
/// is not touched. `new_path` may equal `old_path`.
pub fn patch_file(
    old_path: &Path,
    patch_path: &Path,
    new_path: &Path,
    options: &PatchOptions,
) -> Result<ApplyReport> {
    let patch = util::map_file(patch_path)?;
    let header = PatchHeader::parse(&patch, options.offset_width)?;
    log::debug!(
        "{}: control {} bytes, diff {} bytes, new size {}",
        patch_path.display(),
        header.control_len,
        header.diff_len,
        header.new_size
    );

    // Scope the old mapping so it is dropped before the output is renamed over
    // it when patching in place.
    let (new, old_size, permissions) = {
        let old = util::map_file(old_path)?;
        let new = engine::apply_parsed(&old, &patch, &header, options)?;
        let permissions = fs::metadata(old_path).ok().map(|m| m.permissions());
        (new, old.len() as u64, permissions)
    };

    let hash = verify(&new, options)?;
    util::write_atomic(new_path, &new, permissions)?;

    log::info!(
        "Patched {} -> {} ({} bytes)",
        old_path.display(),
        new_path.display(),
        new.len()
    );

    Ok(ApplyReport {
        old_size,
        patch_size: patch.len() as u64,
        new_size: new.len() as u64,
        blake3: hash.to_hex().to_string(),
    })
}

fn verify(new: &[u8], options: &PatchOptions) -> Result<blake3::Hash> {
    let actual = util::hash_bytes(new);
    if let Some(expected) = options.expected_hash {
        if actual != expected {
            return Err(Error::HashMismatch {
                expected: expected.to_hex().to_string(),
                actual: actual.to_hex().to_string(),
            });
        }
    }
    Ok(actual)
}

/// Apply every job in `manifest`. Jobs are independent and run in parallel
/// on a Rayon pool of `threads` workers (all cores when `None`); each job is
/// applied sequentially on its own. A failing job does not stop the others.
pub async fn apply_batch(
    manifest: BatchManifest,
    options: PatchOptions,
    threads: Option<usize>,
) -> anyhow::Result<BatchSummary> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build().context("Failed to build patch worker pool")?;

    let outcomes = tokio::task::spawn_blocking(move || -> Vec<JobOutcome> {
        pool.install(|| {
            manifest
                .jobs
                .into_par_iter()
                .map(|job| {
                    let result = run_job(&job, &options);
                    JobOutcome { job, result }
                })
                .collect()
        })
    })
    .await
    .context("Patch worker task failed")?;

    let applied = outcomes
        .iter()
        .filter(|o| matches!(o.result, JobResult::Applied(_)))
        .count();

    Ok(BatchSummary {
        applied,
        failed: outcomes.len() - applied,
        outcomes,
    })
}

fn run_job(job: &PatchJob, options: &PatchOptions) -> JobResult {
    let options = match &job.blake3 {
        Some(hex) => match blake3::Hash::from_hex(hex) {
            Ok(hash) => options.clone().with_expected_hash(hash),
            Err(e) => {
                return JobResult::Failed {
                    error: format!("Invalid blake3 digest: {e}"),
                    retryable: false,
                }
            }
        },
        None => options.clone(),
    };

    match patch_file(&job.old, &job.patch, &job.new, &options) {
        Ok(report) => JobResult::Applied(report),
        Err(e) => {
            log::warn!("{} failed: {e}", job.patch.display());
            JobResult::Failed {
                error: e.brief(),
                retryable: e.is_retryable(),
            }
        }
    }
}
