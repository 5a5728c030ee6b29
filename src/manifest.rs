use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A list of independent patch jobs, read from JSON.
///
/// ```json
/// { "jobs": [ { "old": "v1/app.bin", "patch": "app.bsdiff", "new": "v2/app.bin" } ] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchManifest {
    pub jobs: Vec<PatchJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchJob {
    pub old: PathBuf,
    pub patch: PathBuf,
    pub new: PathBuf,
    /// Expected BLAKE3 of the rebuilt file, hex encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
}

impl BatchManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest: BatchManifest = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;

        // Relative paths are taken relative to the manifest's own directory.
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(manifest.rebased(base))
    }

    fn rebased(mut self, base: &Path) -> Self {
        for job in &mut self.jobs {
            for path in [&mut job.old, &mut job.patch, &mut job.new] {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
        self
    }
}

/// What a successful application produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub old_size: u64,
    pub patch_size: u64,
    pub new_size: u64,
    pub blake3: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResult {
    Applied(ApplyReport),
    Failed { error: String, retryable: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job: PatchJob,
    pub result: JobResult,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub applied: usize,
    pub failed: usize,
    pub outcomes: Vec<JobOutcome>,
}
