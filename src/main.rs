use bspatch::{apply_batch, patch_file, BatchManifest, OffsetWidth, PatchOptions};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "bspatch", about = "Apply BSDIFF40 binary patches")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn log_level(&self) -> log::LevelFilter {
        match (self.verbose, self.quiet) {
            (0, true) => log::LevelFilter::Error,
            (0, false) => log::LevelFilter::Warn,
            (1, _) => log::LevelFilter::Info,
            (2, _) => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild NEW from OLD and a BSDIFF40 patch
    Apply {
        /// Path to the old (reference) file
        old: PathBuf,
        /// Path to the patch file
        patch: PathBuf,
        /// Output path for the rebuilt file (may equal OLD)
        new: PathBuf,
        /// Expected BLAKE3 of the rebuilt file, hex encoded
        #[arg(long)]
        expect_blake3: Option<String>,
        #[command(flatten)]
        limits: LimitArgs,
    },
    /// Apply every job listed in a JSON manifest
    Batch {
        /// Path to the manifest file
        manifest: PathBuf,
        /// Number of worker threads (default: all cores)
        #[arg(long, short)]
        jobs: Option<usize>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        limits: LimitArgs,
    },
}

#[derive(Args)]
struct LimitArgs {
    /// Reject integers wider than 31 bits
    #[arg(long)]
    compact_offsets: bool,
    /// Abort a patch that runs longer than this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Refuse patches declaring a larger output, in bytes
    #[arg(long)]
    max_size: Option<u64>,
}

impl LimitArgs {
    fn options(&self) -> PatchOptions {
        let mut options = PatchOptions::new();
        if self.compact_offsets {
            options = options.with_offset_width(OffsetWidth::Compact);
        }
        if let Some(secs) = self.timeout_secs {
            options = options.with_deadline(Duration::from_secs(secs));
        }
        if let Some(limit) = self.max_size {
            options = options.with_max_new_size(limit);
        }
        options
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG, when set, overrides the flags
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Apply {
            old,
            patch,
            new,
            expect_blake3,
            limits,
        } => {
            let mut options = limits.options();
            if let Some(hex) = expect_blake3 {
                match blake3::Hash::from_hex(&hex) {
                    Ok(hash) => options = options.with_expected_hash(hash),
                    Err(e) => {
                        eprintln!("Invalid --expect-blake3: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            }

            let start = Instant::now();
            match patch_file(&old, &patch, &new, &options) {
                Ok(report) => {
                    if !cli.quiet {
                        println!("Patch applied successfully!");
                        println!("  Old: {} ({} bytes)", old.display(), report.old_size);
                        println!("  Patch: {} ({} bytes)", patch.display(), report.patch_size);
                        println!("  New: {} ({} bytes)", new.display(), report.new_size);
                        println!("  BLAKE3: {}", report.blake3);
                        println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    log::debug!("full error: {e:?}");
                    eprintln!("Patch failed: {}", e.brief());
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Batch {
            manifest,
            jobs,
            json,
            limits,
        } => match run_batch(manifest, jobs, json, limits.options(), cli.quiet).await {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                eprintln!("Batch failed: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

/// Returns whether every job succeeded.
async fn run_batch(
    manifest_path: PathBuf,
    jobs: Option<usize>,
    json: bool,
    options: PatchOptions,
    quiet: bool,
) -> anyhow::Result<bool> {
    let manifest = BatchManifest::load(&manifest_path)?;
    let total = manifest.jobs.len();

    let start = Instant::now();
    let summary = apply_batch(manifest, options, jobs).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for outcome in &summary.outcomes {
            if let bspatch::manifest::JobResult::Failed { error, .. } = &outcome.result {
                eprintln!("  {}: {}", outcome.job.patch.display(), error);
            }
        }
        if !quiet {
            println!("Batch finished: {total} jobs");
            println!("  Applied: {}", summary.applied);
            println!("  Failed: {}", summary.failed);
            println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());
        }
    }

    Ok(summary.failed == 0)
}
