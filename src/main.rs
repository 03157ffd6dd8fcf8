mod cli;

use anyhow::{Context, Result};
use blackfrag_rs::config::parse_sample_specs;
use blackfrag_rs::stats::write_summary;
use blackfrag_rs::{load_blacklist, run_sample, BlacklistIndex, FilterStats, SampleConfig};
use clap::Parser;
use mimalloc::MiMalloc;
use std::fs::File;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_logging(args: &cli::Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    match &args.log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_logging(&args)?;

    let samples = parse_sample_specs(&args.inputs)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;
    let regions = load_blacklist(&args.blacklist)?;
    let blacklist = BlacklistIndex::new(&regions);
    if blacklist.is_empty() {
        tracing::warn!(
            blacklist = %args.blacklist.display(),
            "blacklist has no regions; nothing will be excluded"
        );
    }
    tracing::info!(
        regions = blacklist.region_count(),
        samples = samples.len(),
        "loaded blacklist"
    );

    let mut completed: Vec<FilterStats> = Vec::with_capacity(samples.len());
    let mut failed: Vec<String> = Vec::new();
    for (sample_id, input) in samples {
        let mut config = SampleConfig::new(sample_id, input, &args.out_dir);
        config.scratch_root = args.tmp_dir.clone();
        config.threads = usize::from(args.threads.max(1));
        config.sort_buffer = args.sort_buffer;

        match run_sample(&config, &blacklist) {
            Ok(stats) => completed.push(stats),
            Err(e) => {
                tracing::error!(
                    sample = %config.sample_id,
                    error = %format!("{e:#}"),
                    "sample failed"
                );
                failed.push(config.sample_id.clone());
                if !args.keep_going {
                    break;
                }
            }
        }
    }

    let summary = args.summary_path();
    write_summary(&summary, &completed)
        .with_context(|| format!("failed to write summary {}", summary.display()))?;

    let excluded_reads: u64 = completed.iter().map(|s| s.excluded_reads).sum();
    let kept_reads: u64 = completed.iter().map(|s| s.kept_reads).sum();
    tracing::info!(
        samples = completed.len(),
        failed = failed.len(),
        excluded_reads,
        kept_reads,
        summary = %summary.display(),
        "blackfrag-rs: processing complete"
    );

    if !failed.is_empty() {
        anyhow::bail!("{} sample(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
