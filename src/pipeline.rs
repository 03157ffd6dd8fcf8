use crate::bam_input::open_bam;
use crate::config::SampleConfig;
use crate::fragment::FragmentResolver;
use crate::intersect::{exclude_fragments, BlacklistIndex};
use crate::partition::{partition, PartitionOptions, PartitionPaths};
use crate::sort::{ExternalSorter, SortOrder};
use crate::stats::{write_report, FilterStats, StatsBuilder};
use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;

/// Stages a sample moves through, strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolved,
    Intersected,
    Partitioned,
    Reported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolved => "fragment resolution",
            Stage::Intersected => "blacklist intersection",
            Stage::Partitioned => "record partitioning",
            Stage::Reported => "statistics report",
        };
        f.write_str(name)
    }
}

/// Run the exclusion engine for one sample.
///
/// Scratch storage lives in a per-sample temporary directory that is removed
/// on every exit path. A failure while writing the per-sample report is logged
/// and does not undo the already committed BAM outputs.
pub fn run_sample(config: &SampleConfig, blacklist: &BlacklistIndex) -> Result<FilterStats> {
    let sample = config.sample_id.as_str();
    std::fs::create_dir_all(&config.out_dir).with_context(|| {
        format!("failed to create output directory {}", config.out_dir.display())
    })?;
    let scratch = config.scratch_dir()?;
    tracing::info!(sample, input = %config.input.display(), "processing sample");

    let input = open_bam(&config.input, config.threads)?;
    let name_grouped: PathBuf = if input.sort_order == Some(SortOrder::Queryname) {
        config.input.clone()
    } else {
        let path = scratch.path().join("name_sorted.bam");
        let sorted = ExternalSorter::new(SortOrder::Queryname)
            .max_records(config.sort_buffer)
            .threads(config.threads)
            .sort(&config.input, &path, scratch.path())
            .with_context(|| format!("sample {sample}: {} failed", Stage::Resolved))?;
        tracing::debug!(
            sample,
            records = sorted.total_records,
            chunks = sorted.chunks_written,
            "name-sorted input"
        );
        path
    };
    drop(input);

    let mut grouped = open_bam(&name_grouped, config.threads)?;
    let ref_names = grouped.ref_names.clone();
    let index = blacklist.for_references(&ref_names);
    let mut resolver = FragmentResolver::new(grouped.alignment_records());
    let outcome = exclude_fragments(&mut resolver, &index, config.threads)
        .with_context(|| format!("sample {sample}: {} failed", Stage::Intersected))?;
    let resolved = resolver.stats().clone();
    drop(resolver);
    tracing::info!(
        sample,
        templates = resolved.templates,
        fragments = resolved.fragments,
        no_mate = resolved.no_mate,
        discordant = resolved.discordant,
        "{} complete",
        Stage::Resolved
    );
    tracing::info!(
        sample,
        blacklisted_fragments = outcome.blacklisted_fragments,
        excluded_templates = outcome.exclusion.len(),
        "{} complete",
        Stage::Intersected
    );

    let paths = PartitionPaths {
        kept: config.kept_path(),
        kept_index: config.kept_index_path(),
        excluded: config.excluded_path(),
    };
    let options = PartitionOptions {
        threads: config.threads,
        sort_buffer: config.sort_buffer,
        expected_records: Some(resolved.records),
    };
    let counts = partition(&config.input, &outcome.exclusion, &paths, scratch.path(), &options)
        .with_context(|| format!("sample {sample}: {} failed", Stage::Partitioned))?;
    tracing::info!(
        sample,
        kept_reads = counts.kept_reads,
        excluded_reads = counts.excluded_reads,
        "{} complete",
        Stage::Partitioned
    );

    let stats = StatsBuilder::new(sample)
        .total_reads(resolved.records)
        .total_fragments(outcome.fragments)
        .blacklisted_fragments(outcome.blacklisted_fragments)
        .excluded_templates(outcome.exclusion.len() as u64)
        .excluded_reads(counts.excluded_reads)
        .kept_reads(counts.kept_reads)
        .unresolved_templates(resolved.unresolved())
        .build()?;
    let report = config.report_path();
    match write_report(&report, &stats) {
        Ok(()) => tracing::info!(
            sample,
            report = %report.display(),
            "{} complete",
            Stage::Reported
        ),
        Err(e) => tracing::error!(
            sample,
            error = %format!("{e:#}"),
            "{} failed; BAM outputs are kept",
            Stage::Reported
        ),
    }

    Ok(stats)
}
