//! Record partitioning: route every input record to the kept or excluded output.
//!
//! Routing is keyed on the read name alone, so both mates (and any secondary or
//! supplementary records) of a template always land in the same output.

use crate::bam_input::CoordinateOrderCheck;
use crate::error::FilterError;
use crate::header::{declared_sort_order, sorted_header};
use crate::intersect::ExclusionSet;
use crate::output::StagedFile;
use crate::sort::{ExternalSorter, SortOrder};
use crate::types::{HashSet, HashSetExt, TemplateId};
use anyhow::{Context, Result};
use rust_htslib::bam;
use rust_htslib::bam::Read as HtsRead;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PartitionPaths {
    pub kept: PathBuf,
    pub kept_index: PathBuf,
    pub excluded: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PartitionOptions {
    pub threads: usize,
    pub sort_buffer: usize,
    /// When set, the number of records the input is known to hold.
    pub expected_records: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartitionCounts {
    pub kept_reads: u64,
    pub excluded_reads: u64,
}

impl PartitionCounts {
    pub fn total(&self) -> u64 {
        self.kept_reads + self.excluded_reads
    }
}

struct Router<'a> {
    exclusion: &'a ExclusionSet,
    seen_excluded: HashSet<TemplateId>,
    counts: PartitionCounts,
}

impl<'a> Router<'a> {
    fn new(exclusion: &'a ExclusionSet) -> Self {
        Self {
            exclusion,
            seen_excluded: HashSet::with_capacity(exclusion.len()),
            counts: PartitionCounts::default(),
        }
    }

    /// True when the record goes to the excluded output.
    fn route(&mut self, record: &bam::Record) -> bool {
        let name = record.qname();
        if self.exclusion.contains(name) {
            if !self.seen_excluded.contains(name) {
                self.seen_excluded.insert(name.to_vec());
            }
            self.counts.excluded_reads += 1;
            true
        } else {
            self.counts.kept_reads += 1;
            false
        }
    }

    fn finish(self) -> Result<PartitionCounts, FilterError> {
        let missing = self.exclusion.len() - self.seen_excluded.len();
        if missing > 0 {
            return Err(FilterError::MissingExcludedTemplates { missing });
        }
        Ok(self.counts)
    }
}

fn open_writer(path: &Path, header: &bam::Header, threads: usize) -> Result<bam::Writer> {
    let mut writer = bam::Writer::from_path(path, header, bam::Format::Bam)
        .with_context(|| format!("failed to create BAM {}", path.display()))?;
    if threads > 1 {
        writer.set_threads(threads)?;
    }
    Ok(writer)
}

/// Split `input` into kept and excluded BAMs by template membership in `exclusion`.
///
/// Coordinate-sorted input is streamed straight into the outputs; any other
/// order is partitioned into `scratch` first and then coordinate-sorted. The
/// kept output is indexed. Nothing appears at the final paths unless every
/// step, including the exclusion consistency check, succeeded.
pub fn partition(
    input: &Path,
    exclusion: &ExclusionSet,
    paths: &PartitionPaths,
    scratch: &Path,
    options: &PartitionOptions,
) -> Result<PartitionCounts> {
    let mut reader = bam::Reader::from_path(input)
        .with_context(|| format!("failed to open BAM {}", input.display()))?;
    if options.threads > 1 {
        reader.set_threads(options.threads)?;
    }
    let coordinate_input =
        declared_sort_order(reader.header().as_bytes()) == Some(SortOrder::Coordinate);
    // Scratch partitions keep the input header; the sorter declares the final order.
    let header = if coordinate_input {
        sorted_header(reader.header(), SortOrder::Coordinate)
    } else {
        bam::Header::from_template(reader.header())
    };

    let kept = StagedFile::new(&paths.kept)?;
    let excluded = StagedFile::new(&paths.excluded)?;
    let kept_index = StagedFile::new(&paths.kept_index)?;

    let (kept_target, excluded_target) = if coordinate_input {
        (kept.path().to_path_buf(), excluded.path().to_path_buf())
    } else {
        (scratch.join("kept.unsorted.bam"), scratch.join("excluded.unsorted.bam"))
    };

    let mut router = Router::new(exclusion);
    {
        let mut kept_writer = open_writer(&kept_target, &header, options.threads)?;
        let mut excluded_writer = open_writer(&excluded_target, &header, options.threads)?;
        let mut order = CoordinateOrderCheck::new();
        let mut record = bam::Record::new();
        while let Some(result) = reader.read(&mut record) {
            result.context("failed to read BAM record")?;
            if coordinate_input {
                order.check(&record)?;
            }
            if router.route(&record) {
                excluded_writer.write(&record)?;
            } else {
                kept_writer.write(&record)?;
            }
        }
    }
    let counts = router.finish()?;

    if let Some(expected) = options.expected_records {
        if expected != counts.total() {
            return Err(FilterError::RecordCountMismatch {
                resolved: expected,
                partitioned: counts.total(),
            }
            .into());
        }
    }

    if !coordinate_input {
        let sorter = ExternalSorter::new(SortOrder::Coordinate)
            .max_records(options.sort_buffer)
            .threads(options.threads);
        let targets = [(&kept_target, kept.path()), (&excluded_target, excluded.path())];
        for (unsorted, sorted) in targets {
            let stats = sorter.sort(unsorted, sorted, scratch)?;
            tracing::debug!(
                records = stats.total_records,
                chunks = stats.chunks_written,
                "coordinate-sorted partition"
            );
        }
    }

    let index_threads = u32::try_from(options.threads.max(1)).unwrap_or(1);
    bam::index::build(kept.path(), Some(kept_index.path()), bam::index::Type::Bai, index_threads)
        .with_context(|| format!("failed to index {}", kept.dest().display()))?;

    excluded.commit()?;
    kept.commit()?;
    kept_index.commit()?;

    Ok(counts)
}
