use crate::error::FilterError;
use crate::output::write_text;
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

pub const SUMMARY_HEADER: &str = "sample\tblacklisted_fragments\texcluded_templates\t\
excluded_reads\tkept_reads\ttotal_fragments\ttotal_reads";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStats {
    pub sample: String,
    pub total_reads: u64,
    pub total_fragments: u64,
    pub blacklisted_fragments: u64,
    pub excluded_templates: u64,
    pub excluded_reads: u64,
    pub kept_reads: u64,
    /// Templates with no derivable fragment (singletons, discordant mates).
    pub unresolved_templates: u64,
}

impl FilterStats {
    /// Human-readable per-sample report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "sample\t{}", self.sample);
        let _ = writeln!(out, "fragments_overlapping_blacklist\t{}", self.blacklisted_fragments);
        let _ = writeln!(out, "unique_excluded_templates\t{}", self.excluded_templates);
        let _ = writeln!(out, "reads_excluded\t{}", self.excluded_reads);
        let _ = writeln!(out, "reads_kept\t{}", self.kept_reads);
        let _ = writeln!(out, "fragments_total\t{}", self.total_fragments);
        let _ = writeln!(out, "templates_without_fragment\t{}", self.unresolved_templates);
        let _ = writeln!(out, "reads_total\t{}", self.total_reads);
        out
    }

    pub fn summary_row(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.sample,
            self.blacklisted_fragments,
            self.excluded_templates,
            self.excluded_reads,
            self.kept_reads,
            self.total_fragments,
            self.total_reads,
        )
    }
}

/// Collects counts from the pipeline stages; `build` fails if any was never supplied.
#[derive(Debug, Default, Clone)]
pub struct StatsBuilder {
    sample: String,
    total_reads: Option<u64>,
    total_fragments: Option<u64>,
    blacklisted_fragments: Option<u64>,
    excluded_templates: Option<u64>,
    excluded_reads: Option<u64>,
    kept_reads: Option<u64>,
    unresolved_templates: Option<u64>,
}

impl StatsBuilder {
    pub fn new(sample: impl Into<String>) -> Self {
        Self { sample: sample.into(), ..Default::default() }
    }

    pub fn total_reads(mut self, n: u64) -> Self {
        self.total_reads = Some(n);
        self
    }

    pub fn total_fragments(mut self, n: u64) -> Self {
        self.total_fragments = Some(n);
        self
    }

    pub fn blacklisted_fragments(mut self, n: u64) -> Self {
        self.blacklisted_fragments = Some(n);
        self
    }

    pub fn excluded_templates(mut self, n: u64) -> Self {
        self.excluded_templates = Some(n);
        self
    }

    pub fn excluded_reads(mut self, n: u64) -> Self {
        self.excluded_reads = Some(n);
        self
    }

    pub fn kept_reads(mut self, n: u64) -> Self {
        self.kept_reads = Some(n);
        self
    }

    pub fn unresolved_templates(mut self, n: u64) -> Self {
        self.unresolved_templates = Some(n);
        self
    }

    pub fn build(self) -> Result<FilterStats, FilterError> {
        fn need(v: Option<u64>, field: &'static str) -> Result<u64, FilterError> {
            v.ok_or(FilterError::IncompleteStats { field })
        }
        Ok(FilterStats {
            total_reads: need(self.total_reads, "total_reads")?,
            total_fragments: need(self.total_fragments, "total_fragments")?,
            blacklisted_fragments: need(self.blacklisted_fragments, "blacklisted_fragments")?,
            excluded_templates: need(self.excluded_templates, "excluded_templates")?,
            excluded_reads: need(self.excluded_reads, "excluded_reads")?,
            kept_reads: need(self.kept_reads, "kept_reads")?,
            unresolved_templates: need(self.unresolved_templates, "unresolved_templates")?,
            sample: self.sample,
        })
    }
}

pub fn write_report(path: &Path, stats: &FilterStats) -> Result<()> {
    write_text(path, &stats.render())
}

/// Write the run summary: one row per sample, in the order given.
pub fn write_summary(path: &Path, samples: &[FilterStats]) -> Result<()> {
    let mut out = String::with_capacity(64 * (samples.len() + 1));
    out.push_str(SUMMARY_HEADER);
    out.push('\n');
    for stats in samples {
        out.push_str(&stats.summary_row());
        out.push('\n');
    }
    write_text(path, &out)
}
