use crate::error::FilterError;
use crate::header::declared_sort_order;
use crate::record::AlignmentRecord;
use crate::sort::SortOrder;
use anyhow::{Context, Result};
use rust_htslib::bam;
use rust_htslib::bam::Read as HtsRead;
use std::path::Path;

pub struct BamInput {
    pub ref_names: Vec<String>,
    pub sort_order: Option<SortOrder>,
    pub reader: bam::Reader,
}

pub fn open_bam(path: &Path, threads: usize) -> Result<BamInput> {
    let mut reader = bam::Reader::from_path(path)
        .with_context(|| format!("failed to open BAM {}", path.display()))?;
    if threads > 1 {
        reader.set_threads(threads)?;
    }
    let (ref_names, sort_order) = {
        let header = reader.header();
        let names = header
            .target_names()
            .iter()
            .map(|n| String::from_utf8_lossy(n).to_string())
            .collect();
        (names, declared_sort_order(header.as_bytes()))
    };
    Ok(BamInput { ref_names, sort_order, reader })
}

impl BamInput {
    /// Lazily decode every record of the file into an `AlignmentRecord`.
    pub fn alignment_records(&mut self) -> impl Iterator<Item = Result<AlignmentRecord>> + '_ {
        self.reader.records().map(|result| {
            let record = result.context("failed to read BAM record")?;
            let aln = AlignmentRecord::try_from(&record)?;
            Ok(aln)
        })
    }
}

/// Fail when a record comes before its predecessor in coordinate order.
pub(crate) struct CoordinateOrderCheck {
    last: Option<(u32, i64)>,
}

impl CoordinateOrderCheck {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn check(&mut self, record: &bam::Record) -> Result<(), FilterError> {
        // Unmapped reads without a reference sort last.
        let tid = u32::try_from(record.tid()).unwrap_or(u32::MAX);
        let key = (tid, record.pos());
        if let Some(last) = self.last {
            if key < last {
                return Err(FilterError::UnsortedInput {
                    expected: "coordinate",
                    record: String::from_utf8_lossy(record.qname()).into_owned(),
                });
            }
        }
        self.last = Some(key);
        Ok(())
    }
}
