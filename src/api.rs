//! In-memory library API for fragment-level blacklist filtering.
//!
//! Records are buffered per template instead of streamed through a name-sorted
//! copy, so this suits small inputs and callers that already hold alignments
//! in memory (from noodles, rust-htslib, or an aligner).
//!
//! # Example
//!
//! ```no_run
//! use blackfrag_rs::{BlacklistIndex, BlacklistRegion, partition_records};
//!
//! let index = BlacklistIndex::new(&[BlacklistRegion::new("chr1", 180, 220)]);
//! // let records: Vec<AlignmentRecord> = /* decoded alignments */;
//! // let ref_names = vec!["chr1".to_string()];
//! // let split = partition_records("S1", &records, &ref_names, &index)?;
//! // split.kept / split.excluded index into `records`.
//! ```

use crate::fragment::{resolve_template, Fragment, ResolveError, Unresolved};
use crate::intersect::{exclude_fragments, BlacklistIndex, ExclusionSet};
use crate::record::AlignmentRecord;
use crate::stats::{FilterStats, StatsBuilder};
use crate::types::{HashMap, HashMapExt};
use anyhow::Result;

/// Result of filtering a set of in-memory records.
#[derive(Debug, Clone)]
pub struct RecordPartition {
    /// Indices into the input slice, in input order.
    pub kept: Vec<usize>,
    /// Indices into the input slice, in input order.
    pub excluded: Vec<usize>,
    pub exclusion: ExclusionSet,
    pub stats: FilterStats,
}

/// Split `records` into kept and excluded sets by fragment overlap with `blacklist`.
///
/// Records need not be grouped or sorted. `ref_names` maps each record's
/// `ref_id` to the reference sequence name used by the blacklist.
pub fn partition_records(
    sample: &str,
    records: &[AlignmentRecord],
    ref_names: &[String],
    blacklist: &BlacklistIndex,
) -> Result<RecordPartition> {
    let mut order: Vec<&[u8]> = Vec::new();
    let mut groups: HashMap<&[u8], Vec<usize>> = HashMap::new();
    for (idx, rec) in records.iter().enumerate() {
        let members = groups.entry(rec.template_id.as_slice()).or_insert_with(|| {
            order.push(rec.template_id.as_slice());
            Vec::new()
        });
        members.push(idx);
    }

    let mut fragments: Vec<Fragment> = Vec::with_capacity(order.len());
    let mut unresolved = 0u64;
    for id in &order {
        let members = &groups[id];
        match resolve_template(members.iter().map(|&i| &records[i])) {
            Ok(fragment) => fragments.push(fragment),
            Err(ResolveError::Unresolved(Unresolved::NoMate | Unresolved::Discordant)) => {
                unresolved += 1
            }
            Err(ResolveError::Invalid(e)) => return Err(e.into()),
        }
    }

    let index = blacklist.for_references(ref_names);
    let outcome = exclude_fragments(fragments.into_iter().map(Ok), &index, 1)?;

    let (excluded, kept): (Vec<usize>, Vec<usize>) = (0..records.len())
        .partition(|&i| outcome.exclusion.contains(&records[i].template_id));

    let stats = StatsBuilder::new(sample)
        .total_reads(records.len() as u64)
        .total_fragments(outcome.fragments)
        .blacklisted_fragments(outcome.blacklisted_fragments)
        .excluded_templates(outcome.exclusion.len() as u64)
        .excluded_reads(excluded.len() as u64)
        .kept_reads(kept.len() as u64)
        .unresolved_templates(unresolved)
        .build()?;

    Ok(RecordPartition {
        kept,
        excluded,
        exclusion: outcome.exclusion,
        stats,
    })
}
