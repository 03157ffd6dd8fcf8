//! Fragment resolution: one genomic interval per read pair.
//!
//! Input must be grouped by read name (all records of a template adjacent).
//! Templates that cannot yield a fragment (singletons, unpaired reads, mates on
//! different references) are counted and skipped; they are never excluded.

use crate::error::FilterError;
use crate::record::{AlignmentRecord, Strand};
use crate::types::{HashSet, HashSetExt, RefId, TemplateId};
use anyhow::Result;
use std::iter::Peekable;

/// The span of both mates of a template, 0-based half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub template_id: TemplateId,
    pub ref_id: RefId,
    pub start: u32,
    pub end: u32,
    pub strand: Strand,
}

/// Why a template produced no fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// Unpaired read, missing mate, or a mate that is unmapped.
    NoMate,
    /// Both mates mapped, but to different reference sequences.
    Discordant,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveStats {
    pub templates: u64,
    pub records: u64,
    pub fragments: u64,
    pub no_mate: u64,
    pub discordant: u64,
}

impl ResolveStats {
    pub fn unresolved(&self) -> u64 {
        self.no_mate + self.discordant
    }
}

/// Derive the fragment of one template from all of its records.
///
/// Only primary mapped records are considered. Two primary records claiming the
/// same mate means the input was not grouped by name.
pub fn resolve_template<'a, G>(group: G) -> Result<Fragment, ResolveError>
where
    G: IntoIterator<Item = &'a AlignmentRecord>,
{
    let mut first: Option<&AlignmentRecord> = None;
    let mut last: Option<&AlignmentRecord> = None;

    for rec in group.into_iter().filter(|r| r.is_primary_mapped() && r.is_paired()) {
        let slot = if rec.is_first_segment() {
            &mut first
        } else if rec.is_last_segment() {
            &mut last
        } else {
            continue;
        };
        if slot.is_some() {
            return Err(ResolveError::Invalid(FilterError::DuplicateMate {
                template: rec.template_name(),
            }));
        }
        *slot = Some(rec);
    }

    let (r1, r2) = match (first, last) {
        (Some(r1), Some(r2)) => (r1, r2),
        _ => return Err(ResolveError::Unresolved(Unresolved::NoMate)),
    };
    // is_primary_mapped() guarantees both references are set.
    let (Some(ref1), Some(ref2)) = (r1.ref_id, r2.ref_id) else {
        return Err(ResolveError::Unresolved(Unresolved::NoMate));
    };
    if ref1 != ref2 {
        return Err(ResolveError::Unresolved(Unresolved::Discordant));
    }

    Ok(Fragment {
        template_id: r1.template_id.clone(),
        ref_id: ref1,
        start: r1.start.min(r2.start),
        end: r1.end.max(r2.end),
        strand: r1.strand,
    })
}

#[derive(Debug)]
pub enum ResolveError {
    Unresolved(Unresolved),
    Invalid(FilterError),
}

/// Groups adjacent records that share a template id.
///
/// A template id that reappears after its group was closed means the input is
/// not grouped by name, and is reported as `UnsortedInput`.
pub struct TemplateGroups<I: Iterator<Item = Result<AlignmentRecord>>> {
    records: Peekable<I>,
    closed: HashSet<TemplateId>,
}

impl<I: Iterator<Item = Result<AlignmentRecord>>> TemplateGroups<I> {
    pub fn new(records: I) -> Self {
        Self {
            records: records.peekable(),
            closed: HashSet::new(),
        }
    }
}

impl<I: Iterator<Item = Result<AlignmentRecord>>> Iterator for TemplateGroups<I> {
    type Item = Result<Vec<AlignmentRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = match self.records.next()? {
            Ok(rec) => rec,
            Err(e) => return Some(Err(e)),
        };
        if self.closed.contains(&first.template_id) {
            return Some(Err(FilterError::UnsortedInput {
                expected: "queryname",
                record: first.template_name(),
            }
            .into()));
        }
        let mut group = vec![first];
        loop {
            match self.records.peek() {
                Some(Ok(rec)) if rec.template_id == group[0].template_id => {}
                Some(Ok(_)) | None => break,
                // Surface the error on the next call, after this group.
                Some(Err(_)) => break,
            }
            if let Some(Ok(rec)) = self.records.next() {
                group.push(rec);
            }
        }
        self.closed.insert(group[0].template_id.clone());
        Some(Ok(group))
    }
}

/// Lazily turns a name-grouped record stream into fragments.
pub struct FragmentResolver<I: Iterator<Item = Result<AlignmentRecord>>> {
    groups: TemplateGroups<I>,
    stats: ResolveStats,
}

impl<I: Iterator<Item = Result<AlignmentRecord>>> FragmentResolver<I> {
    pub fn new(records: I) -> Self {
        Self {
            groups: TemplateGroups::new(records),
            stats: ResolveStats::default(),
        }
    }

    pub fn stats(&self) -> &ResolveStats {
        &self.stats
    }
}

impl<I: Iterator<Item = Result<AlignmentRecord>>> Iterator for FragmentResolver<I> {
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let group = match self.groups.next()? {
                Ok(group) => group,
                Err(e) => return Some(Err(e)),
            };
            self.stats.templates += 1;
            self.stats.records += group.len() as u64;
            match resolve_template(&group) {
                Ok(fragment) => {
                    self.stats.fragments += 1;
                    return Some(Ok(fragment));
                }
                Err(ResolveError::Unresolved(Unresolved::NoMate)) => self.stats.no_mate += 1,
                Err(ResolveError::Unresolved(Unresolved::Discordant)) => {
                    self.stats.discordant += 1
                }
                Err(ResolveError::Invalid(e)) => return Some(Err(e.into())),
            }
        }
    }
}
