//! Blacklist intersection: which templates have a fragment inside a blacklisted region.

use crate::blacklist::BlacklistRegion;
use crate::fragment::Fragment;
use crate::types::{HashMap, HashMapExt, HashSet, HashSetExt, TemplateId};
use anyhow::Result;
use coitrees::{BasicCOITree, Interval, IntervalTree};
use crossfire::mpmc;
use std::thread;

/// Fragments handed to a worker at a time.
const FRAGMENT_BATCH: usize = 4096;

#[derive(Debug, Clone, Copy, Default)]
struct RegionBounds {
    start: u64,
    end: u64,
}

fn clamp_i32(v: u64) -> i32 {
    v.min(i32::MAX as u64) as i32
}

// COITree intervals are end-inclusive; [start, end) -> [start, end-1]. Empty
// intervals become the single position `start` and are filtered exactly later.
fn closed(start: u64, end: u64) -> (i32, i32) {
    let last = end.saturating_sub(1).max(start);
    (clamp_i32(start), clamp_i32(last))
}

/// Half-open overlap: `[100,200)` and `[200,300)` do not overlap.
pub fn overlaps(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> bool {
    a_start < b_end && b_start < a_end
}

pub struct ChromTree {
    tree: BasicCOITree<RegionBounds, u32>,
}

impl ChromTree {
    fn new(regions: &[&BlacklistRegion]) -> Self {
        let intervals: Vec<Interval<RegionBounds>> = regions
            .iter()
            .map(|r| {
                let (first, last) = closed(r.start, r.end);
                Interval::new(first, last, RegionBounds { start: r.start, end: r.end })
            })
            .collect();
        Self { tree: BasicCOITree::new(&intervals) }
    }

    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        let (first, last) = closed(start, end);
        let mut hit = false;
        self.tree.query(first, last, |node| {
            if !hit && overlaps(start, end, node.metadata.start, node.metadata.end) {
                hit = true;
            }
        });
        hit
    }
}

/// Blacklist regions grouped per reference sequence name.
pub struct BlacklistIndex {
    trees: HashMap<String, ChromTree>,
    regions: usize,
}

impl BlacklistIndex {
    pub fn new(regions: &[BlacklistRegion]) -> Self {
        let mut by_chrom: HashMap<&str, Vec<&BlacklistRegion>> = HashMap::new();
        for region in regions {
            by_chrom.entry(region.chrom.as_str()).or_default().push(region);
        }
        let trees = by_chrom
            .into_iter()
            .map(|(chrom, regions)| (chrom.to_string(), ChromTree::new(&regions)))
            .collect();
        Self { trees, regions: regions.len() }
    }

    pub fn region_count(&self) -> usize {
        self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions == 0
    }

    pub fn overlaps(&self, chrom: &str, start: u64, end: u64) -> bool {
        self.trees
            .get(chrom)
            .is_some_and(|tree| tree.overlaps(start, end))
    }

    /// Bind the index to a header's reference list so fragments are looked up by id.
    pub fn for_references<'a>(&'a self, ref_names: &[String]) -> ReferenceIndex<'a> {
        let trees: Vec<Option<&ChromTree>> =
            ref_names.iter().map(|name| self.trees.get(name)).collect();
        for chrom in self.trees.keys() {
            if !ref_names.iter().any(|n| n == chrom) {
                tracing::debug!(chrom = %chrom, "blacklist reference not present in BAM header");
            }
        }
        ReferenceIndex { trees }
    }
}

pub struct ReferenceIndex<'a> {
    trees: Vec<Option<&'a ChromTree>>,
}

impl ReferenceIndex<'_> {
    pub fn is_blacklisted(&self, fragment: &Fragment) -> bool {
        match self.trees.get(fragment.ref_id as usize) {
            Some(Some(tree)) => tree.overlaps(fragment.start as u64, fragment.end as u64),
            _ => false,
        }
    }
}

/// Unique template ids whose fragment overlaps the blacklist.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExclusionSet {
    ids: HashSet<TemplateId>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self { ids: HashSet::new() }
    }

    pub fn insert(&mut self, id: TemplateId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &[u8]) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in byte order.
    pub fn sorted(&self) -> Vec<&TemplateId> {
        let mut ids: Vec<&TemplateId> = self.ids.iter().collect();
        ids.sort();
        ids
    }
}

impl FromIterator<TemplateId> for ExclusionSet {
    fn from_iter<T: IntoIterator<Item = TemplateId>>(iter: T) -> Self {
        Self { ids: iter.into_iter().collect() }
    }
}

#[derive(Debug, Default)]
pub struct IntersectOutcome {
    pub exclusion: ExclusionSet,
    pub fragments: u64,
    pub blacklisted_fragments: u64,
}

impl IntersectOutcome {
    fn record_hits(&mut self, hits: Vec<TemplateId>) {
        self.blacklisted_fragments += hits.len() as u64;
        for id in hits {
            self.exclusion.insert(id);
        }
    }
}

fn blacklisted_ids(batch: Vec<Fragment>, index: &ReferenceIndex<'_>) -> Vec<TemplateId> {
    batch
        .into_iter()
        .filter(|fragment| index.is_blacklisted(fragment))
        .map(|fragment| fragment.template_id)
        .collect()
}

/// Test every fragment against the blacklist and collect the excluded template ids.
///
/// With more than one thread, batches of fragments are dispatched to scoped
/// workers; the resulting set does not depend on which worker saw which batch.
pub fn exclude_fragments<I>(
    fragments: I,
    index: &ReferenceIndex<'_>,
    threads: usize,
) -> Result<IntersectOutcome>
where
    I: Iterator<Item = Result<Fragment>>,
{
    let mut outcome = IntersectOutcome::default();

    if threads <= 1 {
        for fragment in fragments {
            let fragment = fragment?;
            outcome.fragments += 1;
            if index.is_blacklisted(&fragment) {
                outcome.record_hits(vec![fragment.template_id]);
            }
        }
        return Ok(outcome);
    }

    crossfire::detect_backoff_cfg();
    thread::scope(|scope| -> Result<IntersectOutcome> {
        let cap = threads.saturating_mul(4).max(8);
        let (tx_work, rx_work) = mpmc::bounded_blocking::<Vec<Fragment>>(cap);
        let (tx_res, rx_res) = mpmc::unbounded_blocking::<Vec<TemplateId>>();

        for _ in 0..threads {
            let rx_work = rx_work.clone();
            let tx_res = tx_res.clone();
            scope.spawn(move || {
                while let Ok(batch) = rx_work.recv() {
                    if tx_res.send(blacklisted_ids(batch, index)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx_res);

        let mut batch: Vec<Fragment> = Vec::with_capacity(FRAGMENT_BATCH);
        for fragment in fragments {
            batch.push(fragment?);
            outcome.fragments += 1;
            if batch.len() >= FRAGMENT_BATCH {
                tx_work
                    .send(std::mem::take(&mut batch))
                    .map_err(|_| anyhow::anyhow!("intersect worker channel closed"))?;
            }
        }
        if !batch.is_empty() {
            tx_work
                .send(batch)
                .map_err(|_| anyhow::anyhow!("intersect worker channel closed"))?;
        }
        drop(tx_work);

        while let Ok(hits) = rx_res.recv() {
            outcome.record_hits(hits);
        }
        Ok(outcome)
    })
}
