//! External merge sort for BAM files.
//!
//! Records are read into a bounded buffer, sorted, and spilled to numbered
//! chunk files in a scratch directory. Chunks are then k-way merged through a
//! binary heap into the output. When the whole input fits in one buffer the
//! sorted records are written directly.
//!
//! Every key ends with the record's ordinal in the input, so ties keep input
//! order and repeated sorts of the same file produce identical output.

use crate::header::sorted_header;
use anyhow::{Context, Result};
use rust_htslib::bam;
use rust_htslib::bam::Read as HtsRead;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Records held in memory per chunk before spilling.
pub const DEFAULT_MAX_RECORDS: usize = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Queryname,
    Coordinate,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Queryname => "queryname",
            SortOrder::Coordinate => "coordinate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    /// Read name, then mate rank (first=0, last=1, other=2).
    Queryname { name: Vec<u8>, rank: u8, ordinal: u64 },
    /// Reference (unmapped last), position, strand, read name.
    Coordinate {
        tid: u32,
        pos: i64,
        reverse: bool,
        name: Vec<u8>,
        ordinal: u64,
    },
}

impl SortKey {
    pub fn from_record(order: SortOrder, record: &bam::Record, ordinal: u64) -> Self {
        match order {
            SortOrder::Queryname => {
                let rank = if record.is_first_in_template() {
                    0
                } else if record.is_last_in_template() {
                    1
                } else {
                    2
                };
                SortKey::Queryname { name: record.qname().to_vec(), rank, ordinal }
            }
            SortOrder::Coordinate => SortKey::Coordinate {
                tid: u32::try_from(record.tid()).unwrap_or(u32::MAX),
                pos: record.pos(),
                reverse: record.is_reverse(),
                name: record.qname().to_vec(),
                ordinal,
            },
        }
    }
}

#[derive(Default, Debug)]
pub struct SortStats {
    pub total_records: u64,
    pub chunks_written: usize,
}

pub struct ExternalSorter {
    sort_order: SortOrder,
    max_records: usize,
    threads: usize,
}

impl ExternalSorter {
    pub fn new(sort_order: SortOrder) -> Self {
        Self {
            sort_order,
            max_records: DEFAULT_MAX_RECORDS,
            threads: 1,
        }
    }

    pub fn max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records.max(1);
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Sort `input` into `output`, spilling chunks under a fresh directory in `scratch`.
    ///
    /// The chunk directory is removed when this returns, whether or not the sort succeeded.
    pub fn sort(&self, input: &Path, output: &Path, scratch: &Path) -> Result<SortStats> {
        let spill_dir = tempfile::Builder::new()
            .prefix("sort.")
            .tempdir_in(scratch)
            .with_context(|| format!("failed to create sort scratch in {}", scratch.display()))?;

        let mut reader = bam::Reader::from_path(input)
            .with_context(|| format!("failed to open BAM {}", input.display()))?;
        if self.threads > 1 {
            reader.set_threads(self.threads)?;
        }
        let header = sorted_header(reader.header(), self.sort_order);

        let mut stats = SortStats::default();
        let mut chunk_files: Vec<PathBuf> = Vec::new();
        let mut records: Vec<(SortKey, bam::Record)> =
            Vec::with_capacity(self.max_records.min(1 << 16));

        for result in reader.records() {
            let record = result.context("failed to read BAM record")?;
            let key = SortKey::from_record(self.sort_order, &record, stats.total_records);
            stats.total_records += 1;
            records.push((key, record));

            if records.len() >= self.max_records {
                let path = self.spill(&mut records, &header, &spill_dir, chunk_files.len())?;
                chunk_files.push(path);
            }
        }

        if chunk_files.is_empty() {
            records.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            let mut writer = self.writer(output, &header, false)?;
            for (_, record) in &records {
                writer.write(record)?;
            }
        } else {
            if !records.is_empty() {
                let path = self.spill(&mut records, &header, &spill_dir, chunk_files.len())?;
                chunk_files.push(path);
            }
            tracing::debug!(
                chunks = chunk_files.len(),
                order = self.sort_order.as_str(),
                "merging sort chunks"
            );
            self.merge(&chunk_files, &header, output)?;
        }

        stats.chunks_written = chunk_files.len();
        Ok(stats)
    }

    fn spill(
        &self,
        records: &mut Vec<(SortKey, bam::Record)>,
        header: &bam::Header,
        dir: &TempDir,
        idx: usize,
    ) -> Result<PathBuf> {
        records.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        let path = dir.path().join(format!("chunk_{idx:04}.bam"));
        let mut writer = self.writer(&path, header, true)?;
        for (_, record) in records.iter() {
            writer.write(record)?;
        }
        tracing::debug!(chunk = idx, records = records.len(), "spilled sort chunk");
        records.clear();
        Ok(path)
    }

    fn merge(&self, chunk_files: &[PathBuf], header: &bam::Header, output: &Path) -> Result<()> {
        let mut chunks: Vec<ChunkReader> = chunk_files
            .iter()
            .enumerate()
            .map(|(idx, path)| {
                ChunkReader::new(path, idx, self.sort_order, (idx * self.max_records) as u64)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::with_capacity(chunks.len());
        for chunk in &mut chunks {
            if let Some(entry) = chunk.next_entry()? {
                heap.push(Reverse(entry));
            }
        }

        let mut writer = self.writer(output, header, false)?;
        while let Some(Reverse(entry)) = heap.pop() {
            writer.write(&entry.record)?;
            if let Some(next) = chunks[entry.chunk_idx].next_entry()? {
                heap.push(Reverse(next));
            }
        }
        Ok(())
    }

    fn writer(&self, path: &Path, header: &bam::Header, scratch: bool) -> Result<bam::Writer> {
        let mut writer = bam::Writer::from_path(path, header, bam::Format::Bam)
            .with_context(|| format!("failed to create BAM {}", path.display()))?;
        if scratch {
            writer.set_compression_level(bam::CompressionLevel::Fastest)?;
        }
        if self.threads > 1 {
            writer.set_threads(self.threads)?;
        }
        Ok(writer)
    }
}

struct ChunkReader {
    reader: bam::Reader,
    idx: usize,
    order: SortOrder,
    // Chunk `i` holds input records [i * max_records, (i + 1) * max_records) in
    // sorted order, so base + position keeps input order among equal keys.
    ordinal: u64,
}

impl ChunkReader {
    fn new(path: &Path, idx: usize, order: SortOrder, base: u64) -> Result<Self> {
        let reader = bam::Reader::from_path(path)
            .with_context(|| format!("failed to open sort chunk {}", path.display()))?;
        Ok(Self { reader, idx, order, ordinal: base })
    }

    fn next_entry(&mut self) -> Result<Option<HeapEntry>> {
        let mut record = bam::Record::new();
        match self.reader.read(&mut record) {
            None => Ok(None),
            Some(result) => {
                result.context("failed to read sort chunk")?;
                let key = SortKey::from_record(self.order, &record, self.ordinal);
                self.ordinal += 1;
                Ok(Some(HeapEntry { key, chunk_idx: self.idx, record }))
            }
        }
    }
}

struct HeapEntry {
    key: SortKey,
    chunk_idx: usize,
    record: bam::Record,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}
