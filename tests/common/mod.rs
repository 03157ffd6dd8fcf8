#![allow(dead_code)]

use blackfrag_rs::header::build_hts_header;
use blackfrag_rs::sort::SortOrder;
use noodles::bam;
use rust_htslib::bam::record::{Cigar, CigarString, Record};
use rust_htslib::bam::{Format, HeaderView, Read as HtsRead, Reader, Writer};
use std::io::Write as _;
use std::path::{Path, PathBuf};

// ── flags ────────────────────────────────────────────────────────────────────

pub const PAIRED: u16 = 0x1;
pub const PROPER: u16 = 0x2;
pub const UNMAPPED: u16 = 0x4;
pub const MATE_UNMAPPED: u16 = 0x8;
pub const REVERSE: u16 = 0x10;
pub const MATE_REVERSE: u16 = 0x20;
pub const FIRST: u16 = 0x40;
pub const LAST: u16 = 0x80;
pub const SECONDARY: u16 = 0x100;
pub const SUPPLEMENTARY: u16 = 0x800;

pub const REFERENCES: &[(&str, u64)] = &[("chr1", 100_000), ("chr2", 100_000)];

// ── read specs ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Read {
    pub name: String,
    pub tid: i32,
    pub pos: i64,
    pub len: u32,
    pub flags: u16,
    pub mtid: i32,
    pub mpos: i64,
}

/// A properly paired template: read1 forward at `pos1`, read2 reverse at `pos2`.
pub fn pair(name: &str, tid: i32, pos1: i64, pos2: i64, len: u32) -> Vec<Read> {
    vec![
        Read {
            name: name.to_string(),
            tid,
            pos: pos1,
            len,
            flags: PAIRED | PROPER | FIRST | MATE_REVERSE,
            mtid: tid,
            mpos: pos2,
        },
        Read {
            name: name.to_string(),
            tid,
            pos: pos2,
            len,
            flags: PAIRED | PROPER | LAST | REVERSE,
            mtid: tid,
            mpos: pos1,
        },
    ]
}

/// Mates mapped to two different references.
pub fn chimeric(name: &str, tid1: i32, pos1: i64, tid2: i32, pos2: i64, len: u32) -> Vec<Read> {
    vec![
        Read {
            name: name.to_string(),
            tid: tid1,
            pos: pos1,
            len,
            flags: PAIRED | FIRST | MATE_REVERSE,
            mtid: tid2,
            mpos: pos2,
        },
        Read {
            name: name.to_string(),
            tid: tid2,
            pos: pos2,
            len,
            flags: PAIRED | LAST | REVERSE,
            mtid: tid1,
            mpos: pos1,
        },
    ]
}

/// A paired read whose mate is absent from the file.
pub fn singleton(name: &str, tid: i32, pos: i64, len: u32) -> Vec<Read> {
    vec![Read {
        name: name.to_string(),
        tid,
        pos,
        len,
        flags: PAIRED | FIRST | MATE_UNMAPPED,
        mtid: -1,
        mpos: -1,
    }]
}

/// The four-template scenario: T1 clear, T2 in the blacklist, T3 chimeric, T4 singleton.
pub fn scenario_reads() -> Vec<Read> {
    let mut reads = Vec::new();
    reads.extend(pair("T1", 0, 100, 150, 50)); // fragment [100, 200)
    reads.extend(pair("T2", 0, 150, 200, 50)); // fragment [150, 250)
    reads.extend(chimeric("T3", 0, 300, 1, 300, 50));
    reads.extend(singleton("T4", 0, 500, 50));
    reads
}

fn coordinate_key(read: &Read) -> (u32, i64, String) {
    (u32::try_from(read.tid).unwrap_or(u32::MAX), read.pos, read.name.clone())
}

fn to_record(read: &Read) -> Record {
    let mut record = Record::new();
    let seq = vec![b'A'; read.len as usize];
    let qual = vec![30u8; read.len as usize];
    if read.flags & UNMAPPED != 0 {
        record.set(read.name.as_bytes(), None, &seq, &qual);
    } else {
        let cigar = CigarString(vec![Cigar::Match(read.len)]);
        record.set(read.name.as_bytes(), Some(&cigar), &seq, &qual);
        record.set_mapq(60);
    }
    record.set_tid(read.tid);
    record.set_pos(read.pos);
    record.set_mtid(read.mtid);
    record.set_mpos(read.mpos);
    record.set_flags(read.flags);
    record
}

/// Write `reads` to a BAM, declaring (and applying) `order` when given.
pub fn write_bam(path: &Path, reads: &[Read], order: Option<SortOrder>) {
    let mut reads = reads.to_vec();
    match order {
        Some(SortOrder::Coordinate) => reads.sort_by_key(coordinate_key),
        Some(SortOrder::Queryname) => reads.sort_by(|a, b| {
            (a.name.as_str(), a.flags & LAST).cmp(&(b.name.as_str(), b.flags & LAST))
        }),
        None => {}
    }
    write_bam_as_is(path, &reads, order);
}

/// Write `reads` in the given order, whatever order the header declares.
pub fn write_bam_as_is(path: &Path, reads: &[Read], declared: Option<SortOrder>) {
    let header = build_hts_header(REFERENCES, declared);
    let mut writer = Writer::from_path(path, &header, Format::Bam).expect("create BAM");
    for read in reads {
        writer.write(&to_record(read)).expect("write record");
    }
}

pub fn write_blacklist(path: &Path, lines: &[&str]) {
    let mut file = std::fs::File::create(path).expect("create blacklist");
    for line in lines {
        writeln!(file, "{line}").expect("write blacklist");
    }
}

// ── readers ──────────────────────────────────────────────────────────────────

/// (read name, tid, pos, flags) of every record, in file order.
pub fn read_records(path: &Path) -> Vec<(String, i32, i64, u16)> {
    let mut reader = Reader::from_path(path).expect("open BAM");
    reader
        .records()
        .map(|r| {
            let r = r.expect("read record");
            (String::from_utf8_lossy(r.qname()).into_owned(), r.tid(), r.pos(), r.flags())
        })
        .collect()
}

pub fn names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = read_records(path).into_iter().map(|r| r.0).collect();
    names.sort();
    names
}

pub fn header_text(path: &Path) -> String {
    let reader = Reader::from_path(path).expect("open BAM");
    let view: &HeaderView = reader.header();
    String::from_utf8_lossy(view.as_bytes()).into_owned()
}

pub fn is_coordinate_sorted(path: &Path) -> bool {
    let records = read_records(path);
    records.windows(2).all(|w| {
        let a = (u32::try_from(w[0].1).unwrap_or(u32::MAX), w[0].2);
        let b = (u32::try_from(w[1].1).unwrap_or(u32::MAX), w[1].2);
        a <= b
    })
}

pub fn count_bam_records(path: &Path) -> usize {
    let mut reader = bam::io::reader::Builder
        .build_from_path(path)
        .expect("open BAM");
    reader.read_header().expect("read header");
    let mut count = 0usize;
    let mut record = bam::Record::default();
    loop {
        match reader.read_record(&mut record) {
            Ok(0) => break,
            Ok(_) => count += 1,
            Err(e) => panic!("read_record error: {e}"),
        }
    }
    count
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("dir entry").path())
        .collect();
    files.sort();
    files
}
