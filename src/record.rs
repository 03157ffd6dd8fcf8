use crate::error::FilterError;
use crate::types::{RefId, TemplateId};
use noodles::sam::alignment::record::Flags;
use rust_htslib::bam::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

/// One alignment record, reduced to the fields fragment resolution needs.
///
/// Coordinates are 0-based, half-open [start, end). `ref_id` is `None` when the
/// record has no reference (fully unmapped reads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub template_id: TemplateId,
    pub ref_id: Option<RefId>,
    pub start: u32,
    pub end: u32,
    pub strand: Strand,
    pub mate_ref_id: Option<RefId>,
    pub flags: Flags,
    pub template_len: i64,
}

impl AlignmentRecord {
    /// Mapped, primary, non-supplementary: the records that can define a fragment.
    pub fn is_primary_mapped(&self) -> bool {
        !(self.flags.is_unmapped() || self.flags.is_secondary() || self.flags.is_supplementary())
            && self.ref_id.is_some()
    }

    pub fn is_first_segment(&self) -> bool {
        self.flags.is_first_segment()
    }

    pub fn is_last_segment(&self) -> bool {
        self.flags.is_last_segment()
    }

    pub fn is_paired(&self) -> bool {
        self.flags.is_segmented()
    }

    pub fn template_name(&self) -> String {
        String::from_utf8_lossy(&self.template_id).into_owned()
    }
}

fn ref_id_from_tid(tid: i32) -> Option<RefId> {
    u32::try_from(tid).ok()
}

fn coord(value: i64, what: &str, name: &[u8]) -> Result<u32, FilterError> {
    u32::try_from(value).map_err(|_| FilterError::MalformedRecord {
        msg: format!(
            "{what} {value} out of range for read {}",
            String::from_utf8_lossy(name)
        ),
    })
}

impl TryFrom<&Record> for AlignmentRecord {
    type Error = FilterError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let name = record.qname();
        if name.is_empty() || name == b"*" {
            return Err(FilterError::MalformedRecord {
                msg: "record without a read name".to_string(),
            });
        }
        let flags = Flags::from(record.flags());
        let ref_id = ref_id_from_tid(record.tid());
        let mate_ref_id = ref_id_from_tid(record.mtid());

        let (start, end) = if ref_id.is_some() && !flags.is_unmapped() {
            let pos = record.pos();
            if pos < 0 {
                return Err(FilterError::MalformedRecord {
                    msg: format!(
                        "mapped read {} has no alignment start",
                        String::from_utf8_lossy(name)
                    ),
                });
            }
            // end_pos() is 0-based exclusive; clamp so records without a CIGAR are [pos, pos).
            let end = record.cigar().end_pos().max(pos);
            (coord(pos, "alignment start", name)?, coord(end, "alignment end", name)?)
        } else {
            (0, 0)
        };

        let strand = if flags.is_reverse_complemented() {
            Strand::Reverse
        } else {
            Strand::Forward
        };

        Ok(AlignmentRecord {
            template_id: name.to_vec(),
            ref_id,
            start,
            end,
            strand,
            mate_ref_id,
            flags,
            template_len: record.insert_size(),
        })
    }
}
