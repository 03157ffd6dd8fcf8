use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("malformed blacklist {path}:{line}: {msg}")]
    MalformedBlacklist {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    #[error("malformed alignment record: {msg}")]
    MalformedRecord { msg: String },
    #[error(
        "template {template} has more than one primary record for the same mate; \
         input is not grouped by read name"
    )]
    DuplicateMate { template: String },
    #[error(
        "{missing} excluded template(s) had no records when re-reading the input; \
         refusing to write incomplete output"
    )]
    MissingExcludedTemplates { missing: usize },
    #[error(
        "input changed between passes: {resolved} records resolved, {partitioned} partitioned"
    )]
    RecordCountMismatch { resolved: u64, partitioned: u64 },
    #[error("cannot report statistics: count '{field}' was never recorded")]
    IncompleteStats { field: &'static str },
    #[error("invalid sample specification '{spec}'; expected PATH or SAMPLE=PATH")]
    InvalidSampleSpec { spec: String },
    #[error("sample id '{sample}' is given more than once; name inputs with SAMPLE=PATH")]
    DuplicateSample { sample: String },
    #[error("input is not sorted in {expected} order (record {record})")]
    UnsortedInput {
        expected: &'static str,
        record: String,
    },
}
