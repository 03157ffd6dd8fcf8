//! blackfrag-rs: remove paired-end templates whose fragment overlaps a blacklist.
//!
//! The engine runs once per sample in four strictly ordered stages:
//!
//! 1. resolve one fragment per read pair from a name-grouped copy of the input,
//! 2. intersect fragments with the blacklist to build the set of excluded template ids,
//! 3. re-read the input and route every record to the kept or excluded BAM,
//! 4. report counts.
//!
//! # Library usage
//!
//! ```no_run
//! use blackfrag_rs::{load_blacklist, run_sample, BlacklistIndex, SampleConfig};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let regions = load_blacklist(Path::new("blacklist.bed"))?;
//! let index = BlacklistIndex::new(&regions);
//! let mut config = SampleConfig::new("S1", "S1.dedup.bam", "filtered/");
//! config.threads = 4;
//! let stats = run_sample(&config, &index)?;
//! println!("{}", stats.render());
//! # Ok(())
//! # }
//! ```

pub(crate) mod bam_input;
pub(crate) mod output;
pub(crate) mod types;

pub mod blacklist;
pub mod config;
pub mod error;
pub mod fragment;
pub mod header;
pub mod intersect;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod sort;
pub mod stats;

mod api;

// Flat re-exports for the most commonly used public types.
pub use api::{partition_records, RecordPartition};
pub use blacklist::{load_blacklist, BlacklistRegion};
pub use config::SampleConfig;
pub use error::FilterError;
pub use fragment::{Fragment, FragmentResolver};
pub use intersect::{BlacklistIndex, ExclusionSet};
pub use pipeline::run_sample;
pub use record::{AlignmentRecord, Strand};
pub use stats::FilterStats;
pub use types::{RefId, TemplateId};
