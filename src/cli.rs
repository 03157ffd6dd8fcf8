use blackfrag_rs::sort::DEFAULT_MAX_RECORDS;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "blackfrag-rs",
    about = "Remove read pairs whose fragment overlaps blacklisted regions",
    version
)]
pub struct Args {
    /// Input BAMs (deduplicated, paired-end), as PATH or SAMPLE=PATH
    #[arg(required = true, value_name = "BAM")]
    pub inputs: Vec<String>,

    /// Blacklist regions (BED: chrom, start, end; extra columns ignored)
    #[arg(short = 'b', long = "blacklist", value_name = "BED")]
    pub blacklist: PathBuf,

    /// Output directory for filtered/excluded BAMs and per-sample reports
    #[arg(short = 'o', long = "out-dir", value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Run summary across all samples [default: <out-dir>/blacklist_summary.tsv]
    #[arg(short = 's', long = "summary", value_name = "TSV")]
    pub summary: Option<PathBuf>,

    /// Number of threads (CPUs) to use per sample
    #[arg(short = 'p', long = "threads", default_value_t = 1)]
    pub threads: u8,

    /// Directory for scratch files (name-sorted copies, sort chunks)
    #[arg(short = 'T', long = "tmp-dir", value_name = "DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// Records held in memory per sort chunk before spilling to disk
    #[arg(long = "sort-buffer", default_value_t = DEFAULT_MAX_RECORDS)]
    pub sort_buffer: usize,

    /// Write log messages to this file instead of stderr
    #[arg(long = "log", value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Continue with the remaining samples when one fails
    #[arg(long)]
    pub keep_going: bool,

    /// Set logging level to WARN
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Args {
    pub fn summary_path(&self) -> PathBuf {
        self.summary
            .clone()
            .unwrap_or_else(|| self.out_dir.join("blacklist_summary.tsv"))
    }
}
