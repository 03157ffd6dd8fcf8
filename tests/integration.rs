/// End-to-end tests that run the blackfrag-rs binary on small generated BAMs
/// and inspect the files it leaves in the output directory.
mod common;

use blackfrag_rs::sort::SortOrder;
use common::*;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// ── helpers ──────────────────────────────────────────────────────────────────

fn blackfrag_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_blackfrag-rs"))
}

fn run_binary(args: &[&str]) -> Output {
    Command::new(blackfrag_bin())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to spawn blackfrag-rs")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

fn summary_rows(path: &Path) -> Vec<Vec<String>> {
    std::fs::read_to_string(path)
        .expect("read summary")
        .lines()
        .map(|l| l.split('\t').map(str::to_string).collect())
        .collect()
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[test]
fn filters_two_samples_and_writes_summary() {
    let dir = TempDir::new().unwrap();
    let bed = dir.path().join("blacklist.bed");
    write_blacklist(&bed, &["track name=blacklist", "chr1\t200\t220\tHighSignal"]);
    let a = dir.path().join("a.bam");
    let b = dir.path().join("b.bam");
    write_bam(&a, &scenario_reads(), Some(SortOrder::Coordinate));
    write_bam(&b, &scenario_reads(), None);
    let out = dir.path().join("out");

    let b_spec = format!("second={}", path_str(&b));
    let output = run_binary(&[
        path_str(&a),
        &b_spec,
        "-b",
        path_str(&bed),
        "-o",
        path_str(&out),
        "-p",
        "2",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    for sample in ["a", "second"] {
        let kept = out.join(format!("{sample}.filtered.bam"));
        let excluded = out.join(format!("{sample}.excluded.bam"));
        assert_eq!(count_bam_records(&kept), 5, "{sample}");
        assert_eq!(count_bam_records(&excluded), 2, "{sample}");
        assert!(out.join(format!("{sample}.filtered.bam.bai")).exists());
        assert!(out.join(format!("{sample}.blacklist_stats.txt")).exists());
    }

    let rows = summary_rows(&out.join("blacklist_summary.tsv"));
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], "sample");
    assert_eq!(rows[1], vec!["a", "1", "1", "2", "5", "2", "7"]);
    assert_eq!(rows[2], vec!["second", "1", "1", "2", "5", "2", "7"]);
}

#[test]
fn keep_going_reports_the_samples_that_succeeded() {
    let dir = TempDir::new().unwrap();
    let bed = dir.path().join("blacklist.bed");
    write_blacklist(&bed, &["chr1\t200\t220"]);
    let good = dir.path().join("good.bam");
    write_bam(&good, &scenario_reads(), Some(SortOrder::Coordinate));
    let missing = dir.path().join("missing.bam");
    let out = dir.path().join("out");
    let summary = dir.path().join("summary.tsv");

    let output = run_binary(&[
        path_str(&missing),
        path_str(&good),
        "-b",
        path_str(&bed),
        "-o",
        path_str(&out),
        "-s",
        path_str(&summary),
        "--keep-going",
    ]);

    assert!(!output.status.success());
    assert!(!out.join("missing.filtered.bam").exists());
    assert_eq!(count_bam_records(&out.join("good.filtered.bam")), 5);
    let rows = summary_rows(&summary);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], "good");
}

#[test]
fn stops_at_first_failure_without_keep_going() {
    let dir = TempDir::new().unwrap();
    let bed = dir.path().join("blacklist.bed");
    write_blacklist(&bed, &["chr1\t200\t220"]);
    let good = dir.path().join("good.bam");
    write_bam(&good, &scenario_reads(), Some(SortOrder::Coordinate));
    let missing = dir.path().join("missing.bam");
    let out = dir.path().join("out");

    let output = run_binary(&[
        path_str(&missing),
        path_str(&good),
        "-b",
        path_str(&bed),
        "-o",
        path_str(&out),
    ]);

    assert!(!output.status.success());
    assert!(!out.join("good.filtered.bam").exists());
    assert_eq!(summary_rows(&out.join("blacklist_summary.tsv")).len(), 1);
}

#[test]
fn duplicate_sample_ids_are_rejected_before_any_sample_runs() {
    let dir = TempDir::new().unwrap();
    let bed = dir.path().join("blacklist.bed");
    write_blacklist(&bed, &["chr1\t200\t220"]);
    for sub in ["a", "b"] {
        std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        write_bam(&dir.path().join(sub).join("S1.bam"), &scenario_reads(), None);
    }
    let out = dir.path().join("out");

    let output = run_binary(&[
        path_str(&dir.path().join("a/S1.bam")),
        path_str(&dir.path().join("b/S1.bam")),
        "-b",
        path_str(&bed),
        "-o",
        path_str(&out),
    ]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("'S1' is given more than once"), "stderr: {stderr}");
    assert!(!out.join("S1.filtered.bam").exists());
    assert!(!out.join("blacklist_summary.tsv").exists());
}

#[test]
fn malformed_blacklist_fails_before_any_sample_runs() {
    let dir = TempDir::new().unwrap();
    let bed = dir.path().join("blacklist.bed");
    write_blacklist(&bed, &["chr1\t200\t220", "chr1\tfive\t300"]);
    let input = dir.path().join("S1.bam");
    write_bam(&input, &scenario_reads(), Some(SortOrder::Coordinate));
    let out = dir.path().join("out");

    let output = run_binary(&[path_str(&input), "-b", path_str(&bed), "-o", path_str(&out)]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("blacklist.bed:2"), "stderr: {stderr}");
    assert!(!out.join("S1.filtered.bam").exists());
}

#[test]
fn log_file_receives_progress_messages() {
    let dir = TempDir::new().unwrap();
    let bed = dir.path().join("blacklist.bed");
    write_blacklist(&bed, &["chr1\t200\t220"]);
    let input = dir.path().join("S1.bam");
    write_bam(&input, &scenario_reads(), Some(SortOrder::Coordinate));
    let out = dir.path().join("out");
    let log = dir.path().join("run.log");

    let output = run_binary(&[
        path_str(&input),
        "-b",
        path_str(&bed),
        "-o",
        path_str(&out),
        "--log",
        path_str(&log),
    ]);

    assert!(output.status.success());
    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("processing complete"));
    assert!(text.contains("S1"));
}
