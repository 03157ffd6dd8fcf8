use crate::error::FilterError;
use crate::sort::DEFAULT_MAX_RECORDS;
use crate::types::{HashSet, HashSetExt};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Everything the engine needs to process one sample.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub sample_id: String,
    pub input: PathBuf,
    pub out_dir: PathBuf,
    /// Parent for per-sample scratch directories (system temp dir when `None`).
    pub scratch_root: Option<PathBuf>,
    pub threads: usize,
    /// Records sorted in memory before spilling to scratch.
    pub sort_buffer: usize,
}

impl SampleConfig {
    pub fn new(
        sample_id: impl Into<String>,
        input: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sample_id: sample_id.into(),
            input: input.into(),
            out_dir: out_dir.into(),
            scratch_root: None,
            threads: 1,
            sort_buffer: DEFAULT_MAX_RECORDS,
        }
    }

    pub fn kept_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}.filtered.bam", self.sample_id))
    }

    pub fn kept_index_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}.filtered.bam.bai", self.sample_id))
    }

    pub fn excluded_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}.excluded.bam", self.sample_id))
    }

    pub fn report_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}.blacklist_stats.txt", self.sample_id))
    }

    /// Fresh scratch directory for this sample; removed when the handle drops.
    pub fn scratch_dir(&self) -> Result<TempDir> {
        let prefix = format!("blackfrag.{}.", self.sample_id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .with_context(|| format!("failed to create scratch root {}", root.display()))?;
                builder
                    .tempdir_in(root)
                    .with_context(|| format!("failed to create scratch in {}", root.display()))
            }
            None => builder.tempdir().context("failed to create scratch directory"),
        }
    }
}

/// Parse `SAMPLE=PATH` or `PATH`; a bare path is named after its file stem.
pub fn parse_sample_spec(spec: &str) -> Result<(String, PathBuf), FilterError> {
    let invalid = || FilterError::InvalidSampleSpec { spec: spec.to_string() };
    if let Some((name, path)) = spec.split_once('=') {
        if name.is_empty() || path.is_empty() {
            return Err(invalid());
        }
        return Ok((name.to_string(), PathBuf::from(path)));
    }
    let path = PathBuf::from(spec);
    let name = sample_name_from_path(&path).ok_or_else(invalid)?;
    Ok((name, path))
}

/// Parse every input spec, rejecting two inputs that resolve to the same sample id.
pub fn parse_sample_specs<S: AsRef<str>>(
    specs: &[S],
) -> Result<Vec<(String, PathBuf)>, FilterError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut samples = Vec::with_capacity(specs.len());
    for spec in specs {
        let (name, path) = parse_sample_spec(spec.as_ref())?;
        if !seen.insert(name.clone()) {
            return Err(FilterError::DuplicateSample { sample: name });
        }
        samples.push((name, path));
    }
    Ok(samples)
}

fn sample_name_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_and_bare_specs() {
        assert_eq!(
            parse_sample_spec("ctrl=/data/a.bam").unwrap(),
            ("ctrl".to_string(), PathBuf::from("/data/a.bam"))
        );
        assert_eq!(
            parse_sample_spec("/data/S1.dedup.bam").unwrap(),
            ("S1.dedup".to_string(), PathBuf::from("/data/S1.dedup.bam"))
        );
        assert!(parse_sample_spec("=x.bam").is_err());
        assert!(parse_sample_spec("x=").is_err());
    }

    #[test]
    fn duplicate_sample_ids_are_rejected() {
        let err = parse_sample_specs(&["a/S1.bam", "b/S1.bam"]).unwrap_err();
        assert_eq!(err, FilterError::DuplicateSample { sample: "S1".to_string() });

        let err = parse_sample_specs(&["S1=a.bam", "b/S1.bam"]).unwrap_err();
        assert_eq!(err, FilterError::DuplicateSample { sample: "S1".to_string() });

        let samples = parse_sample_specs(&["S1=a/S1.bam", "S2=b/S1.bam"]).unwrap();
        assert_eq!(samples[1], ("S2".to_string(), PathBuf::from("b/S1.bam")));
    }

    #[test]
    fn output_paths_are_named_after_the_sample() {
        let config = SampleConfig::new("S1", "in.bam", "/out");
        assert_eq!(config.kept_path(), PathBuf::from("/out/S1.filtered.bam"));
        assert_eq!(config.kept_index_path(), PathBuf::from("/out/S1.filtered.bam.bai"));
        assert_eq!(config.excluded_path(), PathBuf::from("/out/S1.excluded.bam"));
        assert_eq!(config.report_path(), PathBuf::from("/out/S1.blacklist_stats.txt"));
    }

    #[test]
    fn scratch_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let mut config = SampleConfig::new("S1", "in.bam", "/out");
        config.scratch_root = Some(root.path().join("tmp"));
        let scratch = config.scratch_dir().unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());
        drop(scratch);
        assert!(!path.exists());
    }
}
