use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// A file written under a hidden temporary name next to its destination.
///
/// `commit` renames it into place; dropping it uncommitted deletes it, so an
/// aborted run never leaves a partial file at the final path.
pub struct StagedFile {
    temp: TempPath,
    dest: PathBuf,
}

impl StagedFile {
    pub fn new(dest: &Path) -> Result<Self> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".tmp")
            .tempfile_in(dir)
            .with_context(|| format!("failed to create temporary file in {}", dir.display()))?
            .into_temp_path();
        Ok(Self { temp, dest: dest.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn commit(self) -> Result<PathBuf> {
        let StagedFile { temp, dest } = self;
        temp.persist(&dest)
            .with_context(|| format!("failed to move output into place at {}", dest.display()))?;
        Ok(dest)
    }
}

/// Write a small text file atomically.
pub fn write_text(dest: &Path, contents: &str) -> Result<()> {
    let staged = StagedFile::new(dest)?;
    std::fs::write(staged.path(), contents)
        .with_context(|| format!("failed to write {}", staged.path().display()))?;
    staged.commit()?;
    Ok(())
}
