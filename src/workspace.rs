//! Batch-scoped working storage.
//!
//! Every batch gets its own directory under the working root. Side artifacts
//! (table exports, crops, embedded images, rendered slides, persisted
//! sources) live there only for the duration of the batch.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};

const SUBDIRS: [&str; 4] = ["tables", "images", "slides", "sources"];

/// A per-batch working directory, removed on [`close`](Self::close) or drop.
#[derive(Debug)]
pub struct WorkingDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl WorkingDir {
    /// Create a fresh working directory under `root`.
    ///
    /// The directory name starts with the sanitised batch identifiers and
    /// ends with a random suffix, so concurrent batches never collide.
    pub fn create(root: &Path, collection_id: &str, item_id: &str) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| {
            Error::WorkingStorage(format!("cannot create {}: {e}", root.display()))
        })?;

        let prefix = format!("{}-{}-", sanitize(collection_id), sanitize(item_id));
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(root)
            .map_err(|e| {
                Error::WorkingStorage(format!("cannot create under {}: {e}", root.display()))
            })?;

        for sub in SUBDIRS {
            fs::create_dir(dir.path().join(sub))
                .map_err(|e| Error::WorkingStorage(format!("cannot create {sub}/: {e}")))?;
        }

        let path = dir.path().to_path_buf();
        log::debug!("Created working directory {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.path.join("tables")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.path.join("images")
    }

    pub fn slides_dir(&self) -> PathBuf {
        self.path.join("slides")
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.path.join("sources")
    }

    /// `{base}/{input_index}/`, created on first use. Artifacts of two
    /// inputs never share a directory, whatever their names.
    pub fn input_dir(&self, base: PathBuf, input_index: usize) -> Result<PathBuf> {
        let dir = base.join(input_index.to_string());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Persist input bytes under `sources/`, keeping the original filename
    /// (sanitised) so external tools see a familiar name and extension.
    pub fn write_source(&self, index: usize, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input");
        let dir = self.sources_dir().join(index.to_string());
        fs::create_dir_all(&dir)?;
        let path = dir.join(sanitize(name));
        fs::write(&path, data)?;
        Ok(path)
    }

    /// Remove the directory and everything in it.
    pub fn close(mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            dir.close()
                .map_err(|e| Error::WorkingStorage(format!("cleanup failed: {e}")))?;
            log::debug!("Removed working directory {}", self.path.display());
        }
        Ok(())
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        if self.dir.take().is_some() {
            log::debug!(
                "Working directory {} removed on drop",
                self.path.display()
            );
        }
    }
}

/// Files written by one in-flight extraction.
///
/// Dropping the guard without [`commit`](Self::commit) deletes every
/// tracked file, so a failed, timed-out or cancelled extraction leaves
/// nothing behind.
#[derive(Debug, Default)]
pub struct ArtifactGuard {
    paths: Vec<PathBuf>,
    committed: bool,
}

impl ArtifactGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `data` to `path` and track it.
    pub fn write(&mut self, path: PathBuf, data: &[u8]) -> Result<PathBuf> {
        self.paths.push(path.clone());
        fs::write(&path, data)?;
        Ok(path)
    }

    /// Track a file written by someone else.
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Keep the files and hand their paths to the caller.
    pub fn commit(mut self) -> Vec<PathBuf> {
        self.committed = true;
        std::mem::take(&mut self.paths)
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in &self.paths {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    log::warn!("Failed to remove partial artifact {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Keep identifier characters safe for a path component.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        s => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_close() {
        let root = tempdir().unwrap();
        let wd = WorkingDir::create(root.path(), "research/7", "ref 2").unwrap();
        let path = wd.path().to_path_buf();

        assert!(path.starts_with(root.path()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("research_7-ref_2-"));
        for sub in SUBDIRS {
            assert!(path.join(sub).is_dir());
        }

        wd.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempdir().unwrap();
        let path = {
            let wd = WorkingDir::create(root.path(), "c", "i").unwrap();
            fs::write(wd.images_dir().join("x.png"), b"png").unwrap();
            wd.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_batches_get_distinct_dirs() {
        let root = tempdir().unwrap();
        let a = WorkingDir::create(root.path(), "c", "i").unwrap();
        let b = WorkingDir::create(root.path(), "c", "i").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_write_source_keeps_name() {
        let root = tempdir().unwrap();
        let wd = WorkingDir::create(root.path(), "c", "i").unwrap();
        let path = wd.write_source(0, "../../etc/deck.pptx", b"PK").unwrap();
        assert!(path.starts_with(wd.sources_dir()));
        assert_eq!(path.file_name().unwrap(), "deck.pptx");
        assert_eq!(fs::read(&path).unwrap(), b"PK");
    }

    #[test]
    fn test_input_dirs_are_separate() {
        let root = tempdir().unwrap();
        let wd = WorkingDir::create(root.path(), "c", "i").unwrap();
        let first = wd.input_dir(wd.tables_dir(), 0).unwrap();
        let second = wd.input_dir(wd.tables_dir(), 1).unwrap();

        assert!(first.is_dir() && second.is_dir());
        assert_ne!(first, second);
        assert!(first.starts_with(wd.tables_dir()));
        // Creating it again is fine
        assert_eq!(wd.input_dir(wd.tables_dir(), 0).unwrap(), first);
    }

    #[test]
    fn test_artifact_guard_cleans_up_unless_committed() {
        let root = tempdir().unwrap();
        let dropped = root.path().join("dropped.csv");
        let kept = root.path().join("kept.csv");

        {
            let mut guard = ArtifactGuard::new();
            guard.write(dropped.clone(), b"a,b").unwrap();
            assert!(dropped.exists());
        }
        assert!(!dropped.exists());

        let mut guard = ArtifactGuard::new();
        guard.write(kept.clone(), b"a,b").unwrap();
        let paths = guard.commit();
        assert_eq!(paths, vec![kept.clone()]);
        assert!(kept.exists());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("abc-1_2.pdf"), "abc-1_2.pdf");
        assert_eq!(sanitize("a b/c"), "a_b_c");
        assert_eq!(sanitize(".."), "_");
        assert_eq!(sanitize(""), "_");
    }
}
