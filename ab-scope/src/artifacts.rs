use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use tracing::debug;

/// Allocation and bookkeeping of files produced during a run.
pub trait ArtifactRegistry {
    /// Creates an empty, uniquely named file and returns its path.
    fn allocate_temp_path(&mut self, suffix: &str, prefix: &str) -> io::Result<PathBuf>;

    fn track_artifact(&mut self, path: &Path);
}

/// Artifacts of one run, all kept below a single directory that outlives the
/// process.
#[derive(Debug)]
pub struct ArtifactDir {
    root: PathBuf,
    tracked: Vec<PathBuf>,
}

impl ArtifactDir {
    /// Uses `dir` (created if missing) or a fresh directory under the system
    /// temp dir.
    pub fn create(dir: Option<&Path>) -> io::Result<Self> {
        let root = match dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                dir.to_path_buf()
            }
            None => tempfile::Builder::new().prefix("ab-scope-").tempdir()?.keep(),
        };
        debug!("artifacts go to {}", root.display());
        Ok(Self {
            root,
            tracked: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.tracked
    }
}

impl ArtifactRegistry for ArtifactDir {
    fn allocate_temp_path(&mut self, suffix: &str, prefix: &str) -> io::Result<PathBuf> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&self.root)?;
        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    fn track_artifact(&mut self, path: &Path) {
        if !self.tracked.iter().any(|p| p == path) {
            self.tracked.push(path.to_path_buf());
        }
    }
}
