use std::{
    fs,
    path::Path,
};
use tempfile::TempDir;

/// A scratch directory standing in for a hosted bare repository.
pub struct TempRepo {
    dir: TempDir,
}

impl TempRepo {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temporary repository"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a side file relative to the repository directory.
    pub fn write(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directory");
        }
        fs::write(&path, content).expect("failed to write repository file");
    }

    pub fn read(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.dir.path().join(name)).ok()
    }
}

impl Default for TempRepo {
    fn default() -> Self {
        Self::new()
    }
}
