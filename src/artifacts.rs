use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::Result;

/// Temporary files belonging to one request.
///
/// Every file is registered before it is written and deleted when the scope
/// is cleaned up or dropped, whichever comes first. Cleanup is idempotent.
pub struct ArtifactScope {
    dir: PathBuf,
    request_id: Uuid,
    created: Vec<PathBuf>,
}

impl ArtifactScope {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            request_id: Uuid::new_v4(),
            created: Vec::new(),
        })
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Request-scoped file name inside the working directory.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}_{}", self.request_id, name))
    }

    pub fn write(&mut self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(name);
        if !self.created.contains(&path) {
            self.created.push(path.clone());
        }
        fs::write(&path, bytes)?;
        debug!("Wrote artifact {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.created
    }

    /// Deletes every registered file; returns how many were actually removed.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for path in self.created.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove artifact {}: {}", path.display(), e),
            }
        }
        if removed > 0 {
            debug!("Request {}: removed {} artifacts", self.request_id, removed);
        }
        removed
    }
}

impl Drop for ArtifactScope {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work_dir() -> PathBuf {
        std::env::temp_dir().join(format!("market_snapshot_artifacts_{}", Uuid::new_v4()))
    }

    fn files_in(dir: &Path) -> usize {
        fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[test]
    fn cleanup_is_idempotent() {
        let dir = work_dir();
        let mut scope = ArtifactScope::new(&dir).unwrap();
        let path = scope.write("bars.png", b"png").unwrap();
        assert!(path.exists());

        assert_eq!(scope.cleanup(), 1);
        assert_eq!(scope.cleanup(), 0);
        assert!(!path.exists());
        fs::remove_dir(&dir).unwrap();
    }

    #[test]
    fn externally_deleted_file_is_not_an_error() {
        let dir = work_dir();
        let mut scope = ArtifactScope::new(&dir).unwrap();
        let path = scope.write("report.pdf", b"%PDF").unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(scope.cleanup(), 0);
        fs::remove_dir(&dir).unwrap();
    }

    #[test]
    fn drop_removes_everything() {
        let dir = work_dir();
        {
            let mut scope = ArtifactScope::new(&dir).unwrap();
            scope.write("a.png", b"a").unwrap();
            scope.write("b.png", b"b").unwrap();
            assert_eq!(files_in(&dir), 2);
        }
        assert_eq!(files_in(&dir), 0);
        fs::remove_dir(&dir).unwrap();
    }

    #[test]
    fn names_are_request_scoped() {
        let dir = work_dir();
        let first = ArtifactScope::new(&dir).unwrap();
        let second = ArtifactScope::new(&dir).unwrap();
        assert_ne!(first.path_for("bars.png"), second.path_for("bars.png"));
        drop(first);
        drop(second);
        fs::remove_dir(&dir).unwrap();
    }
}
