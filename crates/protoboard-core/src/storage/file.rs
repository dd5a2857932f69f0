//! File-based storage implementation.

use super::{BoxFuture, ProjectStore, StoreError, StoreResult};
use crate::marketplace::Project;
use std::fs;
use std::path::PathBuf;

/// File-based storage.
///
/// Stores each project as a JSON document in a base directory.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create a new file store rooted at the given directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StoreResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StoreError::Io(format!("failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Get the file path for a project id.
    fn project_path(&self, id: &str) -> PathBuf {
        // Sanitize the id to be safe for filenames.
        let safe_id: String = id
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_path.join(format!("{}.json", safe_id))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}

impl ProjectStore for FileStore {
    fn save(&self, project: &Project) -> BoxFuture<'_, StoreResult<()>> {
        let path = self.project_path(&project.id);
        let json = serde_json::to_string_pretty(project);

        Box::pin(async move {
            let json = json.map_err(|e| StoreError::Serialization(e.to_string()))?;
            fs::write(&path, json)
                .map_err(|e| StoreError::Io(format!("failed to write {}: {}", path.display(), e)))
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StoreResult<Project>> {
        let path = self.project_path(id);
        let id = id.to_string();

        Box::pin(async move {
            if !path.exists() {
                return Err(StoreError::NotFound(id));
            }
            let json = fs::read_to_string(&path)
                .map_err(|e| StoreError::Io(format!("failed to read {}: {}", path.display(), e)))?;
            serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StoreResult<()>> {
        let path = self.project_path(id);
        let id = id.to_string();

        Box::pin(async move {
            if !path.exists() {
                return Err(StoreError::NotFound(id));
            }
            fs::remove_file(&path)
                .map_err(|e| StoreError::Io(format!("failed to delete {}: {}", path.display(), e)))
        })
    }

    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<Project>>> {
        let base = self.base_path.clone();

        Box::pin(async move {
            let entries = fs::read_dir(&base)
                .map_err(|e| StoreError::Io(format!("failed to read {}: {}", base.display(), e)))?;

            let mut projects = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::Io(e.to_string()))?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let json = fs::read_to_string(&path).map_err(|e| {
                    StoreError::Io(format!("failed to read {}: {}", path.display(), e))
                })?;
                match serde_json::from_str(&json) {
                    Ok(project) => projects.push(project),
                    // A corrupt document shouldn't hide the rest.
                    Err(e) => log::warn!("skipping unreadable project {}: {}", path.display(), e),
                }
            }
            Ok(projects)
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StoreResult<bool>> {
        let path = self.project_path(id);
        Box::pin(async move { Ok(path.exists()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ProjectTree;
    use pollster::block_on;

    fn project(id: &str) -> Project {
        let mut p = Project::new("ada", "Landing Page", ProjectTree::new());
        p.id = id.to_string();
        p
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        let p = project("p1");

        block_on(store.save(&p)).unwrap();
        let loaded = block_on(store.load("p1")).unwrap();
        assert_eq!(loaded, p);
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        assert!(matches!(
            block_on(store.load("nope")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        block_on(store.save(&project("p1"))).unwrap();
        block_on(store.save(&project("p2"))).unwrap();
        assert_eq!(block_on(store.list()).unwrap().len(), 2);

        block_on(store.delete("p1")).unwrap();
        assert_eq!(block_on(store.list()).unwrap().len(), 1);
        assert!(!block_on(store.exists("p1")).unwrap());
    }

    #[test]
    fn test_id_sanitization() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        let p = project("../escape/attempt");

        block_on(store.save(&p)).unwrap();
        // The document stays inside the base directory.
        assert_eq!(block_on(store.list()).unwrap().len(), 1);
    }
}
