//! In-memory storage implementation.

use super::{BoxFuture, ProjectStore, StoreError, StoreResult};
use crate::marketplace::Project;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<String, Project>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored projects.
    pub fn len(&self) -> usize {
        self.projects.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProjectStore for MemoryStore {
    fn save(&self, project: &Project) -> BoxFuture<'_, StoreResult<()>> {
        let project = project.clone();
        Box::pin(async move {
            let mut projects = self
                .projects
                .write()
                .map_err(|e| StoreError::Other(format!("lock error: {}", e)))?;
            projects.insert(project.id.clone(), project);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StoreResult<Project>> {
        let id = id.to_string();
        Box::pin(async move {
            let projects = self
                .projects
                .read()
                .map_err(|e| StoreError::Other(format!("lock error: {}", e)))?;
            projects.get(&id).cloned().ok_or(StoreError::NotFound(id))
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StoreResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut projects = self
                .projects
                .write()
                .map_err(|e| StoreError::Other(format!("lock error: {}", e)))?;
            projects.remove(&id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<Project>>> {
        Box::pin(async move {
            let projects = self
                .projects
                .read()
                .map_err(|e| StoreError::Other(format!("lock error: {}", e)))?;
            Ok(projects.values().cloned().collect())
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StoreResult<bool>> {
        let id = id.to_string();
        Box::pin(async move {
            let projects = self
                .projects
                .read()
                .map_err(|e| StoreError::Other(format!("lock error: {}", e)))?;
            Ok(projects.contains_key(&id))
        })
    }
}
