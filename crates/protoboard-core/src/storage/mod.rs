//! Storage abstraction for persisted projects.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::marketplace::Project;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("project not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for project storage backends.
///
/// Implementations can keep projects in memory, on the filesystem, or in an
/// external document store. The marketplace service treats the serialized
/// tree as opaque.
pub trait ProjectStore: Send + Sync {
    /// Save (upsert) a project document.
    fn save(&self, project: &Project) -> BoxFuture<'_, StoreResult<()>>;

    /// Load a project by id.
    fn load(&self, id: &str) -> BoxFuture<'_, StoreResult<Project>>;

    /// Delete a project by id.
    fn delete(&self, id: &str) -> BoxFuture<'_, StoreResult<()>>;

    /// List all stored projects.
    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<Project>>>;

    /// Check if a project exists.
    fn exists(&self, id: &str) -> BoxFuture<'_, StoreResult<bool>>;
}
