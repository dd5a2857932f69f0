//! Marketplace: publish, unpublish, clone, and list persisted projects.
//!
//! The service owns a [`ProjectStore`] and treats the serialized tree as an
//! opaque payload. Every mutating operation is ownership-checked before any
//! state is touched; store failures are logged in full and surfaced with a
//! generic message.

use crate::storage::{ProjectStore, StoreError};
use crate::tree::ProjectTree;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A persisted project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier.
    pub id: String,
    /// Project name.
    pub name: String,
    /// Owning user.
    pub owner: String,
    /// The serialized component tree.
    pub tree: ProjectTree,
    /// Whether the project is visible on the marketplace.
    pub published: bool,
    /// Id of the project this one was cloned from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_from: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new unpublished project owned by `owner`.
    pub fn new(owner: impl Into<String>, name: impl Into<String>, tree: ProjectTree) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            owner: owner.into(),
            tree,
            published: false,
            forked_from: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A client-submitted project payload: an id when updating an existing
/// document, otherwise a fresh one is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub tree: ProjectTree,
}

/// Marketplace errors.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("project not found: {0}")]
    NotFound(String),
    #[error("not the owner of project {0}")]
    Forbidden(String),
    /// The generic message is deliberate; the underlying detail is logged
    /// server-side only.
    #[error("storage failure")]
    Store(#[source] StoreError),
}

/// Result type for marketplace operations.
pub type MarketplaceResult<T> = Result<T, MarketplaceError>;

fn store_err(e: StoreError) -> MarketplaceError {
    match e {
        StoreError::NotFound(id) => MarketplaceError::NotFound(id),
        other => {
            log::error!("marketplace store failure: {}", other);
            MarketplaceError::Store(other)
        }
    }
}

/// Publish/unpublish/clone/list over a project store.
pub struct MarketplaceService {
    store: Box<dyn ProjectStore>,
}

impl MarketplaceService {
    pub fn new(store: impl ProjectStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Access the backing store.
    pub fn store(&self) -> &dyn ProjectStore {
        self.store.as_ref()
    }

    /// All published projects.
    pub async fn list_published(&self) -> MarketplaceResult<Vec<Project>> {
        let mut projects = self.store.list().await.map_err(store_err)?;
        projects.retain(|p| p.published);
        Ok(projects)
    }

    /// Fetch a single project by id.
    pub async fn get(&self, id: &str) -> MarketplaceResult<Project> {
        self.store.load(id).await.map_err(store_err)
    }

    /// Save a draft without changing its publication state.
    ///
    /// This is the regular editor save path. A draft without an id creates
    /// a new unpublished project.
    pub async fn save(&self, user: &str, draft: ProjectDraft) -> MarketplaceResult<Project> {
        let project = match draft.id {
            Some(id) => {
                let mut existing = self.store.load(&id).await.map_err(store_err)?;
                if existing.owner != user {
                    return Err(MarketplaceError::Forbidden(id));
                }
                existing.name = draft.name;
                existing.tree = draft.tree;
                existing.updated_at = Utc::now();
                existing
            }
            None => Project::new(user, draft.name, draft.tree),
        };
        self.store.save(&project).await.map_err(store_err)?;
        Ok(project)
    }

    /// Publish a draft to the marketplace.
    ///
    /// Without an id this creates a new published project; with an id it
    /// updates that record in place, so publishing twice never duplicates.
    pub async fn publish(&self, user: &str, draft: ProjectDraft) -> MarketplaceResult<Project> {
        let project = match draft.id {
            Some(id) => {
                let mut existing = self.store.load(&id).await.map_err(store_err)?;
                if existing.owner != user {
                    return Err(MarketplaceError::Forbidden(id));
                }
                existing.name = draft.name;
                existing.tree = draft.tree;
                existing.published = true;
                existing.updated_at = Utc::now();
                existing
            }
            None => {
                let mut project = Project::new(user, draft.name, draft.tree);
                project.published = true;
                project
            }
        };
        self.store.save(&project).await.map_err(store_err)?;
        Ok(project)
    }

    /// Remove a project from the marketplace listing.
    ///
    /// Ownership is checked before anything is written; a mismatch leaves
    /// the stored document untouched.
    pub async fn unpublish(&self, user: &str, id: &str) -> MarketplaceResult<Project> {
        let mut project = self.store.load(id).await.map_err(store_err)?;
        if project.owner != user {
            return Err(MarketplaceError::Forbidden(id.to_string()));
        }
        project.published = false;
        project.updated_at = Utc::now();
        self.store.save(&project).await.map_err(store_err)?;
        Ok(project)
    }

    /// Clone a marketplace project into a new copy owned by `user`.
    ///
    /// The clone gets a fresh id, starts unpublished, and records where it
    /// was forked from; name and tree are taken from the source as-is.
    pub async fn clone_project(&self, user: &str, id: &str) -> MarketplaceResult<Project> {
        let source = self.store.load(id).await.map_err(store_err)?;
        if !source.published && source.owner != user {
            // Unpublished projects are only visible to their owner.
            return Err(MarketplaceError::Forbidden(id.to_string()));
        }

        let now = Utc::now();
        let clone = Project {
            id: Uuid::new_v4().to_string(),
            name: source.name,
            owner: user.to_string(),
            tree: source.tree,
            published: false,
            forked_from: Some(source.id),
            created_at: now,
            updated_at: now,
        };
        self.store.save(&clone).await.map_err(store_err)?;
        Ok(clone)
    }

    /// Delete a project entirely. Ownership-checked.
    pub async fn delete(&self, user: &str, id: &str) -> MarketplaceResult<()> {
        let project = self.store.load(id).await.map_err(store_err)?;
        if project.owner != user {
            return Err(MarketplaceError::Forbidden(id.to_string()));
        }
        self.store.delete(id).await.map_err(store_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pollster::block_on;

    fn service() -> MarketplaceService {
        MarketplaceService::new(MemoryStore::new())
    }

    fn draft(name: &str) -> ProjectDraft {
        ProjectDraft {
            id: None,
            name: name.to_string(),
            tree: ProjectTree::new(),
        }
    }

    #[test]
    fn test_publish_creates_then_updates() {
        let service = service();

        let published = block_on(service.publish("ada", draft("Landing Page"))).unwrap();
        assert!(published.published);

        // Publishing again with the returned id updates the same record.
        let again = block_on(service.publish(
            "ada",
            ProjectDraft {
                id: Some(published.id.clone()),
                name: "Landing Page v2".to_string(),
                tree: ProjectTree::new(),
            },
        ))
        .unwrap();
        assert_eq!(again.id, published.id);
        assert_eq!(again.created_at, published.created_at);

        let listed = block_on(service.list_published()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Landing Page v2");
    }

    #[test]
    fn test_list_excludes_unpublished() {
        let service = service();
        block_on(service.publish("ada", draft("Public"))).unwrap();
        block_on(service.save("ada", draft("Private"))).unwrap();

        let listed = block_on(service.list_published()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Public");
    }

    #[test]
    fn test_unpublish_requires_ownership() {
        let service = service();
        let project = block_on(service.publish("ada", draft("Landing Page"))).unwrap();

        let err = block_on(service.unpublish("grace", &project.id)).unwrap_err();
        assert!(matches!(err, MarketplaceError::Forbidden(_)));

        // The stored flag is unchanged.
        let stored = block_on(service.get(&project.id)).unwrap();
        assert!(stored.published);

        let unpublished = block_on(service.unpublish("ada", &project.id)).unwrap();
        assert!(!unpublished.published);
    }

    #[test]
    fn test_clone_semantics() {
        let service = service();
        let source = block_on(service.publish("ada", draft("Landing Page"))).unwrap();

        let clone = block_on(service.clone_project("grace", &source.id)).unwrap();
        assert_ne!(clone.id, source.id);
        assert_eq!(clone.owner, "grace");
        assert!(!clone.published);
        assert_eq!(clone.forked_from.as_deref(), Some(source.id.as_str()));
        assert_eq!(clone.name, source.name);
        assert_eq!(clone.tree, source.tree);
    }

    #[test]
    fn test_clone_unpublished_is_owner_only() {
        let service = service();
        let private = block_on(service.save("ada", draft("Private"))).unwrap();

        assert!(matches!(
            block_on(service.clone_project("grace", &private.id)),
            Err(MarketplaceError::Forbidden(_))
        ));
        assert!(block_on(service.clone_project("ada", &private.id)).is_ok());
    }

    #[test]
    fn test_save_preserves_publication_state() {
        let service = service();
        let published = block_on(service.publish("ada", draft("Landing Page"))).unwrap();

        let saved = block_on(service.save(
            "ada",
            ProjectDraft {
                id: Some(published.id.clone()),
                name: "Landing Page".to_string(),
                tree: ProjectTree::new(),
            },
        ))
        .unwrap();
        assert!(saved.published);
    }

    #[test]
    fn test_update_foreign_project_fails() {
        let service = service();
        let project = block_on(service.publish("ada", draft("Landing Page"))).unwrap();

        let err = block_on(service.publish(
            "grace",
            ProjectDraft {
                id: Some(project.id.clone()),
                name: "Hijacked".to_string(),
                tree: ProjectTree::new(),
            },
        ))
        .unwrap_err();
        assert!(matches!(err, MarketplaceError::Forbidden(_)));

        let stored = block_on(service.get(&project.id)).unwrap();
        assert_eq!(stored.name, "Landing Page");
    }

    #[test]
    fn test_delete_requires_ownership() {
        let service = service();
        let project = block_on(service.save("ada", draft("Landing Page"))).unwrap();

        assert!(matches!(
            block_on(service.delete("grace", &project.id)),
            Err(MarketplaceError::Forbidden(_))
        ));
        block_on(service.delete("ada", &project.id)).unwrap();
        assert!(matches!(
            block_on(service.get(&project.id)),
            Err(MarketplaceError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let service = service();
        assert!(matches!(
            block_on(service.get("nope")),
            Err(MarketplaceError::NotFound(_))
        ));
    }
}
