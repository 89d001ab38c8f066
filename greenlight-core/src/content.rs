//! Content store collaborator.
//!
//! The content platform owns post rows; the engine only reads posts and
//! applies partial updates. The trait keeps that boundary explicit and lets
//! tests run against the in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::ids::PostId;
use crate::post::{Post, PostPatch};

/// Errors surfaced by the content store.
#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("post {0} not found")]
    NotFound(PostId),

    #[error("content store unavailable: {0}")]
    Unavailable(String),
}

/// Read/partial-write access to posts.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch a post by id.
    async fn get_post(&self, id: &PostId) -> Result<Post, ContentStoreError>;

    /// Apply a partial update to a post. Fields absent from the patch are
    /// left as-is.
    async fn update_post(&self, id: &PostId, patch: PostPatch) -> Result<(), ContentStoreError>;
}

/// In-memory content store for tests and embedded use.
#[derive(Default)]
pub struct InMemoryContentStore {
    posts: RwLock<HashMap<PostId, Post>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a post.
    pub async fn insert(&self, post: Post) {
        let mut posts = self.posts.write().await;
        posts.insert(post.id.clone(), post);
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn get_post(&self, id: &PostId) -> Result<Post, ContentStoreError> {
        let posts = self.posts.read().await;
        posts
            .get(id)
            .cloned()
            .ok_or_else(|| ContentStoreError::NotFound(id.clone()))
    }

    async fn update_post(&self, id: &PostId, patch: PostPatch) -> Result<(), ContentStoreError> {
        let mut posts = self.posts.write().await;
        let post = posts
            .get_mut(id)
            .ok_or_else(|| ContentStoreError::NotFound(id.clone()))?;
        patch.apply(post);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ActorId;
    use crate::post::PostStatus;

    fn post(id: &str) -> Post {
        Post {
            id: PostId::from(id),
            author_id: ActorId::from("alice"),
            team_id: None,
            content: "hello".to_string(),
            media_urls: vec![],
            scheduled_at: None,
            status: PostStatus::Draft,
        }
    }

    #[tokio::test]
    async fn get_missing_post_is_not_found() {
        let store = InMemoryContentStore::new();
        let err = store.get_post(&PostId::from("nope")).await.unwrap_err();
        assert!(matches!(err, ContentStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_applies_partial_patch() {
        let store = InMemoryContentStore::new();
        store.insert(post("p1")).await;

        store
            .update_post(&PostId::from("p1"), PostPatch::status(PostStatus::Approved))
            .await
            .unwrap();

        let fetched = store.get_post(&PostId::from("p1")).await.unwrap();
        assert_eq!(fetched.status, PostStatus::Approved);
        assert_eq!(fetched.content, "hello");
    }
}
