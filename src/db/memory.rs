//! In-memory storage for tests.
//!
//! Mirrors the Postgres constraints: unique username, email and Google id,
//! a single post, and comments that must reference an existing post and user.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{Comment, Post, User};
use crate::db::store::{DiscussionStore, UserStore};
use crate::error::{DatabaseError, UniqueKey};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    post: Option<Post>,
    comments: Vec<Comment>,
}

impl Tables {
    fn check_unique(&self, user: &User) -> Result<(), DatabaseError> {
        for existing in self.users.iter().filter(|u| u.id != user.id) {
            if existing.username == user.username {
                return Err(DatabaseError::Duplicate(UniqueKey::Username));
            }
            if existing.email == user.email {
                return Err(DatabaseError::Duplicate(UniqueKey::Email));
            }
            if user.google_id.is_some() && existing.google_id == user.google_id {
                return Err(DatabaseError::Duplicate(UniqueKey::GoogleId));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<User, DatabaseError> {
        if user.password_hash.is_none() && user.google_id.is_none() {
            return Err(DatabaseError::QueryError(
                "user needs a password hash or a google id".to_string(),
            ));
        }
        let mut tables = self.tables.write().await;
        tables.check_unique(user)?;
        tables.users.push(user.clone());
        Ok(user.clone())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn link_google_id(&self, user_id: Uuid, google_id: &str) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        let mut updated = tables
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound)?;
        updated.google_id = Some(google_id.to_string());
        tables.check_unique(&updated)?;

        if let Some(slot) = tables.users.iter_mut().find(|u| u.id == user_id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }
}

#[async_trait]
impl DiscussionStore for MemoryStore {
    async fn get_or_create_post(&self, default: &Post) -> Result<Post, DatabaseError> {
        let mut tables = self.tables.write().await;
        Ok(tables.post.get_or_insert_with(|| default.clone()).clone())
    }

    async fn create_comment(&self, comment: &Comment) -> Result<Comment, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.post.as_ref().is_some_and(|p| p.id == comment.post_id) {
            return Err(DatabaseError::MissingReference("comments_post_id_fkey".to_string()));
        }
        if !tables.users.iter().any(|u| u.id == comment.user_id) {
            return Err(DatabaseError::MissingReference("comments_user_id_fkey".to_string()));
        }
        tables.comments.push(comment.clone());
        Ok(comment.clone())
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        comments.sort_by_key(|c| c.date);
        Ok(comments)
    }
}
