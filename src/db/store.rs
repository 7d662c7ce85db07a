//! Storage ports.
//!
//! Handlers and services only see these traits. `DbOperations` implements them
//! on Postgres; the `test-support` feature adds an in-memory implementation.
//! Uniqueness and reference checks live in the implementations and surface as
//! [`DatabaseError::Duplicate`] and [`DatabaseError::MissingReference`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{Comment, Post, User};
use crate::error::DatabaseError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user. Fails with `Duplicate` on a username, email or Google id clash.
    async fn create_user(&self, user: &User) -> Result<User, DatabaseError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, DatabaseError>;

    /// Attaches a Google id to an existing account and returns the updated record.
    async fn link_google_id(&self, user_id: Uuid, google_id: &str) -> Result<User, DatabaseError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscussionStore: Send + Sync {
    /// Returns the single post, persisting `default` first if the store holds none.
    async fn get_or_create_post(&self, default: &Post) -> Result<Post, DatabaseError>;

    /// Fails with `MissingReference` when the post or the author does not exist.
    async fn create_comment(&self, comment: &Comment) -> Result<Comment, DatabaseError>;

    /// Comments on `post_id`, oldest first.
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, DatabaseError>;
}
