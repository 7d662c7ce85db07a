use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{Comment, Post, User};
use crate::db::store::{DiscussionStore, UserStore};
use crate::error::DatabaseError;

const USER_COLUMNS: &str = "id, username, email, password_hash, google_id, created_at";

/// Postgres implementation of the storage ports.
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Applies the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn find_user_where(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(value)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn create_user(&self, user: &User) -> Result<User, DatabaseError> {
        let query = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, google_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.google_id)
            .bind(user.created_at)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        self.find_user_where("email", email).await
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, DatabaseError> {
        self.find_user_where("google_id", google_id).await
    }

    async fn link_google_id(&self, user_id: Uuid, google_id: &str) -> Result<User, DatabaseError> {
        let query = format!(
            "UPDATE users SET google_id = $1 WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(google_id)
            .bind(user_id)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl DiscussionStore for DbOperations {
    async fn get_or_create_post(&self, default: &Post) -> Result<Post, DatabaseError> {
        // The singleton column rejects a second row, so racing first reads insert once.
        sqlx::query(
            r#"
            INSERT INTO posts (id, title, content, author, date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (singleton) DO NOTHING
            "#,
        )
        .bind(default.id)
        .bind(&default.title)
        .bind(&default.content)
        .bind(&default.author)
        .bind(default.date)
        .execute(self.pool.as_ref())
        .await?;

        let post = sqlx::query_as::<_, Post>(
            "SELECT id, title, content, author, date FROM posts WHERE singleton",
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(post)
    }

    async fn create_comment(&self, comment: &Comment) -> Result<Comment, DatabaseError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, post_id, user_id, username, content, date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, post_id, user_id, username, content, date
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.user_id)
        .bind(&comment.username)
        .bind(&comment.content)
        .bind(comment.date)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(comment)
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, DatabaseError> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, user_id, username, content, date
            FROM comments
            WHERE post_id = $1
            ORDER BY date ASC, seq ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(comments)
    }
}
