use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_POST_TITLE: &str = "Welcome to miCommunity Discussion";
pub const DEFAULT_POST_CONTENT: &str =
    "This is the main community discussion thread. Feel free to log in and post your comments below!";
pub const DEFAULT_POST_AUTHOR: &str = "Admin";

/// An account. At least one of `password_hash` and `google_id` is always set.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A username/password account.
    pub fn with_password(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: Some(password_hash),
            google_id: None,
            created_at: Utc::now(),
        }
    }

    /// An account created from a Google profile, with no password.
    pub fn with_google_id(username: String, email: String, google_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: None,
            google_id: Some(google_id),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

impl Post {
    /// The post synthesized when the store holds none.
    pub fn welcome() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: DEFAULT_POST_TITLE.to_string(),
            content: DEFAULT_POST_CONTENT.to_string(),
            author: DEFAULT_POST_AUTHOR.to_string(),
            date: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    /// Snapshot of the author's username at write time.
    pub username: String,
    pub content: String,
    pub date: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: Uuid, user_id: Uuid, username: String, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id,
            user_id,
            username,
            content,
            date: Utc::now(),
        }
    }
}
