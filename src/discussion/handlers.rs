use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::handlers::MessageResponse;
use crate::auth::AuthenticatedUser;
use crate::db::models::{Comment, Post};
use crate::error::{AppError, DatabaseError};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    // The front end reads the post id as `_id`.
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            author: post.author,
            date: post.date,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub username: String,
    pub content: String,
    pub date: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            username: comment.username,
            content: comment.content,
            date: comment.date,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentRequest {
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

fn parse_post_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation("Invalid post id."))
}

/// The discussion's one post, created with default text on first read.
pub async fn get_single_post(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let post = state.discussion.get_or_create_post(&Post::welcome()).await?;
    Ok(HttpResponse::Ok().json(PostResponse::from(post)))
}

pub async fn list_comments(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let post_id = parse_post_id(&path)?;
    let comments: Vec<CommentResponse> = state
        .discussion
        .list_comments(post_id)
        .await?
        .into_iter()
        .map(CommentResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(comments))
}

/// The body extractor is taken as a `Result` so a rejected caller always sees
/// the gateway's error, whatever the payload.
pub async fn post_comment(
    caller: AuthenticatedUser,
    req: Result<web::Json<NewCommentRequest>, actix_web::Error>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = match req {
        Ok(req) => req.into_inner(),
        Err(e) => {
            warn!("Unreadable comment body from {}: {}", caller.username, e);
            return Err(AppError::validation("Invalid request body."));
        }
    };
    let (Some(raw_post_id), Some(content)) = (
        req.post_id.filter(|id| !id.trim().is_empty()),
        req.content.filter(|c| !c.trim().is_empty()),
    ) else {
        return Err(AppError::validation("Missing postId or comment content."));
    };
    let post_id = parse_post_id(&raw_post_id)?;

    let comment = Comment::new(post_id, caller.user_id, caller.username.clone(), content);
    match state.discussion.create_comment(&comment).await {
        Ok(_) => {
            info!("{} commented on post {}", caller.username, post_id);
            Ok(HttpResponse::Created().json(MessageResponse::new("Comment posted successfully.")))
        }
        Err(DatabaseError::MissingReference(constraint)) => {
            warn!("Comment by {} rejected: {} does not resolve", caller.username, constraint);
            if constraint.contains("user") {
                Err(AppError::validation("Comment author no longer exists."))
            } else {
                Err(AppError::validation("Post does not exist."))
            }
        }
        Err(e) => Err(e.into()),
    }
}
