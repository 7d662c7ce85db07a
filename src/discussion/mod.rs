//! The single post and its comment thread.

pub mod handlers;

pub use handlers::{get_single_post, list_comments, post_comment};
