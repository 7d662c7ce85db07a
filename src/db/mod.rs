//! Database module for the miCommunity server
//!
//! Models, the storage ports the rest of the crate depends on, and their
//! Postgres implementation.

pub mod models;
pub mod operations;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use models::{Comment, Post, User};
pub use operations::DbOperations;
pub use store::{DiscussionStore, UserStore};
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;
