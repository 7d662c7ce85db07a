//! Authentication module for the miCommunity server
//!
//! Password accounts, Google sign-in, bearer tokens, cookie sessions and the
//! gateway that turns either credential into a caller identity.

pub mod gateway;
pub mod google;
pub mod handlers;
pub mod linker;
pub mod password;
pub mod service;
pub mod session;
pub mod token;

pub use gateway::AuthenticatedUser;
pub use google::GoogleOAuth;
pub use linker::{ExternalProfile, IdentityLinker};
pub use service::{AuthService, SignedIn};
pub use session::{session_middleware, SessionContext};
pub use token::{Claims, TokenIdentity, TokenIssuer};
