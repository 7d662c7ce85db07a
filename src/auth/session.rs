//! Cookie session helpers.
//!
//! Wraps the Actix session so handlers deal in user ids and the pending OAuth
//! handshake rather than raw keys.

use actix_session::config::{CookieContentSecurity, PersistentSession};
use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionMiddleware};
use actix_web::cookie::{Key, SameSite};
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tracing::warn;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AppError;

pub const SESSION_COOKIE_NAME: &str = "micommunity_session";
pub(crate) const USER_ID_KEY: &str = "user_id";
pub(crate) const OAUTH_STATE_KEY: &str = "oauth_state";

/// CSRF state and PKCE verifier kept between `/auth/google` and its callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingOAuth {
    pub csrf_state: String,
    pub pkce_verifier: String,
}

/// Cookie signing/encryption key derived from the configured session secret.
pub fn session_key(secret: &str) -> Key {
    // SHA-512 yields exactly the 64 bytes `Key::from` requires.
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Encrypted, HTTP-only cookie sessions living `session_ttl_hours`.
pub fn session_middleware(auth: &AuthConfig) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), session_key(&auth.session_secret))
        .cookie_name(SESSION_COOKIE_NAME.to_string())
        .cookie_path("/".to_string())
        .cookie_secure(auth.cookie_secure)
        .cookie_http_only(true)
        .cookie_content_security(CookieContentSecurity::Private)
        // Lax so the cookie survives the top-level redirect back from Google.
        .cookie_same_site(SameSite::Lax)
        .session_lifecycle(
            PersistentSession::default()
                .session_ttl(actix_web::cookie::time::Duration::hours(auth.session_ttl_hours)),
        )
        .build()
}

#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Marks the session as signed in as `user_id`.
    pub fn persist_user(&self, user_id: Uuid) -> Result<(), AppError> {
        self.0.renew();
        self.0
            .insert(USER_ID_KEY, user_id.to_string())
            .map_err(|e| AppError::internal(format!("failed to persist session: {}", e)))
    }

    /// The signed-in user id, if any. A tampered or unreadable value counts as none.
    pub fn user_id(&self) -> Option<Uuid> {
        let raw = match self.0.get::<String>(USER_ID_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("failed to read session: {}", e);
                return None;
            }
        };
        match Uuid::parse_str(&raw) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("invalid user id in session cookie: {}", e);
                None
            }
        }
    }

    pub fn store_pending_oauth(&self, pending: &PendingOAuth) -> Result<(), AppError> {
        self.0
            .insert(OAUTH_STATE_KEY, pending)
            .map_err(|e| AppError::internal(format!("failed to persist oauth state: {}", e)))
    }

    /// Removes and returns the pending handshake, so a state value is usable once.
    pub fn take_pending_oauth(&self) -> Option<PendingOAuth> {
        match self.0.remove_as::<PendingOAuth>(OAUTH_STATE_KEY) {
            Some(Ok(pending)) => Some(pending),
            Some(Err(raw)) => {
                warn!("discarding unreadable oauth state: {}", raw);
                None
            }
            None => None,
        }
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(SessionContext::new) })
    }
}
