//! Caller identification for protected routes.
//!
//! A bearer token, when sent, decides the outcome on its own: a bad token is
//! rejected even if the request also carries a signed-in session. Without a
//! token the session cookie is consulted, and the user it names is loaded.

use actix_session::Session;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::warn;
use uuid::Uuid;

use crate::auth::session::SessionContext;
use crate::auth::token::TokenIssuer;
use crate::db::store::UserStore;
use crate::error::{AppError, AuthError};
use crate::AppState;

/// The caller behind a request that passed the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
}

/// The token from an `Authorization: Bearer <token>` header, if there is one.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

pub async fn identify(
    tokens: &TokenIssuer,
    users: &dyn UserStore,
    bearer: Option<&str>,
    session_user: Option<Uuid>,
) -> Result<AuthenticatedUser, AppError> {
    if let Some(token) = bearer {
        let identity = tokens.verify(token).map_err(|e| {
            warn!("Rejected bearer token: {:?}", e);
            e
        })?;
        return Ok(AuthenticatedUser {
            user_id: identity.user_id,
            username: identity.username,
        });
    }

    if let Some(user_id) = session_user {
        match users.find_user_by_id(user_id).await? {
            Some(user) => {
                return Ok(AuthenticatedUser {
                    user_id: user.id,
                    username: user.username,
                })
            }
            None => warn!("Session names unknown user {}", user_id),
        }
    }

    Err(AuthError::MissingCredentials.into())
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let bearer = bearer_token(req).map(str::to_owned);
        let session = Session::from_request(req, payload);

        Box::pin(async move {
            let state = state.ok_or_else(|| AppError::internal("application state is not registered"))?;
            let session_user = match session.await {
                Ok(session) => SessionContext::new(session).user_id(),
                Err(e) => {
                    warn!("Session unavailable: {}", e);
                    None
                }
            };
            let auth = &state.auth_service;
            identify(auth.tokens(), auth.users(), bearer.as_deref(), session_user).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::models::User;
    use actix_web::test::TestRequest;
    use chrono::Duration;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test_secret", Duration::hours(1))
    }

    async fn store_with_alice() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let alice = store
            .create_user(&User::with_password(
                "alice".to_string(),
                "alice@x.com".to_string(),
                "hash".to_string(),
            ))
            .await
            .unwrap();
        (store, alice)
    }

    #[test]
    fn test_bearer_token_parsing() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "bearer abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default().insert_header((AUTHORIZATION, "Bearer ")).to_http_request();
        assert_eq!(bearer_token(&req), None);

        assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
    }

    #[tokio::test]
    async fn test_valid_bearer_token() {
        let (store, alice) = store_with_alice().await;
        let tokens = issuer();
        let token = tokens.issue(&alice).unwrap();

        let caller = identify(&tokens, &store, Some(&token), None).await.unwrap();
        assert_eq!(caller.user_id, alice.id);
        assert_eq!(caller.username, "alice");
    }

    #[tokio::test]
    async fn test_bad_token_does_not_fall_back_to_session() {
        let (store, alice) = store_with_alice().await;

        let result = identify(&issuer(), &store, Some("forged"), Some(alice.id)).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::InvalidToken))));
    }

    #[tokio::test]
    async fn test_session_user_is_loaded() {
        let (store, alice) = store_with_alice().await;

        let caller = identify(&issuer(), &store, None, Some(alice.id)).await.unwrap();
        assert_eq!(caller.user_id, alice.id);
        assert_eq!(caller.username, "alice");
    }

    #[tokio::test]
    async fn test_session_for_unknown_user_is_rejected() {
        let (store, _) = store_with_alice().await;

        let result = identify(&issuer(), &store, None, Some(Uuid::new_v4())).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::MissingCredentials))));
    }

    #[tokio::test]
    async fn test_no_credentials() {
        let (store, _) = store_with_alice().await;

        let result = identify(&issuer(), &store, None, None).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::MissingCredentials))));
    }
}
