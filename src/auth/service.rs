use std::sync::Arc;
use tracing::info;

use crate::auth::linker::{ExternalProfile, IdentityLinker};
use crate::auth::password::{hash_password_blocking, verify_password_blocking, MIN_PASSWORD_LENGTH};
use crate::auth::token::TokenIssuer;
use crate::db::models::User;
use crate::db::store::UserStore;
use crate::error::{AppError, AuthError, DatabaseError};

pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields.";
pub const SHORT_PASSWORD_MESSAGE: &str = "Password must be at least 6 characters.";
pub const DUPLICATE_ACCOUNT_MESSAGE: &str = "Username or email already in use.";

/// A signed-in user together with the bearer token minted for them.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub token: String,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenIssuer>,
    linker: IdentityLinker,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            linker: IdentityLinker::new(users.clone()),
            users,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        self.tokens.as_ref()
    }

    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    /// Creates a username/password account.
    ///
    /// Uniqueness is left to the store: a clash on insert becomes `Conflict`.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::validation(MISSING_FIELDS_MESSAGE));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::validation(SHORT_PASSWORD_MESSAGE));
        }

        let password_hash = hash_password_blocking(password.to_string()).await?;
        let user = User::with_password(username.to_string(), email.to_string(), password_hash);

        match self.users.create_user(&user).await {
            Ok(user) => {
                info!("Registered user {}", user.username);
                Ok(user)
            }
            Err(DatabaseError::Duplicate(_)) => {
                Err(AppError::Conflict(DUPLICATE_ACCOUNT_MESSAGE.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Checks an email/password pair and mints a token.
    ///
    /// Unknown email, Google-only account and wrong password are indistinguishable.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<SignedIn, AppError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials.into());
        }

        let user = self
            .users
            .find_user_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let matched =
            verify_password_blocking(password.to_string(), user.password_hash.clone()).await?;
        if !matched {
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.tokens.issue(&user)?;
        Ok(SignedIn { user, token })
    }

    /// Resolves a Google profile to its local account and mints a token.
    pub async fn sign_in_external(&self, profile: &ExternalProfile) -> Result<SignedIn, AppError> {
        let user = self.linker.resolve(profile).await?;
        let token = self.tokens.issue(&user)?;
        Ok(SignedIn { user, token })
    }
}
