//! Google OAuth 2.0 sign-in.
//!
//! Authorization Code flow with PKCE. [`GoogleOAuth::authorize_url`] builds the
//! consent-screen URL (`profile` and `email` scopes) together with the CSRF
//! state and PKCE verifier that the caller keeps in the session.
//! [`GoogleOAuth::exchange_code`] trades the returned code for an access token
//! and reads the profile from the userinfo endpoint.

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;

use crate::auth::linker::ExternalProfile;
use crate::auth::session::PendingOAuth;
use crate::config::GoogleConfig;
use crate::error::AppError;

/// Google user info from the v2 userinfo API.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    verified_email: bool,
    name: Option<String>,
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

pub struct GoogleOAuth {
    client: ConfiguredClient,
    http_client: reqwest::Client,
    userinfo_url: String,
}

impl GoogleOAuth {
    pub fn new(config: &GoogleConfig) -> Result<Self, AppError> {
        let invalid = |field: &str, e: oauth2::url::ParseError| {
            AppError::ConfigError(format!("google.{} is not a valid URL: {}", field, e))
        };

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(config.auth_url.clone()).map_err(|e| invalid("auth_url", e))?)
            .set_token_uri(
                TokenUrl::new(config.token_url.clone()).map_err(|e| invalid("token_url", e))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_url.clone())
                    .map_err(|e| invalid("redirect_url", e))?,
            );

        // The token endpoint must not be allowed to bounce us elsewhere.
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::internal(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            http_client,
            userinfo_url: config.userinfo_url.clone(),
        })
    }

    /// Consent-screen URL plus the handshake state to keep until the callback.
    pub fn authorize_url(&self) -> (String, PendingOAuth) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("profile".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        let pending = PendingOAuth {
            csrf_state: csrf_state.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        };
        (auth_url.to_string(), pending)
    }

    /// Exchange an authorization code for the signed-in Google profile.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: String,
    ) -> Result<ExternalProfile, AppError> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::external(format!("Token exchange failed: {}", e)))?;

        let access_token = token_result.access_token().secret();

        let google_user: GoogleUser = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| AppError::external(format!("Userinfo request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::external(format!("Userinfo response unreadable: {}", e)))?;

        let email = google_user
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| AppError::external("Google profile has no email address"))?;

        Ok(ExternalProfile {
            external_id: google_user.id,
            email,
            email_verified: google_user.verified_email,
            display_name: google_user.name,
        })
    }
}
