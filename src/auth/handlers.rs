use actix_web::http::header::{ContentType, LOCATION};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::session::SessionContext;
use crate::error::AppError;
use crate::AppState;

/// Keys the front end reads the Google sign-in result from.
pub const TOKEN_STORAGE_KEY: &str = "miCommunityAuthToken";
pub const USERNAME_STORAGE_KEY: &str = "miCommunityUsername";

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received registration request for username: {}", req.username);
    match state.auth_service.register(&req.username, &req.email, &req.password).await {
        Ok(_) => Ok(HttpResponse::Created().json(MessageResponse::new(
            "Registration successful! You can now log in.",
        ))),
        Err(e) => {
            warn!("Registration failed for username: {}: {}", req.username, e);
            Err(e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub username: String,
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for email: {}", req.email);
    match state.auth_service.authenticate(&req.email, &req.password).await {
        Ok(signed_in) => {
            info!("Login successful for email: {}", req.email);
            Ok(HttpResponse::Ok().json(LoginResponse {
                message: "Login successful.".to_string(),
                token: signed_in.token,
                username: signed_in.user.username,
            }))
        }
        Err(e) => {
            warn!("Login failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

fn redirect_to(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, location.to_string()))
        .finish()
}

/// Redirects to Google's consent screen.
pub async fn google_start(
    session: SessionContext,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(google) = state.google.as_ref() else {
        warn!("Google sign-in requested but not configured");
        return Ok(redirect_to(&state.config.google.failure_redirect));
    };

    let (auth_url, pending) = google.authorize_url();
    session.store_pending_oauth(&pending)?;
    Ok(redirect_to(&auth_url))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Finishes Google sign-in. Every failure ends on the configured failure page.
pub async fn google_callback(
    query: web::Query<OAuthCallbackQuery>,
    session: SessionContext,
    state: web::Data<AppState>,
) -> HttpResponse {
    let failure = &state.config.google.failure_redirect;

    match complete_google_sign_in(&query, &session, &state).await {
        Ok(page) => HttpResponse::Ok().content_type(ContentType::html()).body(page),
        Err(e) => {
            match &e {
                AppError::AuthError(_) | AppError::ValidationError(_) => {
                    warn!("Google sign-in rejected: {}", e)
                }
                _ => error!("Google sign-in failed: {}", e),
            }
            redirect_to(failure)
        }
    }
}

async fn complete_google_sign_in(
    query: &OAuthCallbackQuery,
    session: &SessionContext,
    state: &AppState,
) -> Result<String, AppError> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::validation("Google sign-in is not configured"))?;

    // Taken before anything else so a state value is only ever good for one attempt.
    let pending = session.take_pending_oauth();

    if let Some(provider_error) = &query.error {
        return Err(AppError::validation(format!("provider returned error: {}", provider_error)));
    }
    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::validation("callback is missing the authorization code"))?;
    let pending = pending.ok_or_else(|| AppError::validation("no OAuth handshake in progress"))?;
    if query.state.as_deref() != Some(pending.csrf_state.as_str()) {
        return Err(AppError::validation("OAuth state mismatch"));
    }

    let profile = google.exchange_code(code, pending.pkce_verifier).await?;
    let signed_in = state.auth_service.sign_in_external(&profile).await?;
    session.persist_user(signed_in.user.id)?;
    info!("Google sign-in successful for {}", signed_in.user.username);

    Ok(token_handoff_page(
        &signed_in.token,
        &signed_in.user.username,
        &state.config.google.success_redirect,
    ))
}

/// JSON string literal that is also safe inside a `<script>` element.
fn script_literal(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

/// Page that stores the token client-side and moves on to the home route.
pub fn token_handoff_page(token: &str, username: &str, home: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"></head><body>\n<script>\n\
         localStorage.setItem({}, {});\n\
         localStorage.setItem({}, {});\n\
         window.location.href = {};\n\
         </script>\n</body></html>\n",
        script_literal(TOKEN_STORAGE_KEY),
        script_literal(token),
        script_literal(USERNAME_STORAGE_KEY),
        script_literal(username),
        script_literal(home),
    )
}
