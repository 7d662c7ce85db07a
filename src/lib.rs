pub mod auth;
pub mod config;
pub mod db;
pub mod discussion;
pub mod error;

use std::sync::Arc;
use std::time::Duration;
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use tracing::{info, warn};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, AuthenticatedUser, GoogleOAuth, TokenIssuer};
pub use db::{DbOperations, DiscussionStore, UserStore};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub discussion: Arc<dyn DiscussionStore>,
    pub auth_service: Arc<AuthService>,
    /// `None` when no Google client credentials are configured.
    pub google: Option<Arc<GoogleOAuth>>,
}

impl AppState {
    /// Connects to Postgres, applies migrations and builds the services on top.
    pub async fn new(config: Settings) -> Result<(Self, DbOperations)> {
        let db = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_secs),
        )
        .await?;
        db.migrate().await?;
        info!("Connected to database");

        let store = Arc::new(db.clone());
        let state = Self::with_stores(config, store.clone(), store)?;
        Ok((state, db))
    }

    pub fn with_stores(
        config: Settings,
        users: Arc<dyn UserStore>,
        discussion: Arc<dyn DiscussionStore>,
    ) -> Result<Self> {
        let tokens = Arc::new(TokenIssuer::new(
            &config.auth.jwt_secret,
            chrono::Duration::hours(config.auth.token_expiry_hours),
        ));

        let google = if config.google.is_configured() {
            Some(Arc::new(GoogleOAuth::new(&config.google)?))
        } else {
            warn!("Google client id/secret not set; Google sign-in is disabled");
            None
        };

        Ok(Self {
            auth_service: Arc::new(AuthService::new(users, tokens)),
            discussion,
            google,
            config: Arc::new(config),
        })
    }
}

/// Malformed JSON bodies get the same `{"message": ...}` shape as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        AppError::validation(format!("Invalid request body: {}", err)).into()
    })
}

/// Registers every route. The caller wraps the app in the session middleware.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(health_check))
        .route("/auth/register", web::post().to(auth::handlers::register))
        .route("/auth/login", web::post().to(auth::handlers::login))
        .route("/auth/google", web::get().to(auth::handlers::google_start))
        .route("/auth/google/callback", web::get().to(auth::handlers::google_callback))
        .route("/posts/single", web::get().to(discussion::get_single_post))
        .route("/comments", web::post().to(discussion::post_comment))
        .route("/comments/{post_id}", web::get().to(discussion::list_comments));
}
