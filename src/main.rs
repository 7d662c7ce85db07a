use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use micommunity_server::auth::session_middleware;
use micommunity_server::config::{CorsConfig, DEV_JWT_SECRET, DEV_SESSION_SECRET};
use micommunity_server::{routes, AppState, Settings};
use std::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn build_cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
            .supports_credentials()
    };

    cors.max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new()
        .context("failed to load configuration (is APP_DATABASE__URL set?)")?;
    info!("Configuration loaded successfully");

    if config.auth.jwt_secret == DEV_JWT_SECRET {
        warn!("auth.jwt_secret is the development default; set APP_AUTH__JWT_SECRET");
    }
    if config.auth.session_secret == DEV_SESSION_SECRET {
        warn!("auth.session_secret is the development default; set APP_AUTH__SESSION_SECRET");
    }

    let (state, db) = AppState::new(config.clone())
        .await
        .context("failed to initialise application state")?;
    let state = web::Data::new(state);

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Server is running on http://{}:{}", config.server.host, config.server.port);

    let server_config = config.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(session_middleware(&server_config.auth))
            .wrap(build_cors(&server_config.cors))
            .app_data(state.clone())
            .configure(routes)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await?;

    db.close().await;
    info!("Server stopped");
    Ok(())
}
