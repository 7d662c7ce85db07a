#![allow(dead_code)]

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web, App, HttpResponse};
use micommunity_server::auth::session::SESSION_COOKIE_NAME;
use micommunity_server::auth::{session_middleware, SessionContext};
use micommunity_server::config::AuthConfig;
use micommunity_server::db::MemoryStore;
use micommunity_server::{AppError, AppState, Settings};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Builds the full application (session middleware and every route) around `state`.
macro_rules! init_app {
    ($state:expr) => {{
        let state = $state.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(micommunity_server::auth::session_middleware(&state.config.auth))
                .app_data(state)
                .configure(micommunity_server::routes),
        )
        .await
    }};
}

pub fn state_with(
    store: Arc<MemoryStore>,
    configure: impl FnOnce(&mut Settings),
) -> web::Data<AppState> {
    let mut config = Settings::new_for_test().expect("Failed to load test config");
    configure(&mut config);
    let state = AppState::with_stores(config, store.clone(), store).expect("Failed to build state");
    web::Data::new(state)
}

pub fn test_state() -> web::Data<AppState> {
    state_with(Arc::new(MemoryStore::new()), |_| {})
}

pub async fn register<S, B>(app: &S, username: &str, email: &str, password: &str) -> ServiceResponse<B>
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({ "username": username, "email": email, "password": password }))
        .send_request(app)
        .await
}

pub async fn login<S, B>(app: &S, email: &str, password: &str) -> ServiceResponse<B>
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": email, "password": password }))
        .send_request(app)
        .await
}

/// Registers a user, logs in, and returns the bearer token.
pub async fn token_for<S, B>(app: &S, username: &str, email: &str, password: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = register(app, username, email, password).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = login(app, email, password).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    body["token"].as_str().expect("token in login response").to_string()
}

/// Reads the single post and returns its id.
pub async fn post_id<S, B>(app: &S) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = test::TestRequest::get().uri("/posts/single").send_request(app).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    body["_id"].as_str().expect("post id").to_string()
}

pub fn session_cookie<B>(res: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
        .map(|cookie| cookie.into_owned())
}

/// A session cookie signed in as `user_id`, minted by a bare app sharing the session secret.
pub async fn signed_in_cookie(auth: &AuthConfig, user_id: Uuid) -> Cookie<'static> {
    let app = test::init_service(App::new().wrap(session_middleware(auth)).route(
        "/sign-in",
        web::get().to(move |session: SessionContext| async move {
            session.persist_user(user_id)?;
            Ok::<_, AppError>(HttpResponse::Ok().finish())
        }),
    ))
    .await;

    let res = test::TestRequest::get().uri("/sign-in").send_request(&app).await;
    assert_eq!(res.status(), StatusCode::OK);
    session_cookie(&res).expect("session cookie")
}
