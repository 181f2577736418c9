mod auth;
mod config;
mod handlers;
mod models;
mod services;

use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use shared::auth::{require_auth, require_staff, JwtKeys};
use shared::mailer::Mailer;
use shared::observability::{init_logging, LogConfig};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::Config;
use crate::services::user_service::UserService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_logging(LogConfig::from_env("user-service")?)?;

    info!("Starting User Service...");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let db_pool = shared::database::connect(&config.database).await?;
    info!("Database connection pool established");

    shared::database::migrate(&db_pool).await?;
    info!("Database migrations completed");

    // Redis holds sessions and one-time tokens
    let redis_conn = shared::database::connect_redis(&config.redis).await?;
    info!("Redis connection established");

    let jwt = Arc::new(JwtKeys::new(config.jwt.clone()));
    let mailer = Arc::new(Mailer::new(&config.email)?);

    let user_service = Arc::new(UserService::new(
        config.clone(),
        db_pool.clone(),
        redis_conn,
        jwt.clone(),
        mailer,
    ));
    info!("User service initialized");

    let app_state = Arc::new(AppState {
        db_pool,
        user_service,
    });

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/auth/register/artist", post(handlers::auth::register_artist))
        .route("/api/v1/auth/register/organizer", post(handlers::auth::register_organizer))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh_token))
        .route("/api/v1/auth/verify-email", post(handlers::auth::verify_email))
        .route("/api/v1/auth/verify-email/:token", get(handlers::auth::verify_email_link))
        .route("/api/v1/auth/forgot-password", post(handlers::auth::forgot_password))
        .route("/api/v1/auth/reset-password", post(handlers::auth::reset_password))
        .route("/api/v1/organizers/:organizer_id", get(handlers::profile::get_organizer));

    let authenticated = Router::new()
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/auth/resend-verification", post(handlers::auth::resend_verification))
        .route("/api/v1/auth/change-password", post(handlers::auth::change_password))
        .route(
            "/api/v1/profile",
            get(handlers::profile::get_profile).put(handlers::profile::update_profile),
        )
        .route_layer(middleware::from_fn_with_state(jwt.clone(), require_auth));

    let admin = Router::new()
        .route("/api/v1/admin/users", get(handlers::admin::list_users))
        .route("/api/v1/admin/users/:user_id", get(handlers::admin::get_user))
        .route("/api/v1/admin/users/:user_id/suspend", post(handlers::admin::suspend_user))
        .route("/api/v1/admin/users/:user_id/activate", post(handlers::admin::activate_user))
        .route(
            "/api/v1/admin/users/:user_id/verify-email",
            post(handlers::admin::verify_user_email),
        )
        .route_layer(middleware::from_fn_with_state(jwt, require_staff));

    let app = public
        .merge(authenticated)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let addr = config.server.bind_address();
    info!("User Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub user_service: Arc<UserService>,
}
