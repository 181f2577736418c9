mod config;
mod handlers;
mod models;
mod rating;
mod services;
mod workers;

use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post, put},
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
use crate::services::review_service::ReviewService;
use crate::workers::StatsRefresher;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_logging(LogConfig::from_env("review-service")?)?;

    info!("Starting Review Service...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let db_pool = shared::database::connect(&config.database).await?;
    info!("Database connection pool established");

    shared::database::migrate(&db_pool).await?;
    info!("Database migrations completed");

    let mailer = Arc::new(Mailer::new(&config.email)?);
    info!("Mailer initialized");

    let review_service = Arc::new(ReviewService::new(
        config.reviews.clone(),
        db_pool.clone(),
        mailer,
    ));

    let refresher = StatsRefresher::new(
        review_service.clone(),
        config.reviews.stats_refresh_interval_seconds,
    );
    tokio::spawn(async move {
        refresher.run().await;
    });

    let jwt = Arc::new(JwtKeys::new(config.jwt.clone()));

    let app_state = Arc::new(AppState {
        db_pool,
        review_service,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/artists/:artist_id/reviews",
            get(handlers::reviews::artist_reviews),
        )
        .route(
            "/api/v1/reviews/public/:token",
            get(handlers::requests::get_public_request)
                .post(handlers::requests::submit_public_review),
        )
        .route("/api/v1/event-types", get(handlers::reviews::event_types));

    let authenticated = Router::new()
        .route("/api/v1/reviews", post(handlers::reviews::leave_review))
        .route("/api/v1/reviews/mine", get(handlers::reviews::my_reviews))
        .route(
            "/api/v1/review-requests",
            post(handlers::requests::request_review),
        )
        .route(
            "/api/v1/reviews/:review_id/response",
            post(handlers::reviews::respond),
        )
        .route(
            "/api/v1/reviews/:review_id/helpful",
            post(handlers::reviews::mark_helpful),
        )
        .route(
            "/api/v1/review-responses/:response_id",
            put(handlers::reviews::edit_response),
        )
        .route_layer(middleware::from_fn_with_state(jwt.clone(), require_auth));

    let admin = Router::new()
        .route(
            "/api/v1/admin/reviews/refresh-statistics",
            post(handlers::admin::refresh_statistics),
        )
        .route(
            "/api/v1/admin/reviews/:review_id",
            put(handlers::admin::moderate),
        )
        .route_layer(middleware::from_fn_with_state(jwt, require_staff));

    let app = public
        .merge(authenticated)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = config.server.bind_address();
    info!("Review Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub review_service: Arc<ReviewService>,
}
