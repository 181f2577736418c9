mod config;
mod handlers;
mod models;
mod processing;
mod services;
mod storage;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use shared::auth::{require_auth, require_staff, JwtKeys};
use shared::observability::{init_logging, LogConfig};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::processing::FfmpegProcessor;
use crate::services::media_service::MediaService;
use crate::storage::LocalStorage;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_logging(LogConfig::from_env("media-service")?)?;

    info!("Starting Media Service...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let db_pool = shared::database::connect(&config.database).await?;
    info!("Database connection pool established");

    shared::database::migrate(&db_pool).await?;
    info!("Database migrations completed");

    tokio::fs::create_dir_all(&config.media.root).await?;
    info!("Media root: {:?}", config.media.root);

    let processor = FfmpegProcessor::new(&config.media);
    if let Err(e) = processor.ensure_watermark().await {
        warn!("Video watermark unavailable: {}", e);
    }

    let storage = LocalStorage::new(config.media.root.clone());
    let jwt = Arc::new(JwtKeys::new(config.jwt.clone()));

    let app_state = Arc::new(AppState {
        media_service: MediaService::new(
            config.media.clone(),
            db_pool.clone(),
            storage,
            Arc::new(processor),
        ),
        db_pool,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/artists/:artist_id/portfolio",
            get(handlers::media::portfolio),
        )
        .nest_service("/media", ServeDir::new(&config.media.root));

    let artist = Router::new()
        .route("/api/v1/media", get(handlers::media::list_mine))
        .route("/api/v1/media/quota", get(handlers::media::quota))
        .route("/api/v1/media/stats", get(handlers::media::stats))
        .route("/api/v1/media/bulk", post(handlers::media::bulk))
        .route(
            "/api/v1/media/upload/:kind",
            post(handlers::media::upload).layer(
                ServiceBuilder::new()
                    .layer(RequestBodyLimitLayer::new(config.media.max_request_bytes()))
                    .layer(DefaultBodyLimit::disable()),
            ),
        )
        .route(
            "/api/v1/media/:media_id",
            get(handlers::media::get_mine)
                .put(handlers::media::update)
                .delete(handlers::media::delete),
        )
        .route_layer(middleware::from_fn_with_state(jwt.clone(), require_auth));

    let admin = Router::new()
        .route(
            "/api/v1/admin/media/reset-order",
            post(handlers::admin::reset_order),
        )
        .route_layer(middleware::from_fn_with_state(jwt, require_staff));

    let app = public
        .merge(artist)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = config.server.bind_address();
    info!("Media Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub media_service: MediaService,
}
