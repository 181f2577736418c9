mod catalog;
mod config;
mod handlers;
mod models;
mod search;
mod services;

use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use shared::auth::{optional_auth, require_auth, require_staff, JwtKeys};
use shared::observability::{init_logging, LogConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::Config;
use crate::services::{artist_service::ArtistService, reference_service::ReferenceService};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_logging(LogConfig::from_env("artist-service")?)?;

    info!("Starting Artist Service...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let db_pool = shared::database::connect(&config.database).await?;
    info!("Database connection pool established");

    shared::database::migrate(&db_pool).await?;
    info!("Database migrations completed");

    let jwt = Arc::new(JwtKeys::new(config.jwt.clone()));

    let app_state = Arc::new(AppState {
        artist_service: ArtistService::new(config.catalog.clone(), db_pool.clone()),
        reference_service: ReferenceService::new(db_pool.clone()),
        db_pool,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Browsing works anonymously; a valid token only enriches tracking.
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/artists", get(handlers::artists::list_artists))
        .route("/api/v1/artists/search", get(handlers::artists::search_artists))
        .route("/api/v1/artists/quick-search", get(handlers::artists::quick_search))
        .route("/api/v1/artists/:artist_id", get(handlers::artists::get_artist))
        .route(
            "/api/v1/artists/:artist_id/whatsapp",
            get(handlers::whatsapp::contact_page).post(handlers::whatsapp::contact),
        )
        .route("/api/v1/genres", get(handlers::reference::list_genres))
        .route("/api/v1/roles", get(handlers::reference::list_roles))
        .route("/api/v1/instruments", get(handlers::reference::list_instruments))
        .route("/api/v1/locations", get(handlers::reference::list_locations))
        .route_layer(middleware::from_fn_with_state(jwt.clone(), optional_auth));

    let artist = Router::new()
        .route("/api/v1/artist-profile/tags", get(handlers::artists::my_tags))
        .route("/api/v1/artist-profile/genres", put(handlers::artists::set_my_genres))
        .route("/api/v1/artist-profile/roles", put(handlers::artists::set_my_roles))
        .route("/api/v1/artist-profile/instruments", put(handlers::artists::set_my_instruments))
        .route("/api/v1/artist-profile/whatsapp-stats", get(handlers::whatsapp::stats))
        .route_layer(middleware::from_fn_with_state(jwt.clone(), require_auth));

    let admin = Router::new()
        .route("/api/v1/admin/genres", post(handlers::reference::create_genre))
        .route("/api/v1/admin/genres/:id", put(handlers::reference::update_genre))
        .route("/api/v1/admin/roles", post(handlers::reference::create_role))
        .route("/api/v1/admin/roles/:id", put(handlers::reference::update_role))
        .route("/api/v1/admin/instruments", post(handlers::reference::create_instrument))
        .route("/api/v1/admin/instruments/:id", put(handlers::reference::update_instrument))
        .route_layer(middleware::from_fn_with_state(jwt, require_staff));

    let app = public
        .merge(artist)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = config.server.bind_address();
    info!("Artist Service listening on {}", addr);

    // Client addresses are needed for view and click tracking.
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub artist_service: ArtistService,
    pub reference_service: ReferenceService,
}
