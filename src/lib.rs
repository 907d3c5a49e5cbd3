//! HTTP backend for the Ješenca-Požeg Community Center website: events,
//! gallery images, contact messages and the center's static info.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use config::Config;
use db::Database;
use error::AppError;
use state::AppState;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Any origin, method and header, with credentials. Wildcards are not allowed
/// alongside credentials, so the request's own values are echoed back.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/test", get(handlers::diagnostics))
        .route("/api/info", get(handlers::get_center_info))
        .route(
            "/api/events",
            get(handlers::list_events).post(handlers::create_event),
        )
        .route(
            "/api/gallery",
            get(handlers::get_gallery).post(handlers::add_image),
        )
        .route("/api/contact", post(handlers::send_message))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Opens the document store when both the connection string and the database
/// name are configured. Without them the service runs storage-less.
pub async fn open_storage(config: &Config) -> Result<Option<Database>, AppError> {
    match (&config.database_url, &config.database_name) {
        (Some(url), Some(name)) => {
            let db = Database::connect(url, name).await?;
            tracing::info!(database = %name, "document store ready");
            Ok(Some(db))
        }
        _ => {
            tracing::warn!("DATABASE_URL or DATABASE_NAME not set, running without storage");
            Ok(None)
        }
    }
}
