//! Leakdrop Public API Backend
//!
//! Serves the public projection of a Leakdrop node (settings, contexts with
//! their questionnaires, receivers) from SQLite, takes submissions in and
//! notifies receivers about new tips.

mod api;
mod auth;
mod cache;
mod config;
mod db;
mod errors;
mod jobs;
mod l10n;
mod models;
mod public;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::ApiCache;
use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub cache: ApiCache,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Leakdrop Public API Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!(
            "No API PSK configured (LEAKDROP_API_PSK). Internal endpoints are unprotected!"
        );
    }
    if config.devel_mode {
        tracing::warn!("Running in development mode");
    }

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));
    let config = Arc::new(config);

    jobs::spawn_runner(Arc::clone(&repo), Arc::clone(&config));
    tracing::info!(
        "Notification jobs scheduled every {:?}",
        config.notification_interval
    );

    let state = AppState {
        repo,
        cache: ApiCache::new(),
        config: Arc::clone(&config),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let internal_routes = Router::new()
        .route("/cache/invalidate", post(api::invalidate_cache))
        .route("/jobs/notification", post(api::run_notification_jobs))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    let public_routes = Router::new()
        .route("/api/public", get(api::get_public_resources))
        .route("/api/submission", post(api::create_submission))
        .route("/description.json", get(api::get_ahmia_description))
        .route("/robots.txt", get(api::get_robots_txt))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::transport_security_layer,
        ));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api/internal", internal_routes)
        .merge(public_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
