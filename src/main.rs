//! Tulen Backend
//!
//! Peer tutor matching: students post study requests inside bubbles, get a ranked list of
//! fellow students who can teach the skill, and take a request through to a rated session.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod lifecycle;
mod matching;
mod models;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use lifecycle::LifecycleManager;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub lifecycle: Arc<LifecycleManager>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tulen Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (TULEN_API_PSK). Authentication is disabled!");
    }

    let pool = db::init_database(&config.db_path).await?;

    let repo = Arc::new(Repository::new(pool));

    let state = AppState {
        lifecycle: Arc::new(LifecycleManager::new(repo.pool().clone())),
        repo,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
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

    let api_routes = Router::new()
        // Directory
        .route("/users", post(api::create_user))
        .route(
            "/user/profile",
            get(api::get_profile).put(api::update_profile),
        )
        // Skills
        .route("/skills", get(api::list_skills).post(api::create_skill))
        // Bubbles
        .route("/bubbles", get(api::list_bubbles).post(api::create_bubble))
        .route("/bubbles/leave", post(api::leave_bubble))
        .route("/bubbles/{id}", get(api::get_bubble))
        .route("/bubbles/{id}/skills", get(api::list_bubble_skills))
        .route("/bubbles/{id}/requests", get(api::list_bubble_requests))
        .route("/bubbles/{id}/join", post(api::join_bubble))
        // Study requests
        .route("/study-requests", post(api::create_request))
        .route("/study-requests/{id}", delete(api::delete_request))
        .route("/study-requests/{id}/cancel", post(api::cancel_request))
        .route("/study-requests/{id}/respond", post(api::respond_to_request))
        .route("/my-requests", get(api::list_my_requests))
        .route("/potential-matches/{id}", get(api::potential_matches))
        // Matches
        .route("/matches/{id}", get(api::list_matches))
        .route("/matches/{id}/accept", post(api::select_teacher))
        .route("/matches/{id}/complete", post(api::complete_match))
        .route("/matches/{id}/cancel", post(api::cancel_match))
        // Notifications
        .route("/notifications", get(api::list_notifications))
        .route("/notifications/read", put(api::mark_notifications_read))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
