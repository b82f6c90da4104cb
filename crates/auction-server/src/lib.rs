// HTTP API for the auction: teams, players, the sale endpoint, accounts and
// dashboard stats, plus uploaded images and the static front end.

pub mod handlers;
pub mod models;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{any, delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use auction_core::config::Config;
use auction_core::db::Database;

/// Largest accepted request body (image uploads).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across handlers.
pub struct AppState {
    pub db: Arc<Database>,
    pub uploads_dir: PathBuf,
    /// Base URL used to build links to uploaded files.
    pub public_url: String,
}

pub struct ApiServer {
    bind_addr: SocketAddr,
    enable_cors: bool,
    public_dir: PathBuf,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: &Config, db: Database) -> Self {
        let state = Arc::new(AppState {
            db: Arc::new(db),
            uploads_dir: PathBuf::from(&config.storage.uploads_dir),
            public_url: config.server.public_url.clone(),
        });

        Self {
            bind_addr: config.server.bind,
            enable_cors: config.server.enable_cors,
            public_dir: PathBuf::from(&config.storage.public_dir),
            state,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Build the router with all routes.
    pub fn build_router(&self) -> Router {
        let api = Router::new()
            .route(
                "/api/teams",
                get(handlers::list_teams).post(handlers::create_team),
            )
            .route("/api/teams/{id}", delete(handlers::delete_team))
            .route(
                "/api/players",
                get(handlers::list_players).post(handlers::create_player),
            )
            .route(
                "/api/players/{id}",
                axum::routing::put(handlers::update_player).delete(handlers::delete_player),
            )
            .route("/api/auction/sell", post(handlers::sell_player))
            .route("/api/auth/signup", post(handlers::signup))
            .route("/api/auth/login", post(handlers::login))
            .route("/api/summary", get(handlers::summary))
            .route("/api/health", get(handlers::health_check))
            .route("/api/{*rest}", any(handlers::api_not_found))
            .with_state(self.state.clone());

        // Everything outside /api and /uploads is the front end, with
        // index.html standing in for client-side routes.
        let front_end = ServeDir::new(&self.public_dir)
            .fallback(ServeFile::new(self.public_dir.join("index.html")));

        let mut router = api
            .nest_service("/uploads", ServeDir::new(&self.state.uploads_dir))
            .fallback_service(front_end)
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
            .layer(TraceLayer::new_for_http());

        if self.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                    .allow_origin(Any),
            );
        }

        router
    }

    /// Start the API server.
    pub async fn start(self) -> anyhow::Result<()> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        info!("API server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {e}"))?;

        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
