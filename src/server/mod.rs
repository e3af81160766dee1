//! HTTP API and static web UI

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::bucket::ObjectStore;
use crate::chat::{ChatService, SessionStore};
use crate::config::RagConfig;

pub mod routes;

/// Server state
pub struct AppState {
    pub chat: ChatService,
    pub sessions: SessionStore,
    pub store: Arc<dyn ObjectStore>,
    pub config: RagConfig,
    /// Held while a re-index runs so concurrent requests queue up
    pub reindexing: Mutex<()>,
}

impl AppState {
    pub fn new(chat: ChatService, store: Arc<dyn ObjectStore>, config: RagConfig) -> Self {
        Self {
            chat,
            sessions: SessionStore::new(config.server.max_sessions),
            store,
            config,
            reindexing: Mutex::new(()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let ui_dir = state.config.server.ui_dir.clone();

    Router::new()
        .route("/healthz", get(routes::health))
        .route("/api/info", get(routes::info))
        .route("/api/documents", get(routes::documents))
        .route("/api/search", get(routes::search))
        .route("/api/chat", post(routes::chat))
        .route("/api/sessions/{id}", get(routes::session))
        .route("/api/reindex", post(routes::reindex))
        .fallback_service(ServeDir::new(ui_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let port = state.config.server.port;
    let app = router(Arc::new(state));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);
    println!("🌍 Chat UI running at http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
