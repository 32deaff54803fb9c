#![forbid(unsafe_code)]

//! HTTP front end of the medication tracker.
//!
//! Maps REST verbs under `/api/` onto per-user key-value operations.
//! The server keeps no state between requests beyond the store handle.

pub mod error;
pub mod extract;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use medtrack_core::KvStore;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub fallback_user_id: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            fallback_user_id: None,
        }
    }

    pub fn with_fallback_user(mut self, user_id: Option<String>) -> Self {
        self.fallback_user_id = user_id;
        self
    }
}

/// Build the API router with every endpoint under `/api/` and CORS open to any origin.
pub fn api_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/data", get(handlers::get_data))
        .route("/medications", post(handlers::save_medications))
        // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
        .route("/medication/:id", delete(handlers::delete_medication))
        .route(
            "/entry",
            post(handlers::record_dose)
                .put(handlers::update_dose)
                .delete(handlers::clear_dose),
        )
        .fallback(handlers::not_found)
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .fallback(handlers::not_found)
        .layer(CorsLayer::permissive())
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Medication tracker API listening on http://{}/api", addr);
    axum::serve(listener, api_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
