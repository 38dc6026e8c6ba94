//! # mn-api
//!
//! The web routing and orchestration layer for Marginote: maps the core
//! contracts onto HTTP routes, issues and checks the signed cookies and
//! action links, and translates the core error taxonomy into status
//! codes.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::Duration;
use mn_core::{CommentRepo, IdentityHasher, Signer};
use tower_http::trace::TraceLayer;

/// State shared across all handler invocations.
pub struct AppState {
    pub repo: Arc<dyn CommentRepo>,
    pub signer: Signer,
    pub hasher: IdentityHasher,
    pub policy: Policy,
}

/// The externally configured knobs the handlers consult.
#[derive(Debug, Clone)]
pub struct Policy {
    pub moderation_enabled: bool,
    pub ownership_window: Duration,
    pub latest_enabled: bool,
}

/// Configures the routes for the comment API.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/new", post(handlers::new_comment))
        .route("/", get(handlers::fetch))
        .route("/count", post(handlers::count))
        .route("/latest", get(handlers::latest))
        .route(
            "/id/{id}",
            get(handlers::view)
                .put(handlers::edit)
                .delete(handlers::remove),
        )
        .route("/id/{id}/like", post(handlers::like))
        .route("/id/{id}/dislike", post(handlers::dislike))
        .route(
            "/id/{id}/unsubscribe/{email}/{token}",
            get(handlers::unsubscribe),
        )
        .route("/id/{id}/{action}/{token}", post(handlers::moderate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
