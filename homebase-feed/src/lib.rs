//! homebase-feed library - upstream aircraft feed proxy
//!
//! Serves one canonical aircraft feed regardless of which upstream answered:
//! local receiver mirrors first, the remote aggregator as fallback.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod normalize;
pub mod response;
pub mod schema;
pub mod selector;

use config::FeedConfig;
use fetcher::SourceFetcher;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Immutable after startup
    pub config: Arc<FeedConfig>,
    /// Upstream retrieval (pooled HTTP client in production)
    pub fetcher: Arc<dyn SourceFetcher>,
}

impl AppState {
    pub fn new(config: FeedConfig, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
        }
    }
}

/// Build application router
///
/// `/health` is public; `/api/feed` sits behind the role gate.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    let protected = Router::new()
        .route("/api/feed", get(api::get_feed))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::role_middleware,
        ));

    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
