use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod guard;
pub mod models;
pub mod progress;
pub mod response;
mod routes;
pub mod statistics;
pub mod store;

use catalog::Catalog;
use progress::ProgressRecorder;
use statistics::StatisticsAggregator;
use store::Store;

/// Shared handler state. Every component holds the same injected store.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub progress: ProgressRecorder,
    pub statistics: StatisticsAggregator,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            progress: ProgressRecorder::new(store.clone()),
            statistics: StatisticsAggregator::new(store),
        }
    }
}

/// Full application router: health check plus every operation under `/{api_prefix}`.
pub fn app(state: AppState, api_prefix: &str) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest(&format!("/{api_prefix}"), routes::router(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}
