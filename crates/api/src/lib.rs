//! HTTP API server for the BookNest checkout engine.
//!
//! Exposes the checkout and order history endpoints with structured
//! logging (tracing) and Prometheus metrics. Identity verification is
//! an external collaborator consumed behind the
//! [`auth::IdentityVerifier`] trait.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::CheckoutCoordinator;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::OrderHistoryProjector;
use store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::IdentityVerifier;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::checkout::<S>))
        .route("/orders/history", get(routes::orders::history::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given store and verifier.
pub fn create_state<S: OrderStore + Clone + 'static>(
    store: S,
    verifier: Arc<dyn IdentityVerifier>,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        coordinator: CheckoutCoordinator::new(store.clone()),
        projector: OrderHistoryProjector::new(store),
        verifier,
    })
}
