//! Cartwheel API library.
//!
//! The HTTP backend for the Cartwheel catalog, carts and checkout, exposed as
//! a library so the binary, the CLI and the integration tests share one
//! router and one storage layer.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, extract::Request, middleware::from_fn};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router with its middleware stack.
///
/// Layers run outermost first: Sentry hub and transaction, request span,
/// then request id (which records into that span).
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(sentry_tower::NewSentryLayer::new_from_top())
                .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request| {
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = tracing::field::Empty,
                            user_id = tracing::field::Empty,
                        )
                    }),
                )
                .layer(from_fn(middleware::request_id_middleware)),
        )
}
