//! Product Copy API Library
//!
//! Product catalogue backend: CRUD over products plus AI-generated marketing descriptions.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod generation;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{extract::FromRef, routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::generation::DescriptionGenerator;
use crate::metrics::MetricsRegistry;

/// Shared state handed to every handler. Cloning only bumps reference counts.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub services: handlers::AppServices,
    pub metrics: Arc<MetricsRegistry>,
}

impl AppState {
    /// Wires the services over an existing pool and generator
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        generator: Arc<dyn DescriptionGenerator>,
    ) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let access = db::DatabaseAccess::new(db.clone(), metrics.clone());
        Self {
            db,
            config: Arc::new(config),
            services: handlers::AppServices::new(access, generator, metrics.clone()),
            metrics,
        }
    }
}

impl FromRef<AppState> for Arc<MetricsRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// `/api/products/...`, instrumented with per-route HTTP metrics
pub fn api_routes(registry: Arc<MetricsRegistry>) -> Router<AppState> {
    Router::new()
        .nest("/products", handlers::products::products_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            registry,
            metrics::track_http_metrics,
        ))
}

/// Full application router: API, health probes, metrics and API docs.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes(state.metrics.clone()))
        .nest("/health", handlers::health::health_routes())
        .route("/metrics", get(metrics::metrics_handler))
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
