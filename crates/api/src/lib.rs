//! HTTP API server for the marketplace fulfillment core.
//!
//! Exposes buyer carts, purchases and vendor sales reports over REST, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use domain::{CartService, PurchaseService, SalesService, ServiceConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use store::MarketStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketStore> {
    pub carts: CartService<S>,
    pub purchases: PurchaseService<S>,
    pub sales: SalesService<S>,
}

/// Builds the services over one store handle.
pub fn create_state<S: MarketStore + Clone + 'static>(
    store: S,
    config: ServiceConfig,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        carts: CartService::with_config(store.clone(), config),
        purchases: PurchaseService::with_config(store.clone(), config),
        sales: SalesService::with_config(store, config),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/buyers/{buyer_id}/cart",
            get(routes::cart::list::<S>)
                .post(routes::cart::add::<S>)
                .put(routes::cart::update::<S>)
                .delete(routes::cart::clear::<S>),
        )
        .route(
            "/buyers/{buyer_id}/cart/{vendor_id}/{item_id}",
            delete(routes::cart::remove::<S>),
        )
        .route(
            "/buyers/{buyer_id}/purchases",
            post(routes::purchases::create::<S>),
        )
        .route("/vendors/{vendor_id}/sales", get(routes::sales::list::<S>))
        .route(
            "/vendors/{vendor_id}/sales/summary",
            get(routes::sales::summary::<S>),
        )
        .route(
            "/vendors/{vendor_id}/sales/{sale_id}",
            get(routes::sales::get::<S>),
        )
        .route(
            "/vendors/{vendor_id}/items/{item_id}/sales/summary",
            get(routes::sales::item_summary::<S>),
        )
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
