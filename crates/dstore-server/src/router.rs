use std::sync::Arc;

use axum::{routing::get, Router};
use dstore_protocol::endpoints;

use crate::data_store::CachingDataStore;
use crate::handler;

/// Build the admin router.
pub fn build_router(store: Arc<CachingDataStore>) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::INFO, get(handler::info_handler))
        .route(endpoints::NODES, get(handler::nodes_handler))
        .with_state(store)
}
