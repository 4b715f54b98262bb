use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use dstore_directory::NodeInfo;
use dstore_protocol::HealthResponse;
use serde_json::json;

use crate::data_store::CachingDataStore;

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Server identity plus directory counters.
pub async fn info_handler(State(store): State<Arc<CachingDataStore>>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "dstore-server",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": dstore_protocol::PROTOCOL_VERSION,
        "directory": store.stats(),
    }))
}

/// Every node that ever registered, dead ones included.
pub async fn nodes_handler(
    State(store): State<Arc<CachingDataStore>>,
) -> Result<Json<Vec<NodeInfo>>, (StatusCode, String)> {
    store
        .nodes()
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
