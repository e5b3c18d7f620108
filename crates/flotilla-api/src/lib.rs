//! Manager-side control-plane HTTP surface.
//!
//! Nodes pull their mirror config from here; pulling stamps the node's
//! pull status under the store lock before the config is rendered, so the
//! returned document always reflects the coordinator's current secrets.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{debug, error};

use flotilla_coordinator::Coordinator;
use flotilla_core::util::now_ms;
use flotilla_store::{NodeStatus, Store};
use flotilla_writer::Writer;

/// Shared state for control-plane handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<Store>,
    pub writer: Arc<Writer>,
    pub coordinator: Arc<Coordinator>,
}

/// Build the control-plane router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/nodes/{id}/configs", get(node_configs_show))
        .route("/v1/system/restart", post(system_restart))
        .with_state(state)
}

/// `GET /v1/nodes/{id}/configs` — a node pulling its own config.
async fn node_configs_show(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let mut guard = state.store.lock();
    let Some(node) = guard.find_node_mut(id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    node.pulled_at = now_ms();
    node.pull_status = NodeStatus::Available;
    let node = node.clone();

    if let Err(e) = state.store.save(&guard) {
        error!(node = id, error = %e, "cannot save pull status");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "message": "cannot save the fleet state" })),
        )
            .into_response();
    }

    let secrets = state.coordinator.state();
    let Some(local) = secrets.local_config() else {
        // Startup sync has not completed yet; the node retries.
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "message": "local config not built yet" })),
        )
            .into_response();
    };

    let config = match state.writer.remote_config(
        &guard,
        &node,
        &local,
        secrets.updated_at(),
        secrets.shared_password(),
    ) {
        Ok(config) => config,
        Err(e) => {
            error!(node = id, error = %e, "cannot render node config");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "message": "cannot render the node config" })),
            )
                .into_response();
        }
    };

    debug!(node = id, "node config pulled");
    Json(config).into_response()
}

/// `POST /v1/system/restart` — rebuild and redistribute all configs.
async fn system_restart(State(state): State<ApiState>) -> StatusCode {
    let coordinator = state.coordinator.clone();
    tokio::spawn(async move { coordinator.sync_configs().await });
    StatusCode::NO_CONTENT
}
