// GET handlers: version, capabilities

use axum::response::IntoResponse;

use crate::channel::CAPABILITIES;
use crate::version::{NAME, VERSION};

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/capabilities: the allow-list of commands accepted on /ws/channel.
pub(super) async fn capabilities_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "capabilities": CAPABILITIES }))
}
