// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, http::HeaderValue, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::channel::Dispatcher;
use crate::config::ChannelConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) channel: ChannelConfig,
    pub(crate) active_sessions: Arc<AtomicUsize>,
}

pub fn app(dispatcher: Dispatcher, channel: ChannelConfig) -> Router {
    let origins: Vec<HeaderValue> = channel
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let state = AppState {
        dispatcher,
        channel,
        active_sessions: Arc::new(AtomicUsize::new(0)),
    };
    Router::new()
        .route("/", get(|| async { "pcmedic: repair assistant is running" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/capabilities", get(http::capabilities_handler)) // GET /api/capabilities
        .route("/ws/channel", get(ws::ws_channel)) // WS /ws/channel
        .layer(CorsLayer::new().allow_origin(AllowOrigin::list(origins)))
        .with_state(state)
}
