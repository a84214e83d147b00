// WebSocket session: inbound commands, outbound events, keepalive pings

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header::ORIGIN},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::channel::{Dispatcher, EventSink, decode_command};
use crate::config::ChannelConfig;

/// Decrements the session count on drop (connect = +1, drop = -1).
struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let left = self.0.fetch_sub(1, Ordering::Relaxed) - 1;
        tracing::info!(active_sessions = left, "Client disconnected from channel");
    }
}

/// Exact match against the configured origins. A missing Origin is refused.
fn origin_allowed(headers: &HeaderMap, allowed: &[String]) -> bool {
    headers
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|origin| allowed.iter().any(|a| a == origin))
}

pub(super) async fn ws_channel(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    if !origin_allowed(&headers, &state.channel.allowed_origins) {
        tracing::warn!(
            origin = ?headers.get(ORIGIN),
            "channel upgrade refused: origin not allowed"
        );
        return StatusCode::FORBIDDEN.into_response();
    }
    let AppState {
        dispatcher,
        channel,
        active_sessions,
    } = state;
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = run_session(socket, dispatcher, channel, active_sessions).await {
            tracing::info!("Channel session error: {}", e);
        }
    })
    .into_response()
}

async fn run_session(
    mut socket: WebSocket,
    dispatcher: Dispatcher,
    config: ChannelConfig,
    active_sessions: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    let n = active_sessions.fetch_add(1, Ordering::Relaxed) + 1;
    let _guard = SessionGuard(active_sessions);
    tracing::info!(active_sessions = n, "Client connected to channel");

    let send_timeout = Duration::from_secs(config.send_timeout_secs);
    let (events, mut outbound) = EventSink::channel(config.event_buffer);
    let mut ping_interval = tokio::time::interval(Duration::from_secs(config.ping_interval_secs));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // First tick fires immediately; skip it so the first frame is a real reply.
    ping_interval.tick().await;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match decode_command(text.as_str()) {
                        Ok(command) => dispatcher.handle(command, events.clone()),
                        Err(e) => {
                            tracing::warn!(error = %e, "frame rejected at channel boundary");
                            dispatcher.reject(e.command(), &e, events.clone());
                        }
                    },
                    Some(Ok(Message::Binary(_))) => {
                        dispatcher.reject("unknown", "binary frames are not accepted", events.clone());
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
            Some(event) = outbound.recv() => {
                let json = serde_json::to_string(&event)?;
                let r = timeout(send_timeout, socket.send(Message::Text(json.into()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(send_timeout, socket.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}
