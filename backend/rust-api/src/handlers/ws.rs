use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;

use crate::hub::{ClientSession, Connection, FrameContext};
use crate::models::Principal;
use crate::services::AppState;

/// Transport-level frame ceiling. Application frames are further limited by
/// `hub.max_message_size` in the read loop.
const MAX_TRANSPORT_MESSAGE: usize = 64 << 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsParams {
    pub session_id: Option<String>,
    pub display_name: Option<String>,
    pub token: Option<String>,
}

/// GET /ws?sessionId=&displayName=&token=
///
/// A valid token identifies the caller; without one the connection is
/// anonymous. An invalid token is rejected before the upgrade.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let principal = match params.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => match state.jwt.principal_from_token(token) {
            Ok(mut principal) => {
                if let Some(name) = params.display_name.filter(|n| !n.trim().is_empty()) {
                    principal.display_name = name;
                }
                principal
            }
            Err(e) => {
                tracing::warn!("WebSocket token rejected: {}", e);
                return StatusCode::UNAUTHORIZED.into_response();
            }
        },
        None => Principal::anonymous(params.display_name),
    };
    let session_id = params.session_id.filter(|s| !s.is_empty());

    ws.max_message_size(MAX_TRANSPORT_MESSAGE)
        .on_upgrade(move |socket| serve_socket(state, socket, principal, session_id))
}

async fn serve_socket(
    state: Arc<AppState>,
    socket: WebSocket,
    principal: Principal,
    session_id: Option<String>,
) {
    let (connection, queue) = Connection::new(
        principal.clone(),
        session_id.clone(),
        state.config.hub.outbound_queue_capacity,
    );
    let connection_id = state.hub.register(connection).await;

    tracing::info!(
        connection_id = %connection_id,
        user_id = %principal.user_id,
        session_id = ?session_id,
        "WebSocket connected"
    );

    let (sink, stream) = socket.split();
    let client = ClientSession::new(
        state.hub.clone(),
        Arc::new(state.dispatcher.clone()),
        state.config.hub.clone(),
        FrameContext {
            connection_id,
            principal,
            session_id,
        },
    );
    client.run(queue, sink, stream).await;

    tracing::info!(connection_id = %connection_id, "WebSocket disconnected");
}
