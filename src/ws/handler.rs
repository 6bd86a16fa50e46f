use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::state::AppState;
use crate::ws::{actor, ConnectionId};

/// GET /ws
/// WebSocket upgrade endpoint. Assigns the process-unique connection
/// identifier at the transport boundary and spawns an actor for the
/// connection.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let conn_id = ConnectionId::next();
    ws.on_upgrade(move |socket| actor::run_connection(socket, state, conn_id))
}
