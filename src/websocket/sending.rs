use axum::extract::ws::{Message, WebSocket};
use futures_util::SinkExt;

use crate::protocol::{ConnectionId, ServerMessage};

/// Sends a single server message as a JSON text frame. Returns `Err(())` if
/// the socket is gone, so the caller can stop its write loop.
pub(super) async fn send_text_message(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    message: &ServerMessage,
    connection_id: &ConnectionId,
) -> Result<(), ()> {
    let json_message = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(%connection_id, error = %err, "failed to serialize server message");
            return Ok(());
        }
    };

    if sender.send(Message::Text(json_message.into())).await.is_err() {
        tracing::debug!(%connection_id, "failed to send message, connection closed");
        return Err(());
    }

    Ok(())
}
