use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::protocol::{ClientMessage, ConnectionId, ErrorCode, ServerMessage};
use crate::server::{LexiclashServer, RegisterConnectionError};

use super::sending::send_text_message;

/// Outbound queue depth for a single connection's send task. Generous enough
/// to absorb a burst of room broadcasts without the sender blocking.
const SEND_QUEUE_CAPACITY: usize = 64;

pub(super) async fn handle_socket(socket: WebSocket, server: Arc<LexiclashServer>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id: ConnectionId = ConnectionId::new_v4();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Arc<ServerMessage>>(SEND_QUEUE_CAPACITY);

    if let Err(RegisterConnectionError::IpLimitExceeded { current, limit }) =
        server.connections.register(connection_id, tx, addr)
    {
        let error_message = ServerMessage::Error {
            code: ErrorCode::TooManyConnections,
            message: format!("Too many connections from your IP ({current}/{limit})"),
        };
        let _ = send_text_message(&mut sender, &error_message, &connection_id).await;
        let _ = sender.close().await;
        return;
    }

    tracing::info!(%connection_id, client_addr = %addr, "websocket connection established");

    let server_for_send = Arc::clone(&server);
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if send_text_message(&mut sender, &message, &connection_id).await.is_err() {
                break;
            }
        }
        let _ = server_for_send;
    });

    let server_for_receive = Arc::clone(&server);
    let receive_task = tokio::spawn(async move {
        let max_frame_bytes = server_for_receive.config.websocket.max_frame_bytes;

        while let Some(frame) = receiver.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::debug!(%connection_id, error = %err, "websocket read error");
                    break;
                }
            };

            match frame {
                Message::Text(text) => {
                    if text.len() > max_frame_bytes {
                        tracing::warn!(
                            %connection_id,
                            size = text.len(),
                            max = max_frame_bytes,
                            "frame exceeds size limit"
                        );
                        server_for_receive
                            .send_error(
                                connection_id,
                                ErrorCode::MessageTooLarge,
                                format!(
                                    "message too large ({} bytes, max {} bytes)",
                                    text.len(),
                                    max_frame_bytes
                                ),
                            )
                            .await;
                        continue;
                    }

                    let client_message: ClientMessage = match serde_json::from_str(&text) {
                        Ok(message) => message,
                        Err(err) => {
                            tracing::warn!(%connection_id, error = %err, "rejected malformed frame");
                            server_for_receive
                                .send_error(
                                    connection_id,
                                    ErrorCode::InvalidInput,
                                    format!("malformed message: {err}"),
                                )
                                .await;
                            continue;
                        }
                    };

                    server_for_receive.dispatch(connection_id, client_message).await;
                }
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(_) => {
                    tracing::info!(%connection_id, "websocket connection closed by client");
                    break;
                }
                Message::Binary(_) => {
                    tracing::debug!(%connection_id, "dropping unexpected binary frame");
                }
            }
        }

        server_for_receive.handle_disconnect(connection_id).await;
    });

    tokio::select! {
        _ = send_task => {
            tracing::debug!(%connection_id, "send task completed");
        }
        _ = receive_task => {
            tracing::debug!(%connection_id, "receive task completed");
        }
    }

    server.handle_disconnect(connection_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use futures_util::SinkExt as _;
    use std::net::SocketAddr;
    use tokio_tungstenite::{connect_async, tungstenite::Message as TungsteniteMessage};

    #[tokio::test(flavor = "multi_thread")]
    async fn joining_a_fresh_code_creates_a_room() {
        let test_result = tokio::time::timeout(
            tokio::time::Duration::from_secs(30),
            joining_a_fresh_code_creates_a_room_impl(),
        )
        .await;
        assert!(test_result.is_ok(), "test timed out after 30 seconds");
    }

    async fn joining_a_fresh_code_creates_a_room_impl() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = LexiclashServer::new(Config::default()).await.unwrap();
        let app = super::super::routes::create_router().with_state(server);

        tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let url = format!("ws://{addr}/ws");
        let (ws_stream, _) = connect_async(&url).await.expect("connect to test server");
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let join_message = ClientMessage::CreateGame {
            code: "ABCD".to_string(),
            host_name: "alice".to_string(),
            language: crate::protocol::types::GameLanguage::En,
            is_ranked: false,
            avatar: None,
            auth_user_id: None,
            guest_token_hash: None,
        };
        let json = serde_json::to_string(&join_message).unwrap();
        ws_sender.send(TungsteniteMessage::Text(json.into())).await.unwrap();

        let msg = tokio::time::timeout(tokio::time::Duration::from_secs(5), ws_receiver.next())
            .await
            .expect("response before timeout")
            .expect("socket stayed open")
            .expect("valid frame");

        if let TungsteniteMessage::Text(text) = msg {
            let server_message: ServerMessage = serde_json::from_str(&text).unwrap();
            match server_message {
                ServerMessage::Joined(payload) => assert_eq!(payload.code, "ABCD"),
                other => panic!("unexpected message: {other:?}"),
            }
        } else {
            panic!("expected a text frame");
        }
    }
}
