//! Inbound message dispatcher (§4.1, §4.2): charges the sender's rate-limit
//! budget and routes each decoded `ClientMessage` to its handler in
//! `room_service`/`reconnection_service`. A message that finishes handling
//! after the connection has been tagged migrating (§4.8 multi-tab takeover)
//! is dropped rather than committed — the newer connection already owns the
//! session.
//!
//! Grounded on the predecessor's `handle_client_message` match-on-variant
//! shape, rebuilt wholesale against this protocol's wire actions.

use std::sync::Arc;

use tracing::warn;

use crate::coordination::MessageCoordinator;
use crate::protocol::{ClientMessage, ConnectionId, ServerMessage};
use crate::rate_limit::RateLimitError;

use super::LexiclashServer;

impl LexiclashServer {
    /// Entry point called by the websocket read loop for every decoded
    /// inbound message (§4.1).
    pub async fn dispatch(self: &Arc<Self>, connection_id: ConnectionId, message: ClientMessage) {
        if self.connections.is_migrating(&connection_id) {
            return;
        }

        let action = action_name(&message);
        if let Err(err) = self.rate_limiter.check(connection_id, action).await {
            self.report_rate_limited(connection_id, action, err).await;
            return;
        }

        let result = match message {
            ClientMessage::CreateGame {
                code,
                host_name,
                language,
                is_ranked,
                avatar,
                auth_user_id,
                guest_token_hash,
            } => {
                self.handle_create_game(
                    connection_id,
                    code,
                    host_name,
                    language,
                    is_ranked,
                    avatar,
                    auth_user_id,
                    guest_token_hash,
                )
                .await
            }
            ClientMessage::Join {
                code,
                name,
                avatar,
                auth_user_id,
                guest_token_hash,
            } => {
                self.handle_join(connection_id, code, name, avatar, auth_user_id, guest_token_hash)
                    .await
            }
            ClientMessage::StartGame { grid, seconds, min_word_length } => {
                self.handle_start_game(connection_id, grid, seconds, min_word_length).await
            }
            ClientMessage::StartGameAck { message_id } => {
                self.handle_start_game_ack(connection_id, message_id).await
            }
            ClientMessage::SubmitWord { candidate, combo_level } => {
                self.handle_submit_word(connection_id, candidate, combo_level).await
            }
            ClientMessage::ChatMessage { text } => self.handle_chat_message(connection_id, text).await,
            ClientMessage::EndGame => self.handle_end_game(connection_id).await,
            ClientMessage::ValidateWords { approved_words } => {
                self.handle_validate_words(connection_id, approved_words).await
            }
            ClientMessage::ResetGame => self.handle_reset_game(connection_id).await,
            ClientMessage::CloseRoom => self.handle_close_room(connection_id).await,
            ClientMessage::GetActiveRooms => self.handle_get_active_rooms(connection_id).await,
            ClientMessage::LeaveRoom => self.handle_leave_room(connection_id).await,
            ClientMessage::PresenceUpdate { focused, idle } => {
                self.handle_presence_update(connection_id, focused, idle).await
            }
            ClientMessage::PresenceHeartbeat => self.handle_presence_heartbeat(connection_id).await,
            ClientMessage::Ping => self.handle_ping(connection_id).await,
            ClientMessage::SubmitWordVote { word, approve } => {
                self.handle_submit_word_vote(connection_id, word, approve).await
            }
        };

        if self.connections.is_migrating(&connection_id) {
            return;
        }

        if let Err(err) = result {
            warn!(%connection_id, action, error = %err, "message handler failed");
        }
    }

    async fn report_rate_limited(&self, connection_id: ConnectionId, action: &str, err: RateLimitError) {
        warn!(%connection_id, action, error = %err, "rate limit budget exceeded");
        let _ = self
            .send_to_connection(
                &connection_id,
                Arc::new(ServerMessage::RateLimited { operation: action.to_string() }),
            )
            .await;
    }
}

/// Maps a `ClientMessage` to the action name `RateLimitConfig::weight_for_action`
/// keys on (§6). `ChatMessage`'s wire tag is `chatMessage`, but the configured
/// weight is `weight_chat`, so it reports as the shorter `"chat"`.
fn action_name(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::CreateGame { .. } => "createGame",
        ClientMessage::Join { .. } => "join",
        ClientMessage::StartGame { .. } => "startGame",
        ClientMessage::StartGameAck { .. } => "startGameAck",
        ClientMessage::SubmitWord { .. } => "submitWord",
        ClientMessage::ChatMessage { .. } => "chat",
        ClientMessage::EndGame => "endGame",
        ClientMessage::ValidateWords { .. } => "validateWords",
        ClientMessage::ResetGame => "resetGame",
        ClientMessage::CloseRoom => "closeRoom",
        ClientMessage::GetActiveRooms => "getActiveRooms",
        ClientMessage::LeaveRoom => "leaveRoom",
        ClientMessage::PresenceUpdate { .. } => "presenceUpdate",
        ClientMessage::PresenceHeartbeat => "presenceHeartbeat",
        ClientMessage::Ping => "ping",
        ClientMessage::SubmitWordVote { .. } => "submitWordVote",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_reports_as_short_action_name() {
        assert_eq!(action_name(&ClientMessage::ChatMessage { text: "hi".to_string() }), "chat");
    }

    #[test]
    fn submit_word_reports_its_own_name() {
        assert_eq!(
            action_name(&ClientMessage::SubmitWord { candidate: "cat".to_string(), combo_level: 0 }),
            "submitWord"
        );
    }
}
