
use lexiclash_core::protocol::*;
use test_helpers::{create_test_server_with_config, register_connection, test_config};

/// Many hosts create rooms with server-generated codes concurrently; every
/// code handed back must be unique and every room must actually exist.
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_room_creation_yields_unique_codes() {
    let server = create_test_server_with_config(test_config()).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let server = server.clone();
        handles.push(tokio::spawn(async move {
            let (connection_id, mut rx) = register_connection(&server);
            server
                .dispatch(
                    connection_id,
                    ClientMessage::CreateGame {
                        code: String::new(),
                        host_name: format!("Host{i}"),
                        language: GameLanguage::En,
                        is_ranked: false,
                        avatar: None,
                        auth_user_id: None,
                        guest_token_hash: None,
                    },
                )
                .await;
            match rx.try_recv().expect("host should be joined").as_ref() {
                ServerMessage::Joined(payload) => payload.code.clone(),
                other => panic!("expected Joined, got {other:?}"),
            }
        }));
    }

    let mut codes = Vec::new();
    for handle in handles {
        codes.push(handle.await.unwrap());
    }

    let unique: std::collections::HashSet<_> = codes.iter().cloned().collect();
    assert_eq!(unique.len(), codes.len(), "every generated room code must be unique");
    assert_eq!(server.rooms.len(), codes.len());
}

/// Concurrent joiners racing for the last seats in a room: exactly the
/// remaining capacity should succeed and the rest should see `RoomFull`.
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_joins_respect_room_capacity() {
    let mut config = test_config();
    config.server.default_max_players = 4;
    let server = create_test_server_with_config(config).await;

    let (host_id, mut host_rx) = register_connection(&server);
    server
        .dispatch(
            host_id,
            ClientMessage::CreateGame {
                code: "CAP1".to_string(),
                host_name: "Host".to_string(),
                language: GameLanguage::En,
                is_ranked: false,
                avatar: None,
                auth_user_id: None,
                guest_token_hash: None,
            },
        )
        .await;
    let _ = host_rx.try_recv().unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let server = server.clone();
        handles.push(tokio::spawn(async move {
            let (connection_id, mut rx) = register_connection(&server);
            server
                .dispatch(
                    connection_id,
                    ClientMessage::Join {
                        code: "CAP1".to_string(),
                        name: format!("Player{i}"),
                        avatar: None,
                        auth_user_id: None,
                        guest_token_hash: None,
                    },
                )
                .await;
            matches!(rx.try_recv().unwrap().as_ref(), ServerMessage::Joined(_))
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }

    // 3 extra seats remain after the host takes one of the 4 slots.
    assert_eq!(accepted, 3);
}
