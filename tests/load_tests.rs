//! Load and throughput tests for the realtime coordination core.
//!
//! These are marked `#[ignore]` because they spin up hundreds of simulated
//! connections and are meant to be run deliberately (`cargo test --test
//! load_tests -- --ignored`), not as part of the default suite.


use lexiclash_core::protocol::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use test_helpers::{create_test_server_with_config, register_connection, test_config};

/// Target: server should accept a large burst of room creations without
/// dropping any connection registration or handing out duplicate codes.
#[tokio::test(flavor = "multi_thread")]
#[ignore = "run explicitly with --ignored"]
async fn test_load_room_creation_throughput() {
    let server = create_test_server_with_config(test_config()).await;

    let num_rooms = 500;
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..num_rooms {
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
            matches!(rx.try_recv().unwrap().as_ref(), ServerMessage::Joined(_))
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    let duration = start.elapsed();
    let throughput = successes as f64 / duration.as_secs_f64();
    println!("created {successes}/{num_rooms} rooms in {duration:?} ({throughput:.1} rooms/sec)");

    assert_eq!(successes, num_rooms, "every room creation should succeed");
    assert_eq!(server.rooms.len(), num_rooms);
}

/// Target: many rooms running concurrently, each with a full roster, should
/// all receive their round-start broadcast.
#[tokio::test(flavor = "multi_thread")]
#[ignore = "run explicitly with --ignored"]
async fn test_load_concurrent_rooms_reach_round_start() {
    let mut config = test_config();
    config.server.default_max_players = 4;
    let server = create_test_server_with_config(config).await;

    let num_rooms = 100;
    let players_per_room = 4;
    let start = Instant::now();

    let mut handles = Vec::new();
    for room_idx in 0..num_rooms {
        let server = server.clone();
        handles.push(tokio::spawn(async move {
            let code = format!("L{room_idx:03}");
            let (host_id, mut host_rx) = register_connection(&server);
            server
                .dispatch(
                    host_id,
                    ClientMessage::CreateGame {
                        code: code.clone(),
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

            let mut guest_rxs = Vec::new();
            for p in 1..players_per_room {
                let (guest_id, mut guest_rx) = register_connection(&server);
                server
                    .dispatch(
                        guest_id,
                        ClientMessage::Join {
                            code: code.clone(),
                            name: format!("Player{p}"),
                            avatar: None,
                            auth_user_id: None,
                            guest_token_hash: None,
                        },
                    )
                    .await;
                let _ = guest_rx.try_recv().unwrap(); // Joined
                let _ = host_rx.try_recv().unwrap(); // UpdateUsers
                guest_rxs.push(guest_rx);
            }

            server
                .dispatch(
                    host_id,
                    ClientMessage::StartGame {
                        grid: vec![
                            vec!['c', 'a', 't'],
                            vec!['d', 'o', 'g'],
                            vec!['h', 'e', 'r'],
                        ],
                        seconds: 60,
                        min_word_length: 3,
                    },
                )
                .await;

            let host_started = matches!(
                host_rx.try_recv().unwrap().as_ref(),
                ServerMessage::StartGame { .. }
            );
            let guests_started = guest_rxs
                .iter_mut()
                .all(|rx| matches!(rx.try_recv().unwrap().as_ref(), ServerMessage::StartGame { .. }));

            host_started && guests_started
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    let duration = start.elapsed();
    println!("{successes}/{num_rooms} rooms reached round start in {duration:?}");
    assert_eq!(successes, num_rooms);
}

/// Target: the room-creation rate limiter should actually bite under a
/// rapid-fire burst from a single connection.
#[tokio::test(flavor = "multi_thread")]
#[ignore = "run explicitly with --ignored"]
async fn test_load_room_creation_rate_limiting() {
    let mut config = test_config();
    config.rate_limit.room_creations_per_window = 5;
    config.rate_limit.window_secs = 60;
    let server = create_test_server_with_config(config).await;

    let (connection_id, mut rx) = register_connection(&server);

    let attempts = 50;
    let mut allowed = 0;
    let mut rate_limited = 0;

    for i in 0..attempts {
        server
            .dispatch(
                connection_id,
                ClientMessage::CreateGame {
                    code: format!("R{i:03}"),
                    host_name: "Hammer".to_string(),
                    language: GameLanguage::En,
                    is_ranked: false,
                    avatar: None,
                    auth_user_id: None,
                    guest_token_hash: None,
                },
            )
            .await;

        match rx.try_recv().expect("dispatch should reply").as_ref() {
            ServerMessage::Joined(_) => allowed += 1,
            ServerMessage::Error { code, .. } if *code == ErrorCode::RateLimitExceeded => {
                rate_limited += 1
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    println!("allowed {allowed}, rate limited {rate_limited} of {attempts} attempts");
    assert!(
        rate_limited > allowed,
        "the rate limiter should block most of a rapid burst (allowed {allowed}, limited {rate_limited})"
    );
}

/// Sanity check that room bookkeeping doesn't leak: creating and tearing down
/// many rooms in sequence should leave the room map empty-ish (only whatever
/// concurrently-created rooms remain, if any) rather than growing unbounded
/// within a single test run.
#[tokio::test(flavor = "multi_thread")]
#[ignore = "run explicitly with --ignored"]
async fn test_load_many_distinct_connections_register_cleanly() {
    let server = create_test_server_with_config(test_config()).await;
    let registered = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..1000 {
        let server = server.clone();
        let registered = registered.clone();
        handles.push(tokio::spawn(async move {
            let (connection_id, _rx) = register_connection(&server);
            if server.connections.sender(&connection_id).is_some() {
                registered.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(registered.load(Ordering::Relaxed), 1000);
}
