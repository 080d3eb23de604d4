
use futures_util::{SinkExt, StreamExt};
use lexiclash_core::config::Config;
use lexiclash_core::websocket::create_router;
use std::net::SocketAddr;
use test_helpers::{create_test_server_with_config, test_config};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn start_test_server(config: Config) -> SocketAddr {
    let server = create_test_server_with_config(config).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = create_router().with_state(server);
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    addr
}

async fn recv_json(
    read: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
) -> serde_json::Value {
    let msg = tokio::time::timeout(tokio::time::Duration::from_secs(5), read.next())
        .await
        .expect("response before timeout")
        .expect("socket stayed open")
        .expect("valid frame");
    match msg {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_health_check_over_http() {
    let server = create_test_server_with_config(test_config()).await;
    let app = create_router().with_state(server);
    let test_server = axum_test::TestServer::new(app).expect("test server should start");

    let response = test_server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_room_creation_and_join_over_websocket() {
    let addr = start_test_server(test_config()).await;
    let url = format!("ws://{addr}/ws");

    let (stream1, _) = connect_async(&url).await.unwrap();
    let (stream2, _) = connect_async(&url).await.unwrap();
    let (mut write1, mut read1) = stream1.split();
    let (mut write2, mut read2) = stream2.split();

    let create = serde_json::json!({
        "type": "createGame",
        "data": { "code": "E2E1", "host_name": "Host", "language": "en", "is_ranked": false }
    });
    write1.send(Message::Text(create.to_string().into())).await.unwrap();
    let joined = recv_json(&mut read1).await;
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["data"]["is_host"], true);

    let join = serde_json::json!({
        "type": "join",
        "data": { "code": "E2E1", "name": "Guest" }
    });
    write2.send(Message::Text(join.to_string().into())).await.unwrap();
    let joined2 = recv_json(&mut read2).await;
    assert_eq!(joined2["type"], "joined");
    assert_eq!(joined2["data"]["is_host"], false);

    let update = recv_json(&mut read1).await;
    assert_eq!(update["type"], "updateUsers");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_limit_per_ip_is_enforced() {
    let mut config = test_config();
    config.server.max_connections_per_ip = 1;
    let addr = start_test_server(config).await;
    let url = format!("ws://{addr}/ws");

    let (_stream1, _) = connect_async(&url).await.unwrap();
    // Give the server a moment to register the first connection before the second dials in.
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    let (stream2, _) = connect_async(&url).await.unwrap();
    let (_write2, mut read2) = stream2.split();

    let error = recv_json(&mut read2).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["data"]["code"], "TOO_MANY_CONNECTIONS");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_oversized_frame_is_rejected() {
    let mut config = test_config();
    config.websocket.max_frame_bytes = 64;
    let addr = start_test_server(config).await;
    let url = format!("ws://{addr}/ws");

    let (stream, _) = connect_async(&url).await.unwrap();
    let (mut write, mut read) = stream.split();

    let oversized_name = "x".repeat(200);
    let create = serde_json::json!({
        "type": "createGame",
        "data": { "code": "BIG1", "host_name": oversized_name, "language": "en", "is_ranked": false }
    });
    write.send(Message::Text(create.to_string().into())).await.unwrap();

    let error = recv_json(&mut read).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["data"]["code"], "MESSAGE_TOO_LARGE");
}
