//! Integration tests for the signaling relay
//!
//! Boots the full router on a random port and drives it with real
//! WebSocket and HTTP clients:
//! - welcome handshake and server-assigned keys
//! - point-to-point forwarding
//! - group entry over the socket and roster broadcasts
//! - group API status codes and join policies
//! - connection cleanup and key replacement

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rendezvous_common::{Envelope, MessageType};
use rendezvous_server::{app, AppState, Config, JoinPolicy};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn test_config() -> Config {
    Config {
        static_dir: "does-not-exist".into(),
        ..Config::default()
    }
}

async fn start_test_server(config: Config) -> SocketAddr {
    let state = AppState::new(&config);
    let app = app::build_router(state, &config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Connect as `key` and consume the welcome envelope.
async fn connect(addr: SocketAddr, key: &str) -> Socket {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws?key={}", addr, key))
        .await
        .expect("Failed to connect to WebSocket");
    let welcome = next_envelope(&mut ws).await;
    assert_eq!(welcome.kind, MessageType::Welcome);
    assert_eq!(welcome.receiver, key);
    ws
}

async fn next_text(ws: &mut Socket) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Expected message within timeout")
            .expect("Stream ended")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => return text,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text message, got: {:?}", other),
        }
    }
}

async fn next_envelope(ws: &mut Socket) -> Envelope {
    let text = next_text(ws).await;
    Envelope::decode(&text).expect("Server sent an invalid envelope")
}

async fn assert_silent(ws: &mut Socket) {
    let result = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "Expected no message, got {:?}", result);
}

async fn send_text(ws: &mut Socket, text: &str) {
    ws.send(Message::Text(text.to_string()))
        .await
        .expect("Failed to send");
}

async fn health(addr: SocketAddr) -> serde_json::Value {
    reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_welcome_names_requested_key() {
    let addr = start_test_server(test_config()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws?key=alice", addr))
        .await
        .unwrap();

    let welcome = next_envelope(&mut ws).await;
    assert_eq!(welcome.kind, MessageType::Welcome);
    assert_eq!(welcome.sender, "server");
    assert_eq!(welcome.receiver, "alice");
    assert_eq!(welcome.content, "Hi, you are connected with key: alice\n");
    assert_silent(&mut ws).await;
}

#[tokio::test]
async fn test_missing_key_is_assigned() {
    let addr = start_test_server(test_config()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();

    let welcome = next_envelope(&mut ws).await;
    assert_eq!(welcome.kind, MessageType::Welcome);
    assert_eq!(welcome.receiver.len(), 4);
    assert!(welcome.receiver.chars().all(|c| c.is_ascii_alphanumeric()));
    assert!(welcome.content.contains(&welcome.receiver));
}

#[tokio::test]
async fn test_offer_forwarded_verbatim() {
    let addr = start_test_server(test_config()).await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;

    let raw = concat!(
        r#"{"type":"offer","sender":"alice","receiver":"bob","#,
        r#""content":"{\"sdp\":\"v=0\",\"type\":\"offer\"}"}"#
    );
    send_text(&mut alice, raw).await;
    assert_eq!(next_text(&mut bob).await, raw);

    let raw =
        r#"{"type":"candidate","sender":"bob","receiver":"alice","content":"candidate:1 1 udp"}"#;
    send_text(&mut bob, raw).await;
    assert_eq!(next_text(&mut alice).await, raw);
}

#[tokio::test]
async fn test_bad_input_keeps_connection_open() {
    let addr = start_test_server(test_config()).await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;

    send_text(&mut alice, "this is not json").await;
    send_text(&mut alice, r#"{"type":"shrug","receiver":"bob"}"#).await;
    send_text(&mut alice, r#"{"type":"text","receiver":"nobody","content":"hi"}"#).await;
    alice
        .send(Message::Binary(vec![1, 2, 3]))
        .await
        .unwrap();
    assert_silent(&mut bob).await;

    let raw = r#"{"type":"text","sender":"alice","receiver":"bob","content":"still here"}"#;
    send_text(&mut alice, raw).await;
    assert_eq!(next_text(&mut bob).await, raw);
}

#[tokio::test]
async fn test_enter_group_broadcasts_roster() {
    let addr = start_test_server(test_config()).await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;

    send_text(&mut alice, r#"{"type":"entergroup","sender":"alice","content":"room"}"#).await;
    let roster = next_envelope(&mut alice).await;
    assert_eq!(roster.kind, MessageType::GroupEntered);
    assert_eq!(roster.content, "alice");
    assert_silent(&mut bob).await;

    send_text(&mut bob, r#"{"type":"entergroup","sender":"bob","content":"room"}"#).await;
    for ws in [&mut alice, &mut bob] {
        let roster = next_envelope(ws).await;
        assert_eq!(roster.kind, MessageType::GroupEntered);
        assert_eq!(roster.sender, "server");
        assert_eq!(roster.receiver, "bob");
        assert_eq!(roster.content, "alice,bob");
    }

    let group: serde_json::Value = reqwest::get(format!("http://{}/group?group=room", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(group["members"], json!(["alice", "bob"]));
}

#[tokio::test]
async fn test_group_api_status_codes() {
    let addr = start_test_server(test_config()).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let resp = client
        .post(format!("{}/group", base))
        .json(&json!({"key": "g1", "name": "Friends", "members": ["A", "B", "A"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{}/group", base))
        .json(&json!({"key": "g1", "name": "Other", "members": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = client
        .get(format!("{}/group?group=g1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"key": "g1", "name": "Friends", "members": ["A", "B"]}));

    let resp = client
        .get(format!("{}/group?group=missing", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .post(format!("{}/group", base))
        .header("content-type", "application/json")
        .body("{\"key\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/group/join", base))
        .json(&json!({"userKey": "C", "groupKey": "missing"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let addr = start_test_server(Config {
        max_body_bytes: 256,
        ..test_config()
    })
    .await;

    let members: Vec<String> = (0..100).map(|i| format!("member-{i}")).collect();
    let resp = reqwest::Client::new()
        .post(format!("http://{}/group", addr))
        .json(&json!({"key": "big", "members": members}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(health(addr).await["groups"], 0);
}

#[tokio::test]
async fn test_http_join_pushes_roster_to_members() {
    let addr = start_test_server(test_config()).await;
    let client = reqwest::Client::new();
    let mut alice = connect(addr, "alice").await;

    let resp = client
        .post(format!("http://{}/group", addr))
        .json(&json!({"key": "g1", "members": ["alice"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    for _ in 0..2 {
        let resp = client
            .post(format!("http://{}/group/join", addr))
            .json(&json!({"userKey": "bob", "groupKey": "g1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["members"], json!(["alice", "bob"]));

        let roster = next_envelope(&mut alice).await;
        assert_eq!(roster.kind, MessageType::GroupEntered);
        assert_eq!(roster.receiver, "bob");
        assert_eq!(roster.content, "alice,bob");
    }
}

#[tokio::test]
async fn test_lenient_join_creates_group() {
    let addr = start_test_server(Config {
        join_policy: JoinPolicy::Lenient,
        ..test_config()
    })
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/group/join", addr))
        .json(&json!({"userKey": "U", "groupKey": "fresh"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"key": "fresh", "name": "", "members": ["U"]}));
}

#[tokio::test]
async fn test_connection_cleanup_on_close() {
    let addr = start_test_server(test_config()).await;
    let mut carol = connect(addr, "carol").await;
    assert_eq!(health(addr).await["active_connections"], 1);

    carol.close(None).await.unwrap();
    drop(carol);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(health(addr).await["active_connections"], 0);
}

#[tokio::test]
async fn test_newer_connection_takes_over_key() {
    let addr = start_test_server(test_config()).await;
    let mut sender = connect(addr, "sender").await;
    let mut old = connect(addr, "dup").await;
    let mut new = connect(addr, "dup").await;

    let raw = r#"{"type":"text","sender":"sender","receiver":"dup","content":"one"}"#;
    send_text(&mut sender, raw).await;
    assert_eq!(next_text(&mut new).await, raw);
    assert_silent(&mut old).await;

    // closing the displaced socket must not evict the live one
    old.close(None).await.unwrap();
    drop(old);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let raw = r#"{"type":"text","sender":"sender","receiver":"dup","content":"two"}"#;
    send_text(&mut sender, raw).await;
    assert_eq!(next_text(&mut new).await, raw);
}
