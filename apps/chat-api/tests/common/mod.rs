//! Shared helpers for end-to-end WebSocket tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::Value;
use tokio::time;
use tokio_tungstenite::tungstenite;

use chat_api::auth::TokenClaims;
use chat_api::config::Config;
use chat_api::store::memory::MemoryStore;
use chat_api::AppState;

pub const TOKEN_SECRET: &str = "test-secret";
pub const TOKEN_ISSUER: &str = "chat-hub";

pub type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start a real TCP server for WebSocket testing. Returns (addr, state,
/// store); the server runs in the background.
pub async fn start_server() -> (SocketAddr, AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = Config {
        token_secret: TOKEN_SECRET.to_string(),
        token_issuer: TOKEN_ISSUER.to_string(),
        port: 0,
    };
    let state = AppState::new(config, store.clone());
    let app = chat_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, store)
}

/// Mint a bearer token that expires `exp_offset_secs` from now.
pub fn mint_token_with_expiry(user_id: &str, username: &str, exp_offset_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = TokenClaims {
        iss: TOKEN_ISSUER.to_string(),
        sub: user_id.to_string(),
        iat: now,
        exp: now + exp_offset_secs,
        username: username.to_string(),
        email: Some(format!("{username}@example.com")),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TOKEN_SECRET.as_bytes()),
    )
    .expect("encode token")
}

pub fn mint_token(user_id: &str, username: &str) -> String {
    mint_token_with_expiry(user_id, username, 3600)
}

/// Open a WebSocket without waiting for any server event.
pub async fn connect_raw(addr: SocketAddr, token: &str) -> WsClient {
    let url = format!("ws://{addr}/ws?token={token}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

/// Connect and consume the `connected` ack. Panics if the ack is missing
/// or malformed.
pub async fn connect(addr: SocketAddr, token: &str, expected_user: &str) -> WsClient {
    let mut ws = connect_raw(addr, token).await;
    let data = wait_for_event(&mut ws, "connected").await;
    assert_eq!(data["userId"], expected_user);
    assert!(data["socketId"].as_str().unwrap().starts_with("conn_"));
    ws
}

/// Send a client request envelope.
pub async fn send_event(ws: &mut WsClient, event: &str, data: Value) {
    let envelope = serde_json::json!({ "event": event, "data": data });
    ws.send(tungstenite::Message::Text(envelope.to_string().into()))
        .await
        .expect("send event");
}

/// Read events until one with the given name arrives, skipping the rest.
pub async fn wait_for_event(ws: &mut WsClient, name: &str) -> Value {
    let deadline = Duration::from_secs(5);
    time::timeout(deadline, async {
        loop {
            let msg = ws
                .next()
                .await
                .unwrap_or_else(|| panic!("stream ended waiting for {name}"))
                .expect("ws read error");
            let text = match msg {
                tungstenite::Message::Text(text) => text,
                tungstenite::Message::Close(_) => panic!("closed waiting for {name}"),
                _ => continue,
            };
            let value: Value = serde_json::from_str(&text).expect("parse event");
            if value["event"] == name {
                return value["data"].clone();
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timeout waiting for {name}"))
}

/// Assert no event with the given name arrives within the window.
pub async fn assert_no_event(ws: &mut WsClient, name: &str, window: Duration) {
    let result = time::timeout(window, async {
        loop {
            let msg = match ws.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(_)) | None => return,
            };
            if let tungstenite::Message::Text(text) = msg {
                let value: Value = serde_json::from_str(&text).expect("parse event");
                if value["event"] == name {
                    panic!("unexpected {name} event: {value}");
                }
            }
        }
    })
    .await;
    // Timing out is the success case: nothing matched within the window.
    let _ = result;
}

/// Assert the connection closes without delivering any text event.
pub async fn assert_closed_silently(ws: &mut WsClient) {
    let deadline = Duration::from_secs(5);
    time::timeout(deadline, async {
        loop {
            match ws.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    panic!("expected silent close, got event: {text}")
                }
                Some(Ok(tungstenite::Message::Close(_))) | None => return,
                Some(Ok(_)) => continue,
                Some(Err(_)) => return,
            }
        }
    })
    .await
    .expect("timeout waiting for close");
}
