//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;

use crate::auth::{self, AuthError, Principal};
use crate::AppState;

use super::events::{ClientEvent, EventName, ServerEvent};
use super::fanout::OutboundEvent;
use super::handler;
use super::session::ConnectionSession;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: Option<String>,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // Verify before entering the socket loop. A failed handshake surfaces
    // to the client as an abrupt close with no payload.
    let principal = authenticate(&state, params.token.as_deref(), &headers);
    ws.on_upgrade(move |socket| handle_connection(socket, state, principal))
}

fn authenticate(
    state: &AppState,
    query_token: Option<&str>,
    headers: &HeaderMap,
) -> Result<Principal, AuthError> {
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let token = auth::extract_token(query_token, authorization)?;
    auth::verify_token(
        token,
        &state.config.token_secret,
        &state.config.token_issuer,
    )
}

async fn handle_connection(
    mut socket: WebSocket,
    state: AppState,
    principal: Result<Principal, AuthError>,
) {
    let principal = match principal {
        Ok(principal) => principal,
        Err(err) => {
            tracing::debug!(?err, "handshake rejected");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let session = Arc::new(ConnectionSession::new(principal));
    let (mut ws_tx, ws_rx) = socket.split();

    // Subscribe before announcing presence so this connection also observes
    // its own user's status transition.
    let bus_rx = state.broadcast.subscribe();

    let connected = handler::on_connect(&state, &session).await;
    if ws_tx
        .send(Message::Text(connected.to_json().into()))
        .await
        .is_err()
    {
        handler::on_disconnect(&state, &session).await;
        return;
    }

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id(),
        "session established"
    );

    run_session(&state, &session, ws_tx, ws_rx, bus_rx).await;

    handler::on_disconnect(&state, &session).await;

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id(),
        "session ended"
    );
}

/// Main session loop: handle client requests, forward fan-out events.
///
/// A single connection's requests are processed one at a time in arrival
/// order; different connections run concurrently in their own tasks.
async fn run_session(
    state: &AppState,
    session: &Arc<ConnectionSession>,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut bus_rx: broadcast::Receiver<Arc<OutboundEvent>>,
) {
    loop {
        tokio::select! {
            // Client sends us a request.
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => handler::dispatch(state, session, event).await,
                            Err(_) => ServerEvent::new(
                                EventName::ERROR,
                                json!({ "error": "Unrecognized event" }),
                            ),
                        };
                        if ws_tx
                            .send(Message::Text(reply.to_json().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.connection_id, "ws read error");
                        break;
                    }
                    // Binary frames are not part of the protocol.
                    _ => continue,
                }
            }

            // Fan-out event from the hub.
            result = bus_rx.recv() => {
                match result {
                    Ok(event) => {
                        if !session.wants(&event.recipient) {
                            continue;
                        }
                        let outbound = ServerEvent::new(&event.name, event.data.clone());
                        if ws_tx
                            .send(Message::Text(outbound.to_json().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            connection_id = %session.connection_id,
                            skipped,
                            "session lagged behind broadcast"
                        );
                        // Continue — delivery is best-effort.
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }
}
