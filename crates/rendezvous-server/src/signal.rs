use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use rendezvous_common::Envelope;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::keys::generate_user_key;
use crate::registry::{PeerChannel, Registration};
use crate::state::AppState;

const WS_MAX_TEXT_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(default)]
    pub key: Option<String>,
}

/// GET /ws?key=USER_KEY
///
/// Upgrades to a signaling channel registered under `key`. Without a key
/// the server assigns one and reports it in the welcome envelope.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectQuery>,
) -> impl IntoResponse {
    let user_key = match params.key.filter(|key| !key.trim().is_empty()) {
        Some(key) => key,
        None => generate_user_key(state.key_length),
    };

    ws.max_message_size(WS_MAX_TEXT_BYTES)
        .max_frame_size(WS_MAX_TEXT_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state, user_key))
}

async fn handle_socket(stream: WebSocket, state: AppState, user_key: String) {
    let (sender, mut receiver) = stream.split();
    let channel = PeerChannel::new(sender);

    let welcome = match Envelope::welcome(&user_key).encode() {
        Ok(json) => json,
        Err(err) => {
            warn!("failed to encode welcome for {}: {}", user_key, err);
            return;
        }
    };

    // Register and greet under the socket lock: relayed frames wait behind
    // the welcome.
    let registration = {
        let mut sink = channel.lock().await;
        let registration = Registration::new(
            state.connections.clone(),
            user_key.clone(),
            channel.clone(),
        );
        if let Err(err) = sink.send(Message::Text(welcome)).await {
            warn!("failed to send welcome to {}: {}", user_key, err);
            return;
        }
        registration
    };
    info!("client connected with key {}", registration.user_key());

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) => {
                warn!("receive error from {}: {}", user_key, err);
                break;
            }
        };

        match msg {
            Message::Text(text) => match state.router.dispatch(&user_key, &text).await {
                Ok(routed) => debug!("routed message from {}: {:?}", user_key, routed),
                Err(err) => warn!("dropping envelope from {}: {}", user_key, err),
            },
            Message::Binary(data) => {
                debug!("ignoring {} byte binary frame from {}", data.len(), user_key);
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(frame) => {
                debug!("client {} sent close: {:?}", user_key, frame);
                break;
            }
        }
    }

    drop(registration);
    channel.close().await;
    info!("client disconnected: {}", user_key);
}
