//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{InputEvent, Outbound, PlayerInput};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::ClientMsg;

/// Direct messages queued for one socket (initial snapshot, errors)
const OUTBOX_CAPACITY: usize = 64;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let input_tx = state.match_handle.input_tx.clone();
    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
    let (subscribed_tx, subscribed_rx) = oneshot::channel();

    let connected = PlayerInput {
        conn_id,
        event: InputEvent::Connected {
            outbox: outbox_tx,
            subscribed: subscribed_tx,
        },
        received_at: unix_millis(),
    };
    if input_tx.send(connected).await.is_err() {
        error!(conn_id = %conn_id, "Match loop is not running");
        return;
    }

    let broadcast_rx = match subscribed_rx.await {
        Ok(rx) => rx,
        Err(_) => {
            error!(conn_id = %conn_id, "Match loop dropped the connection request");
            return;
        }
    };

    let (ws_sink, ws_stream) = socket.split();
    run_session(conn_id, ws_sink, ws_stream, input_tx, outbox_rx, broadcast_rx).await;

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    conn_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut outbox_rx: mpsc::Receiver<Outbound>,
    mut broadcast_rx: broadcast::Receiver<Outbound>,
) {
    let rate_limiter = PlayerRateLimiter::new();
    let resync_tx = input_tx.clone();

    // Writer task: direct messages first, then match broadcasts
    let writer_handle = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                biased;
                direct = outbox_rx.recv() => match direct {
                    Some(text) => text,
                    None => break,
                },
                shared = broadcast_rx.recv() => match shared {
                    Ok(text) => text,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(conn_id = %conn_id, lagged_count = n, "Client lagged, skipping {} messages", n);
                        // Skipped trail increments can only be recovered from a full snapshot
                        let resync = PlayerInput {
                            conn_id,
                            event: InputEvent::Resync,
                            received_at: unix_millis(),
                        };
                        if resync_tx.try_send(resync).is_err() {
                            debug!(conn_id = %conn_id, "Input channel full, resync dropped");
                        }
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(conn_id = %conn_id, "Broadcast channel closed");
                        break;
                    }
                },
            };

            if let Err(e) = send_text(&mut ws_sink, &text).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> match loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        let input = PlayerInput {
                            conn_id,
                            event: InputEvent::Message(client_msg),
                            received_at: unix_millis(),
                        };

                        if input_tx.send(input).await.is_err() {
                            debug!(conn_id = %conn_id, "Input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to match loop
    let _ = input_tx
        .send(PlayerInput {
            conn_id,
            event: InputEvent::Disconnected,
            received_at: unix_millis(),
        })
        .await;

    writer_handle.abort();
}

/// Send pre-serialized JSON over WebSocket
async fn send_text(sink: &mut SplitSink<WebSocket, Message>, text: &str) -> Result<(), axum::Error> {
    sink.send(Message::Text(text.to_string())).await
}
