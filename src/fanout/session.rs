//! WebSocket session for one live client.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::LiveFanout;

/// Pump frames from the fanout to `socket` until either side goes away.
///
/// Client frames other than close are ignored. The client is deregistered
/// however the session ends.
pub async fn run_session(mut socket: WebSocket, fanout: Arc<LiveFanout>, shutdown: CancellationToken) {
    let (client_id, mut frames) = fanout.add_client();
    info!(client_id, clients = fanout.client_count(), "live client connected");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            frame = frames.recv() => match frame {
                Some(text) => {
                    if let Err(e) = socket.send(Message::Text(text)).await {
                        debug!(client_id, error = %e, "live client send failed");
                        break;
                    }
                }
                // Evicted by the slow-client policy.
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(client_id, error = %e, "live client receive failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    fanout.remove_client(client_id);
    info!(client_id, clients = fanout.client_count(), "live client disconnected");
}
