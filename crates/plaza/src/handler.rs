//! Per-connection handler: read frames, drive the session, write events.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task:
//!
//! ```text
//!   socket ──recv──→ reader loop ──→ Session ──→ RoomRegistry
//!                                       │             │
//!                                       ▼             ▼
//!                                   outbound event queue (mpsc)
//!                                             │
//!   socket ←──send_text── writer task ←───────┘
//! ```
//!
//! The reader never writes to the socket itself. Events for this
//! connection, whether produced by its own session or broadcast by
//! another, all go through the one queue, so they reach the client in
//! the order they were queued.

use std::sync::Arc;

use plaza_protocol::{Codec, ProtocolError, ServerEvent};
use plaza_room::{EventReceiver, event_channel};
use plaza_session::{IdentityVerifier, Session, SpaceDirectory};
use plaza_transport::{Connection, WebSocketConnection};
use tokio::task::JoinHandle;

use crate::PlazaError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<V, D, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<V, D, C>>,
) -> Result<(), PlazaError>
where
    V: IdentityVerifier,
    D: SpaceDirectory,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    let (outbox, events) = event_channel();
    let mut session = Session::new(Arc::clone(&state.context), outbox);
    let session_id = session.id().clone();
    tracing::info!(%conn_id, %session_id, "connection accepted");

    let writer = spawn_writer(Arc::clone(&conn), Arc::clone(&state), events);

    let mut result = Ok(());
    loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(%conn_id, %session_id, "connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, %session_id, error = %e, "recv error");
                result = Err(e.into());
                break;
            }
        };

        if let Err(e) = session.handle_frame(&state.codec, &frame).await {
            // The session has already logged the rejection and moved to
            // Closed. Nothing was queued, so the socket can go right away.
            if let Err(close_err) = conn.close().await {
                tracing::debug!(%conn_id, error = %close_err, "close failed");
            }
            result = Err(e.into());
            break;
        }
    }

    // Leaving the room drops the registry's copy of our queue handle, and
    // dropping the session drops the last one, which ends the writer.
    session.disconnect();
    drop(session);

    if let Err(e) = writer.await {
        tracing::warn!(%conn_id, %session_id, error = %e, "writer task failed");
    }

    tracing::debug!(%conn_id, %session_id, "connection handler finished");
    result
}

/// Spawns the task that drains the outbound queue onto the socket.
///
/// Runs until every sender for the queue is gone or a send fails. After a
/// failed send the remaining events are discarded; the reader will see
/// the broken connection and disconnect the session.
fn spawn_writer<V, D, C>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<V, D, C>>,
    mut events: EventReceiver,
) -> JoinHandle<()>
where
    V: IdentityVerifier,
    D: SpaceDirectory,
    C: Codec,
{
    tokio::spawn(async move {
        let conn_id = conn.id();

        while let Some(event) = events.recv().await {
            let frame = match encode_frame(&state.codec, &event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(%conn_id, kind = event.kind(), error = %e, "encode failed");
                    continue;
                }
            };

            let sent = match frame {
                Frame::Text(text) => conn.send_text(&text).await,
                Frame::Binary(bytes) => conn.send(&bytes).await,
            };

            if let Err(e) = sent {
                tracing::debug!(%conn_id, kind = event.kind(), error = %e, "send failed");
                break;
            }
        }
    })
}

enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Encodes one event, as a text frame when the codec is textual.
fn encode_frame<C: Codec>(codec: &C, event: &ServerEvent) -> Result<Frame, ProtocolError> {
    let bytes = codec.encode(event)?;
    if !codec.is_textual() {
        return Ok(Frame::Binary(bytes));
    }
    String::from_utf8(bytes)
        .map(Frame::Text)
        .map_err(|e| ProtocolError::InvalidMessage(format!("text frame is not UTF-8: {e}")))
}
