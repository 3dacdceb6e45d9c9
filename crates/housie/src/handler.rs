//! Per-connection handler.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`], plus a writer task:
//!   1. Register an outbound queue with the connection registry
//!   2. Writer: drain the queue, stamp `seq`/`timestamp`, encode, send
//!   3. Reader: receive frames → heartbeat → decode → dispatch
//!   4. On close: unregister and run the "player left" side effect

use std::sync::Arc;

use housie_protocol::{now_millis, Codec, ErrorCode, Inbound, Outbound};
use housie_session::{Authenticator, Delivery};
use housie_transport::Connection;
use tokio::sync::mpsc;

use crate::machine::GameStateMachine;

/// Serves one connection from accept to close.
///
/// Requests from a connection are handled one at a time, in the order
/// they arrived.
pub async fn handle_connection<C, A, K>(conn: C, machine: Arc<GameStateMachine<A>>, codec: Arc<K>)
where
    C: Connection,
    A: Authenticator,
    K: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let registry = Arc::clone(machine.registry());

    let (outbox, queue) = mpsc::unbounded_channel();
    if !registry.register(conn_id, outbox) {
        tracing::warn!(%conn_id, "connection id already registered, dropping");
        let _ = conn.close().await;
        return;
    }
    tracing::debug!(%conn_id, "connection registered");

    let writer = tokio::spawn(write_loop(Arc::clone(&conn), queue, Arc::clone(&codec)));

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        if !registry.heartbeat(conn_id) {
            // Evicted by the sweeper while we were parked in recv.
            tracing::debug!(%conn_id, "frame from evicted connection, closing");
            break;
        }

        let inbound: Inbound = match codec.decode(&data) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode request");
                machine.reject(conn_id, None, ErrorCode::InvalidRequest, e.to_string());
                continue;
            }
        };
        tracing::trace!(%conn_id, request = inbound.request.kind(), "request received");
        machine.handle(conn_id, inbound).await;
    }

    // Dropping the registry entry drops the outbox, which ends the writer.
    machine.disconnect(conn_id).await;
    if let Err(e) = writer.await {
        tracing::warn!(%conn_id, error = %e, "writer task failed");
    }
    let _ = conn.close().await;
}

/// Drains a connection's queue onto the wire.
///
/// Sequence numbers start at 1 and are assigned here, so they follow the
/// exact order frames are written.
async fn write_loop<C, K>(conn: Arc<C>, mut queue: mpsc::UnboundedReceiver<Delivery>, codec: Arc<K>)
where
    C: Connection,
    K: Codec,
{
    let conn_id = conn.id();
    let mut seq: u64 = 0;

    while let Some(delivery) = queue.recv().await {
        let frame = Outbound {
            seq: seq + 1,
            timestamp: now_millis(),
            request_id: delivery.request_id,
            event: delivery.event,
        };
        let bytes = match codec.encode(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%conn_id, kind = frame.event.kind(), error = %e, "failed to encode event");
                continue;
            }
        };
        seq += 1;
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, closing connection");
            break;
        }
    }

    // Unblocks the reader if it's still parked in recv.
    let _ = conn.close().await;
}
