//! Best-effort fan-out to peers.
//!
//! Every send is an explicit `Result`; failures are logged and counted per
//! recipient and never leave this module. One dead or stalled peer cannot
//! keep a message from the others, nor take down the sender's connection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use crate::{RelayConnection, RelayError};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub(crate) delivered: usize,
    pub(crate) failed: usize,
}

/// Sends `payload` to one peer, giving up after `send_timeout`.
pub(crate) async fn deliver<C: RelayConnection>(
    conn: &C,
    payload: &[u8],
    send_timeout: Duration,
) -> Result<(), RelayError> {
    match tokio::time::timeout(send_timeout, conn.send(payload)).await {
        Ok(sent) => sent.map_err(RelayError::Transport),
        Err(_) => Err(RelayError::SendTimeout(conn.id())),
    }
}

/// Sends `payload` to every recipient concurrently.
pub(crate) async fn broadcast<C: RelayConnection>(
    recipients: &[Arc<C>],
    payload: &[u8],
    send_timeout: Duration,
) -> Delivery {
    let attempts = recipients.iter().map(|conn| async move {
        let sent = deliver(conn.as_ref(), payload, send_timeout).await;
        if let Err(e) = &sent {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, recipient skipped");
        }
        sent.is_ok()
    });

    let mut delivery = Delivery::default();
    for ok in join_all(attempts).await {
        if ok {
            delivery.delivered += 1;
        } else {
            delivery.failed += 1;
        }
    }
    delivery
}
