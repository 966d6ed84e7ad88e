//! In-memory connections for unit tests.
//!
//! A [`MockPeer`] is the test's side of a [`MockConnection`]: frames pushed
//! with `send_json` come out of the connection's `recv`, and whatever the
//! relay sends lands in the peer's outbox.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use relayforge_transport::{Connection, ConnectionId, TransportError};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};

/// `Some(Some(frame))` is a frame, `Some(None)` a transport fault.
type Inbound = Option<Vec<u8>>;

pub(crate) struct MockConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    fail_sends: AtomicBool,
    stall_sends: AtomicBool,
    closed: AtomicBool,
}

impl MockConnection {
    /// Every later send fails as if the peer had vanished.
    pub(crate) fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Every later send hangs forever.
    pub(crate) fn stall_sends(&self) {
        self.stall_sends.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.stall_sends.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed("mock send refused".into()));
        }
        self.outbound
            .send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("mock peer dropped".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.inbound.lock().await.recv().await {
            Some(Some(frame)) => Ok(Some(frame)),
            Some(None) => Err(TransportError::ReceiveFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "mock fault",
            ))),
            None => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// The remote end of a [`MockConnection`].
pub(crate) struct MockPeer {
    pub(crate) conn: Arc<MockConnection>,
    inbox: Option<mpsc::UnboundedSender<Inbound>>,
    outbox: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MockPeer {
    pub(crate) fn new(id: u64) -> Self {
        let (inbox, inbound) = mpsc::unbounded_channel();
        let (outbound, outbox) = mpsc::unbounded_channel();
        let conn = Arc::new(MockConnection {
            id: ConnectionId::new(id),
            inbound: Mutex::new(inbound),
            outbound,
            fail_sends: AtomicBool::new(false),
            stall_sends: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });
        Self {
            conn,
            inbox: Some(inbox),
            outbox,
        }
    }

    pub(crate) fn send_json(&self, value: Value) {
        self.send_raw(value.to_string().as_bytes());
    }

    pub(crate) fn send_raw(&self, frame: &[u8]) {
        if let Some(inbox) = &self.inbox {
            inbox.send(Some(frame.to_vec())).expect("connection alive");
        }
    }

    /// Makes the connection's next `recv` fail.
    pub(crate) fn fault(&self) {
        if let Some(inbox) = &self.inbox {
            inbox.send(None).expect("connection alive");
        }
    }

    /// Closes the peer's side; the connection's `recv` then returns `None`.
    pub(crate) fn disconnect(&mut self) {
        self.inbox = None;
    }

    /// Next frame the relay sent to this peer, parsed as JSON.
    pub(crate) async fn next_json(&mut self) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(1), self.outbox.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("outbox closed");
        serde_json::from_slice(&frame).expect("frame is JSON")
    }

    /// Asserts nothing arrives for a short while.
    pub(crate) async fn assert_silent(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(50), self.outbox.recv()).await;
        if let Ok(Some(frame)) = next {
            panic!("unexpected frame: {}", String::from_utf8_lossy(&frame));
        }
    }
}
