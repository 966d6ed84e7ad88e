//! WebSocket transport built on `axum`.
//!
//! One `axum::Router` serves the listening port. `GET`/`HEAD /` answers
//! liveness checks from hosting platforms and load balancers, and the
//! configured path upgrades to a WebSocket. Upgraded connections are handed
//! to [`WebSocketTransport::accept`] through a bounded channel, so the
//! relay never sees plain HTTP traffic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Listener settings for [`WebSocketTransport`].
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    /// Only upgrades on this request path are accepted; others get a 404.
    /// `None` accepts upgrades on any path.
    pub ws_path: Option<String>,

    /// How many upgraded connections may wait for `accept()`.
    pub backlog: usize,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            ws_path: None,
            backlog: 64,
        }
    }
}

/// Router state shared by every request.
struct Listener {
    tx: mpsc::Sender<WebSocketConnection>,
    next_id: AtomicU64,
    upgrades_on_root: bool,
}

impl Listener {
    fn upgrade(self: Arc<Self>, ws: WebSocketUpgrade) -> Response {
        ws.on_upgrade(move |socket| async move {
            let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
            let (sink, stream) = socket.split();
            let conn = WebSocketConnection {
                id,
                sink: Mutex::new(sink),
                stream: Mutex::new(stream),
            };

            tracing::debug!(%id, "accepted WebSocket connection");
            if self.tx.send(conn).await.is_err() {
                tracing::debug!(%id, "transport closed, dropping connection");
            }
        })
    }
}

/// Builds the router: liveness on `/`, upgrades on `ws_path` (or anywhere).
fn router(options: &ListenerOptions, tx: mpsc::Sender<WebSocketConnection>) -> Router {
    let ws_path = options.ws_path.as_deref().filter(|path| *path != "/");
    let listener = Arc::new(Listener {
        tx,
        next_id: AtomicU64::new(1),
        upgrades_on_root: ws_path.is_none(),
    });

    let router = Router::new().route("/", get(root));
    let router = match (ws_path, options.ws_path.is_some()) {
        (Some(path), _) => router.route(path, any(upgrade)),
        // Only `/` was configured; every other path is a 404.
        (None, true) => router,
        (None, false) => router.fallback(upgrade),
    };
    router.with_state(listener)
}

/// `GET /` (and `HEAD /`, which axum derives from it).
async fn root(
    State(listener): State<Arc<Listener>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) if listener.upgrades_on_root => listener.upgrade(ws),
        _ => "OK".into_response(),
    }
}

/// Upgrade route. Plain HTTP requests here are not something we serve.
async fn upgrade(
    State(listener): State<Arc<Listener>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => listener.upgrade(ws),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Rejects paths `axum` would panic on when building the route table.
fn validate_path(path: &str) -> Result<(), TransportError> {
    if path.starts_with('/') && !path.contains(['{', '}', ':', '*']) {
        Ok(())
    } else {
        Err(TransportError::InvalidPath(path.to_string()))
    }
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<WebSocketConnection>,
    server: JoinHandle<()>,
    closed: AtomicBool,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport with default [`ListenerOptions`].
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with(addr, ListenerOptions::default()).await
    }

    /// Binds a new WebSocket transport to the given address.
    pub async fn bind_with(
        addr: &str,
        options: ListenerOptions,
    ) -> Result<Self, TransportError> {
        if let Some(path) = &options.ws_path {
            validate_path(path)?;
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr =
            listener.local_addr().map_err(TransportError::AcceptFailed)?;

        let (tx, incoming) = mpsc::channel(options.backlog.max(1));
        let app = router(&options, tx);

        tracing::info!(
            %local_addr,
            ws_path = options.ws_path.as_deref().unwrap_or("*"),
            "WebSocket transport listening"
        );

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "HTTP server stopped");
            }
        });

        Ok(Self {
            local_addr,
            incoming,
            server,
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }

    /// Stops the HTTP server. Upgraded connections run in their own tasks
    /// and are not affected.
    async fn shutdown(&self) -> Result<(), Self::Error> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.server.abort();
            tracing::info!(local_addr = %self.local_addr, "WebSocket transport stopped");
        }
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A single WebSocket connection.
///
/// The write half and the read half are locked independently, so the
/// owning task can sit in [`recv`](Connection::recv) while other tasks
/// send to this peer.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Sends `data` as a text frame when it is valid UTF-8, otherwise as a
    /// binary frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.sink.lock().await.send(msg).await.map_err(write_error)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(write_error)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

fn write_error(e: axum::Error) -> TransportError {
    TransportError::SendFailed(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        e,
    ))
}

#[cfg(test)]
mod tests {
    //! Router tests run requests through `tower::ServiceExt::oneshot`; no
    //! socket is bound. Upgrades need a real connection and live in
    //! `tests/websocket.rs`.

    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use super::*;

    fn app(ws_path: Option<&str>) -> Router {
        let (tx, _rx) = mpsc::channel(1);
        router(
            &ListenerOptions {
                ws_path: ws_path.map(str::to_string),
                ..ListenerOptions::default()
            },
            tx,
        )
    }

    async fn request(app: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_root_get_returns_ok() {
        let (status, body) = request(app(Some("/ws")), Method::GET, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn test_root_head_returns_empty_body() {
        let (status, body) = request(app(Some("/ws")), Method::HEAD, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_root_post_is_method_not_allowed() {
        let (status, _) = request(app(Some("/ws")), Method::POST, "/").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let (status, _) = request(app(Some("/ws")), Method::GET, "/elsewhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plain_get_on_ws_path_returns_404() {
        let (status, _) = request(app(Some("/ws")), Method::GET, "/ws").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_any_path_mode_still_answers_root_and_404s_plain_requests() {
        let (status, body) = request(app(None), Method::GET, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");

        let (status, _) = request(app(None), Method::GET, "/lobby").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validate_path_rejects_route_syntax() {
        assert!(validate_path("/ws").is_ok());
        assert!(validate_path("/games/lobby").is_ok());
        for bad in ["ws", "/{room}", "/:room", "/*rest"] {
            assert!(
                matches!(validate_path(bad), Err(TransportError::InvalidPath(_))),
                "{bad} should be rejected"
            );
        }
    }
}
