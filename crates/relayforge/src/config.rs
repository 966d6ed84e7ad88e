//! Relay server configuration.

use std::time::Duration;

use relayforge_transport::ListenerOptions;

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 8765;

/// Settings for a [`RelayServer`](crate::RelayServer).
///
/// Start from `RelayConfig::default()` and override what you need, or use
/// the [`RelayServerBuilder`](crate::RelayServerBuilder) setters.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to listen on. Port 0 picks a free port.
    pub bind_addr: String,

    /// Request path that WebSocket upgrades must use. `None` accepts any
    /// path. `GET /` liveness checks are answered regardless.
    pub ws_path: Option<String>,

    /// Upper bound on a single send to a single peer. A peer that does not
    /// drain its socket in time simply misses that message.
    pub send_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            ws_path: Some("/ws".to_string()),
            send_timeout: Duration::from_secs(5),
        }
    }
}

impl RelayConfig {
    pub(crate) fn listener_options(&self) -> ListenerOptions {
        ListenerOptions {
            ws_path: self.ws_path.clone(),
            ..ListenerOptions::default()
        }
    }
}
