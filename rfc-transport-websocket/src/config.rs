//! Explicit configuration structs (SPEC_FULL.md §2.3): Connector/Server
//! construction takes one of these rather than reading any process-wide or
//! global state.

use serde_json::Value;

/// Configuration for a WebSocket client [`crate::connector::WsConnector`].
#[derive(Debug, Clone)]
pub struct WebSocketConnectorConfig {
    /// `ws://` or `wss://` URL to dial.
    pub url: String,
    /// Opaque header sent as the client's first frame (spec.md §6).
    pub header: Value,
}

impl WebSocketConnectorConfig {
    pub fn new(url: impl Into<String>, header: Value) -> Self {
        Self { url: url.into(), header }
    }
}

/// Configuration for a WebSocket [`crate::server::WsServer`].
#[derive(Debug, Clone)]
pub struct WebSocketServerConfig {
    /// Address to bind, e.g. `127.0.0.1:30615`.
    pub addr: String,
    /// How long to wait for a newly-upgraded socket's header frame before
    /// giving up and closing it. Left as a caller-side concern per spec.md
    /// §9 Open Question (c); `None` disables the timeout.
    pub header_timeout: Option<std::time::Duration>,
}

impl WebSocketServerConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), header_timeout: None }
    }

    pub fn with_header_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.header_timeout = Some(timeout);
        self
    }
}
