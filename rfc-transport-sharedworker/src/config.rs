//! Explicit configuration (SPEC_FULL.md §2.3).

use serde_json::Value;

/// Configuration for the long-lived shared-worker listener: the socket it
/// binds and the header it replies with to every attaching client.
#[derive(Debug, Clone)]
pub struct SharedWorkerConfig {
    pub socket_path: String,
    pub header: Value,
}

impl SharedWorkerConfig {
    pub fn new(socket_path: impl Into<String>, header: Value) -> Self {
        Self { socket_path: socket_path.into(), header }
    }
}
