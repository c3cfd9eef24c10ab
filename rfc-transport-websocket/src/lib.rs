//! WebSocket transport adapter for the RFC runtime core (spec.md §4.6): a
//! client [`connector::connect`] that dials a URL and completes the header
//! handshake, and a server [`server::serve`] that accepts many clients and
//! hands each one, header already read, to a caller-supplied handler as an
//! [`server::Acceptor`].

pub mod config;
pub mod connector;
pub mod error;
pub mod server;
pub mod sink;

pub use config::{WebSocketConnectorConfig, WebSocketServerConfig};
pub use connector::connect;
pub use error::WsError;
pub use server::{serve, Acceptor};
pub use sink::WsSink;
