//! SharedWorker transport adapter for the RFC runtime core (spec.md §4.6
//! "SharedWorker"): identical handshake to the Worker transport, but one
//! long-lived listener multiplexes many attaching clients over a Unix
//! domain socket instead of one process being spawned per connection.

pub mod client;
pub mod config;
pub mod error;
pub mod server;

pub use client::attach;
pub use config::SharedWorkerConfig;
pub use error::SharedWorkerError;
pub use server::serve;
