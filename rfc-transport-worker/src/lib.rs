//! Worker transport adapter for the RFC runtime core (spec.md §4.6
//! "Worker"): the parent spawns a child process and frames the Communicator
//! over its stdin/stdout, using the OPENING/OPEN/CLOSING sentinel handshake.

pub mod child;
pub mod config;
pub mod connector;
pub mod error;
pub mod framing;
pub mod sentinel;
pub mod sink;

pub use config::WorkerConfig;
pub use connector::connect;
pub use error::WorkerError;
pub use sentinel::Sentinel;
pub use sink::PipeSink;
