//! Transport-specific error taxonomy (SPEC_FULL.md §2.1), mirroring the
//! sibling transport crates.

use failure::Fail;

pub type FallibleResult<T> = Result<T, failure::Error>;

#[derive(Debug, Fail)]
pub enum SharedWorkerError {
    #[fail(display = "failed to bind unix socket {}: {}", path, reason)]
    BindFailed { path: String, reason: String },

    #[fail(display = "failed to connect to unix socket {}: {}", path, reason)]
    ConnectFailed { path: String, reason: String },

    #[fail(display = "peer closed the connection before completing the handshake")]
    HandshakeAborted,
}
