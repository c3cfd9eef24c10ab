//! Transport-specific error taxonomy (SPEC_FULL.md §2.1), mirroring the
//! shape of `rfc_transport_websocket::error::WsError`.

use failure::Fail;

pub type FallibleResult<T> = Result<T, failure::Error>;

#[derive(Debug, Fail)]
pub enum WorkerError {
    #[fail(display = "failed to spawn child process {}: {}", program, reason)]
    SpawnFailed { program: String, reason: String },

    #[fail(display = "child process exited before completing the handshake")]
    HandshakeAborted,

    #[fail(display = "expected the {} sentinel, got line {:?}", expected, got)]
    UnexpectedSentinel { expected: &'static str, got: String },

    #[fail(display = "child was not given a header argument (__m_pArgs)")]
    MissingHeaderArgument,

    #[fail(display = "header argument was not valid JSON: {}", _0)]
    InvalidHeaderArgument(String),

    #[fail(display = "failed to write to child stdin: {}", _0)]
    WriteFailed(String),
}
