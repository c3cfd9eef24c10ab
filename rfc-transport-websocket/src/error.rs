//! Transport-specific error taxonomy (SPEC_FULL.md §2.1). Wraps dialing,
//! handshake and framing failures that have no equivalent in the transport-
//! independent `rfc_core::RfcError`; anything that does cross back into
//! `Communicator` territory is folded into `RfcError::TransportError`.

use failure::Fail;

pub type FallibleResult<T> = Result<T, failure::Error>;

#[derive(Debug, Fail)]
pub enum WsError {
    #[fail(display = "failed to dial {}: {}", url, reason)]
    DialFailed { url: String, reason: String },

    #[fail(display = "server rejected the handshake: {} {}", code, reason)]
    HandshakeRejected { code: u16, reason: String },

    #[fail(display = "peer closed the connection before completing the handshake")]
    HandshakeAborted,

    #[fail(display = "first frame was not a valid header envelope: {}", _0)]
    InvalidHeaderFrame(String),

    #[fail(display = "received a non-text frame where a handshake frame was expected")]
    UnexpectedFrameKind,

    #[fail(display = "failed to bind listener on {}: {}", addr, reason)]
    BindFailed { addr: String, reason: String },
}
