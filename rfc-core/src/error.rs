//! The error taxonomy shared by the Communicator core and every transport
//! adapter (see spec §7). `FallibleResult` mirrors the teacher's
//! `ide::controller::FallibleResult` alias: a `failure::Error` catch-all so
//! transport-specific errors (a socket failure, a spawn failure) compose
//! with protocol-level ones without a conversion dance at every call site.

use crate::state::State;
use failure::Fail;

/// `Result` alias used throughout the crate and its sibling transport
/// crates for any operation that can fail.
pub type FallibleResult<T> = Result<T, failure::Error>;

/// Error taxonomy from spec §7. Variants are a classification, not a 1:1
/// mapping to wire values; `UserError` and the two localised variants are
/// serialised into a `Return`, the rest are fatal to the Communicator.
#[derive(Debug, Fail)]
pub enum RfcError {
    /// Operation required an OPEN channel but the Communicator was in
    /// `state`. Carries the offending state so callers get a distinct
    /// subcode per source state, as spec §7 asks for.
    #[fail(display = "operation requires state OPEN, but current state is {}", _0)]
    NotReady(State),

    /// `open`/`connect` was called while not in NONE.
    #[fail(display = "connector/server is already open or opening")]
    AlreadyOpen,

    /// A pending call was rejected because the transport closed or the
    /// Communicator entered CLOSING.
    #[fail(display = "connection closed")]
    ConnectionClosed,

    /// A frame could not be decoded, or an unexpected shape appeared where
    /// an Invoke was expected (e.g. a sentinel collision). Fatal.
    #[fail(display = "protocol error: {}", _0)]
    ProtocolError(String),

    /// An incoming Call's `listener` path did not resolve against the
    /// provider. Non-fatal: serialised into a failed Return.
    #[fail(display = "listener not found: {}", _0)]
    ListenerNotFound(String),

    /// An incoming Call targeted a handle uid that has already been
    /// released (or never existed, which under invariant 4 is
    /// indistinguishable from "already released"). Non-fatal.
    #[fail(display = "handle {} has been released", _0)]
    HandleReleased(u64),

    /// The user's provider function threw. Carries the serialised
    /// `{name, message, stack}` triple so it can be re-thrown verbatim on
    /// the caller side.
    #[fail(display = "remote error {}: {}", name, message)]
    UserError {
        /// Error type name as reported by the remote provider function.
        name: String,
        /// Human-readable error message.
        message: String,
        /// Optional stack trace, if the remote side provided one.
        stack: Option<String>,
    },

    /// The underlying OS/socket/worker transport failed. Fatal.
    #[fail(display = "transport error: {}", _0)]
    TransportError(String),
}

impl RfcError {
    /// Serialises a `UserError` (or any other error) into the
    /// `{name, message, stack}` triple carried by a failed Return's `value`.
    pub fn to_return_payload(err: &failure::Error) -> serde_json::Value {
        if let Some(RfcError::UserError { name, message, stack }) = err.downcast_ref() {
            return serde_json::json!({
                "name": name,
                "message": message,
                "stack": stack,
            });
        }
        serde_json::json!({
            "name": "Error",
            "message": err.to_string(),
            "stack": serde_json::Value::Null,
        })
    }

    /// Reconstructs an error from a failed Return's `value` payload, the
    /// mirror image of [`RfcError::to_return_payload`].
    pub fn from_return_payload(value: &serde_json::Value) -> RfcError {
        let name = value.get("name").and_then(|v| v.as_str()).unwrap_or("Error").to_string();
        let message =
            value.get("message").and_then(|v| v.as_str()).unwrap_or("remote call failed").to_string();
        let stack = value.get("stack").and_then(|v| v.as_str()).map(str::to_string);
        RfcError::UserError { name, message, stack }
    }
}
