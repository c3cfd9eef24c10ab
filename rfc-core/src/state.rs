//! Lifecycle state shared by `Communicator`, `Connector` and `Server`
//! (spec §3 "Lifecycle states", §4.7).

use std::fmt;

/// NONE → OPENING → OPEN → CLOSING → CLOSED. Transitions are monotone: no
/// sequence of operations can move a state machine backwards (spec §8
/// "State monotonicity").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Freshly constructed, `open`/`connect` not yet called.
    #[default]
    None,
    /// `open`/`connect` called, handshake in progress.
    Opening,
    /// Handshake complete; Calls may be sent and received.
    Open,
    /// `close()` called or the transport failed; pending calls are being
    /// failed, the transport is being torn down.
    Closing,
    /// Terminal. The pending-call table is empty (invariant 3).
    Closed,
}

impl State {
    /// Whether `next` is a legal transition from `self` under the monotone
    /// NONE→OPENING→OPEN→CLOSING→CLOSED ordering.
    pub fn can_advance_to(self, next: State) -> bool {
        use State::*;
        matches!(
            (self, next),
            (None, Opening)
                | (Opening, Open)
                | (Opening, Closed) // handshake failure, spec §4.7
                | (Open, Closing)
                | (Closing, Closed)
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::None => "NONE",
            State::Opening => "OPENING",
            State::Open => "OPEN",
            State::Closing => "CLOSING",
            State::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}
