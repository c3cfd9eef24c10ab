//! Connector and Server lifecycle state machines (spec §4.7). These are
//! transport-independent: each transport crate drives one `Connector` per
//! dialed (or accepted) connection and, for multi-client transports, one
//! `Server` for the listener itself. All the actual I/O — dialing,
//! listening, handshaking — belongs to the transport; this module only
//! enforces the monotone state transitions and the associated error kinds.

use crate::communicator::Communicator;
use crate::error::{FallibleResult, RfcError};
use crate::registry::Provider;
use crate::state::State;
use std::cell::Cell;
use std::rc::Rc;

/// One `open`/`connect`-side (or accepted-connection-side — see the
/// `Acceptor` glossary entry in spec) endpoint: wraps a single
/// `Communicator` and exposes exactly the lifecycle operations spec §4.7
/// names for a Connector.
#[derive(Debug)]
pub struct Connector {
    communicator: Rc<Communicator>,
}

impl Connector {
    pub fn new() -> Self {
        Self { communicator: Communicator::new() }
    }

    /// The Communicator this Connector drives. Transport adapters attach
    /// their `Sink` to it and feed it decoded frames via `reply_data`.
    pub fn communicator(&self) -> &Rc<Communicator> {
        &self.communicator
    }

    pub fn state(&self) -> State {
        self.communicator.state()
    }

    /// `connect(endpoint, header)`: NONE → OPENING. The transport is
    /// expected to start its handshake immediately after this returns.
    pub fn begin_connect(&self) -> FallibleResult<()> {
        if self.communicator.state() != State::None {
            return Err(RfcError::AlreadyOpen.into());
        }
        self.communicator.transition(State::Opening)
    }

    /// The handshake completed: installs `provider` (if any) and
    /// transitions OPENING → OPEN.
    pub fn mark_open(&self, provider: Option<Rc<dyn Provider>>) -> FallibleResult<()> {
        self.communicator.set_provider(provider)?;
        self.communicator.transition(State::Open)
    }

    /// The handshake failed: OPENING → CLOSED directly, not back to NONE
    /// (spec §4.7: "Transport error in OPENING → CLOSED"). The pending
    /// table is empty at this point since no Call could have been sent yet.
    pub fn fail_connect(&self) -> FallibleResult<()> {
        self.communicator.transition(State::Closed)
    }

    /// `close()`: OPEN → CLOSING, which runs `destructor()` (failing every
    /// pending call) before returning. Calling this from any state other
    /// than OPEN is a synchronous `NotReady` error (spec §4.7).
    pub fn close(&self) -> FallibleResult<()> {
        if self.communicator.state() != State::Open {
            return Err(RfcError::NotReady(self.communicator.state()).into());
        }
        self.communicator.transition(State::Closing)
    }

    /// The transport has finished tearing itself down after `close()`:
    /// CLOSING → CLOSED.
    pub fn finish_close(&self) -> FallibleResult<()> {
        self.communicator.transition(State::Closed)
    }

    /// The transport reported an unrecoverable error. In OPEN this fails
    /// every pending call with `ConnectionClosed` before landing on
    /// CLOSED; in OPENING it lands on CLOSED directly with an empty
    /// pending table (spec §4.7).
    pub fn fail(&self) -> FallibleResult<()> {
        match self.communicator.state() {
            State::Open => {
                self.communicator.transition(State::Closing)?;
                self.communicator.transition(State::Closed)
            }
            State::Opening => self.communicator.transition(State::Closed),
            _ => Ok(()),
        }
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

/// The listener-side state machine for a multi-client transport (spec
/// §4.7 "Server"). Tracks only the listener's own lifecycle; each accepted
/// connection gets its own [`Connector`].
#[derive(Debug, Default)]
pub struct Server {
    state: Cell<State>,
}

impl Server {
    pub fn new() -> Self {
        Self { state: Cell::new(State::None) }
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    /// `open(port, handler)`: NONE → OPENING.
    pub fn begin_open(&self) -> FallibleResult<()> {
        if self.state.get() != State::None {
            return Err(RfcError::AlreadyOpen.into());
        }
        self.transition(State::Opening)
    }

    /// The listener is bound and accepting connections: OPENING → OPEN.
    pub fn mark_listening(&self) -> FallibleResult<()> {
        self.transition(State::Open)
    }

    /// `close()`: OPEN → CLOSING. The transport stops accepting new
    /// upgrades immediately and individually closes in-flight
    /// Communicators (spec §4.7).
    pub fn close(&self) -> FallibleResult<()> {
        if self.state.get() != State::Open {
            return Err(RfcError::NotReady(self.state.get()).into());
        }
        self.transition(State::Closing)
    }

    /// All sockets drained and the listener closed: CLOSING → CLOSED.
    pub fn finish_close(&self) -> FallibleResult<()> {
        self.transition(State::Closed)
    }

    /// Re-opening from CLOSED is allowed (spec §4.7): resets to NONE so
    /// the next `begin_open` succeeds, backed by a freshly constructed
    /// listener on the transport side.
    pub fn reset_for_reopen(&self) -> FallibleResult<()> {
        if self.state.get() != State::Closed {
            return Err(RfcError::NotReady(self.state.get()).into());
        }
        self.state.set(State::None);
        Ok(())
    }

    fn transition(&self, next: State) -> FallibleResult<()> {
        let current = self.state.get();
        if !current.can_advance_to(next) {
            return Err(RfcError::ProtocolError(format!("illegal transition {current} -> {next}")).into());
        }
        self.state.set(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_close_from_non_open_states_is_not_ready() {
        let connector = Connector::new();
        assert!(matches!(
            connector.close().unwrap_err().downcast::<RfcError>().unwrap(),
            RfcError::NotReady(State::None)
        ));
        connector.begin_connect().unwrap();
        assert!(matches!(
            connector.close().unwrap_err().downcast::<RfcError>().unwrap(),
            RfcError::NotReady(State::Opening)
        ));
    }

    #[test]
    fn connector_happy_path_is_monotone() {
        let connector = Connector::new();
        connector.begin_connect().unwrap();
        assert_eq!(connector.state(), State::Opening);
        connector.mark_open(None).unwrap();
        assert_eq!(connector.state(), State::Open);
        connector.close().unwrap();
        assert_eq!(connector.state(), State::Closing);
        connector.finish_close().unwrap();
        assert_eq!(connector.state(), State::Closed);
    }

    #[test]
    fn connector_handshake_failure_lands_on_closed_not_none() {
        let connector = Connector::new();
        connector.begin_connect().unwrap();
        connector.fail_connect().unwrap();
        assert_eq!(connector.state(), State::Closed);
        assert!(connector.communicator().state() == State::Closed);
    }

    #[test]
    fn second_connect_while_open_is_already_open() {
        let connector = Connector::new();
        connector.begin_connect().unwrap();
        assert!(matches!(
            connector.begin_connect().unwrap_err().downcast::<RfcError>().unwrap(),
            RfcError::AlreadyOpen
        ));
    }

    #[test]
    fn server_reopen_after_close_is_allowed() {
        let server = Server::new();
        server.begin_open().unwrap();
        server.mark_listening().unwrap();
        server.close().unwrap();
        server.finish_close().unwrap();
        assert_eq!(server.state(), State::Closed);
        server.reset_for_reopen().unwrap();
        assert_eq!(server.state(), State::None);
        server.begin_open().unwrap();
        assert_eq!(server.state(), State::Opening);
    }
}
