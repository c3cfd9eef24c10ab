//! The Communicator core (spec §4.5): glues the codec, registry, pending-
//! call table and proxy driver together behind the `send`/`reply`/
//! `destructor` contract every transport adapter drives.

use crate::error::{FallibleResult, RfcError};
use crate::invoke::{Call, Invoke, Return};
use crate::pending::PendingCalls;
use crate::proxy::{export_argument, materialize_parameter, Arg, Driver};
use crate::registry::{Argument, Provider, Registry};
use crate::state::State;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// The hook each transport adapter implements to actually put a frame on
/// the wire (spec §4.5 `sendData`). Named `Sink` rather than `Transport` to
/// keep it to exactly the one thing the core needs from a transport —
/// receiving is push-based via [`Communicator::reply_data`] instead, since
/// every adapter already owns a read loop of its own.
pub trait Sink: fmt::Debug {
    fn send(&self, invoke: &Invoke) -> FallibleResult<()>;
}

/// Per-endpoint owner of the pending-call table, provider registry and
/// wire I/O glue (spec §4.5). Always held behind an `Rc`: driver handles
/// and in-flight call-dispatch tasks all need to outlive the call that
/// created them.
pub struct Communicator {
    state: Cell<State>,
    registry: Registry,
    pending: PendingCalls,
    sink: RefCell<Option<Rc<dyn Sink>>>,
    next_call_uid: Cell<u64>,
    next_handle_uid: Cell<u64>,
}

impl fmt::Debug for Communicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("state", &self.state.get())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Default for Communicator {
    fn default() -> Self {
        Self {
            state: Cell::new(State::None),
            registry: Registry::new(),
            pending: PendingCalls::new(),
            sink: RefCell::new(None),
            next_call_uid: Cell::new(0),
            next_handle_uid: Cell::new(0),
        }
    }
}

impl Communicator {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Returns a proxy driver rooted at `""`. Idempotent and safe to call
    /// before OPEN; the driver itself won't emit until then (spec §4.5).
    pub fn get_driver(self: &Rc<Self>) -> Driver {
        Driver::new(self.clone(), "")
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    /// Swaps the root provider. Invariant 5: only legal while OPENING.
    pub fn set_provider(&self, provider: Option<Rc<dyn Provider>>) -> FallibleResult<()> {
        if self.state.get() != State::Opening {
            return Err(RfcError::NotReady(self.state.get()).into());
        }
        self.registry.set_root(provider);
        Ok(())
    }

    /// Attaches the transport's send hook. Called once a transport adapter
    /// has a live channel to write to.
    pub fn attach_sink(&self, sink: Rc<dyn Sink>) {
        *self.sink.borrow_mut() = Some(sink);
    }

    /// Drives the NONE→OPENING→OPEN→CLOSING→CLOSED state machine for this
    /// Communicator. Transitioning into CLOSING runs `destructor()`
    /// synchronously, before returning, so the pending table is already
    /// drained by the time the caller's transport teardown begins (spec
    /// §4.5: "destructor... triggered by lifecycle transition into
    /// CLOSING").
    pub fn transition(&self, next: State) -> FallibleResult<()> {
        let current = self.state.get();
        if !current.can_advance_to(next) {
            return Err(RfcError::ProtocolError(format!("illegal transition {current} -> {next}")).into());
        }
        self.state.set(next);
        if next == State::Closing {
            self.destructor();
        }
        Ok(())
    }

    /// Fails every pending call with `ConnectionClosed` and, because the
    /// state has already moved off OPEN by the time this runs, prevents any
    /// further Call from being registered (spec §4.5).
    pub fn destructor(&self) {
        tracing::debug!(pending = self.pending.len(), "communicator closing: failing pending calls");
        self.pending.fail_all();
    }

    /// The ready gate (spec §4.5 `inspectReady`): `Ok(())` in OPEN, a typed
    /// `NotReady` error matching the current state otherwise.
    pub fn inspect_ready(&self) -> FallibleResult<()> {
        match self.state.get() {
            State::Open => Ok(()),
            other => Err(RfcError::NotReady(other).into()),
        }
    }

    /// Allocates the next handle uid. Separate counter from call uids
    /// (spec §3 "Uid space"), monotonically increasing, never reused
    /// within a session (invariant 4).
    pub fn next_handle_uid(&self) -> u64 {
        let uid = self.next_handle_uid.get();
        self.next_handle_uid.set(uid + 1);
        uid
    }

    fn next_call_uid(&self) -> u64 {
        let uid = self.next_call_uid.get();
        self.next_call_uid.set(uid + 1);
        uid
    }

    /// Sends a Call for `listener` with `args`, exporting any callback
    /// arguments into the registry first, and resolves once the matching
    /// Return arrives (or the Communicator closes in the meantime).
    pub async fn send_call(self: &Rc<Self>, listener: &str, args: Vec<Arg>) -> FallibleResult<Value> {
        self.inspect_ready()?;

        let mut release_uids = Vec::new();
        let mut parameters = Vec::with_capacity(args.len());
        for arg in args {
            let (parameter, release_uid) = export_argument(self, arg);
            parameters.push(parameter);
            if let Some(uid) = release_uid {
                release_uids.push(uid);
            }
        }

        let uid = self.next_call_uid();
        // Invariant 1: the uid is in the pending table before the frame
        // hits the wire.
        let receiver = self.pending.register(uid);
        let call = Invoke::Call(Call { uid, listener: listener.to_string(), parameters });

        let sink = self
            .sink
            .borrow()
            .clone()
            .ok_or_else(|| RfcError::TransportError("no transport attached to communicator".into()))?;
        if let Err(e) = sink.send(&call) {
            self.pending.complete(uid, Err(RfcError::TransportError(e.to_string()).into()));
        }

        let result = receiver.await.unwrap_or_else(|_| Err(RfcError::ConnectionClosed.into()));

        // Release-of-handles protocol (spec §4.5): once the Return for this
        // Call arrives, single-use (non-retained) exported handles go away.
        for uid in release_uids {
            self.registry.release(uid);
        }

        result
    }

    /// Entry point fed by a transport adapter for each decoded inbound
    /// frame (spec §4.5 `replyData`).
    pub fn reply_data(self: &Rc<Self>, invoke: Invoke) {
        match invoke {
            Invoke::Call(call) => self.clone().handle_call(call),
            Invoke::Return(ret) => self.handle_return(ret),
        }
    }

    fn handle_return(&self, ret: Return) {
        // Invariant 2 (unknown uid dropped silently) and "new incoming
        // Returns after destructor are dropped" both fall out of
        // `PendingCalls::complete`'s own missing-uid handling, since
        // `destructor()` has already drained the table by the time we'd
        // get here.
        let result =
            if ret.success { Ok(ret.value) } else { Err(RfcError::from_return_payload(&ret.value).into()) };
        self.pending.complete(ret.uid, result);
    }

    /// Dispatches an inbound Call on this Communicator's local executor,
    /// so a slow provider function never blocks processing of other
    /// frames (spec §5: handler invocations are not mutually exclusive).
    /// Requires a `tokio::task::LocalSet` to be entered by the caller.
    fn handle_call(self: Rc<Self>, call: Call) {
        tokio::task::spawn_local(async move {
            let uid = call.uid;
            let result = self.dispatch_call(call).await;
            let invoke = match result {
                Ok(value) => Invoke::Return(Return { uid, success: true, value }),
                Err(e) => Invoke::Return(Return { uid, success: false, value: RfcError::to_return_payload(&e) }),
            };
            let sink = self.sink.borrow().clone();
            if let Some(sink) = sink {
                if let Err(e) = sink.send(&invoke) {
                    tracing::warn!(error = %e, uid, "failed to send Return for inbound call");
                }
            }
        });
    }

    async fn dispatch_call(self: &Rc<Self>, call: Call) -> FallibleResult<Value> {
        let callable = self.registry.resolve(&call.listener)?;
        let args: Vec<Argument> =
            call.parameters.into_iter().map(|p| materialize_parameter(self, p)).collect();
        callable(args).await
    }
}
