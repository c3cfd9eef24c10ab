//! Pending-call table (spec §4.3): tracks outstanding Calls this
//! Communicator has sent, and resolves/rejects them as Returns (or a
//! shutdown) arrive.

use crate::error::{FallibleResult, RfcError};
use futures::channel::oneshot;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;

/// A registered Call awaiting its Return. Awaiting the returned
/// [`oneshot::Receiver`] is the caller's future (spec §4.3 "Awaiter").
pub struct PendingCalls {
    table: RefCell<HashMap<u64, oneshot::Sender<FallibleResult<Value>>>>,
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self { table: RefCell::new(HashMap::new()) }
    }
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `uid`, returning the receiver half the caller awaits.
    /// Spec invariant 1 requires this to happen before the Call hits the
    /// wire; callers must register before handing the frame to the sink.
    pub fn register(&self, uid: u64) -> oneshot::Receiver<FallibleResult<Value>> {
        let (tx, rx) = oneshot::channel();
        self.table.borrow_mut().insert(uid, tx);
        rx
    }

    /// Resolves or rejects `uid` with `result`. A missing uid is dropped
    /// silently (spec invariant 2: a late Return after the caller's future
    /// was already abandoned/cancelled).
    pub fn complete(&self, uid: u64, result: FallibleResult<Value>) {
        if let Some(tx) = self.table.borrow_mut().remove(&uid) {
            // The receiver may have been dropped (caller stopped polling);
            // that's not our problem to report.
            let _ = tx.send(result);
        }
    }

    /// Atomically drains the table and rejects every entry with the same
    /// error. Called exactly once, on transition into CLOSING or on an
    /// unrecoverable transport error (spec §4.3).
    pub fn fail_all(&self) {
        let mut table = self.table.borrow_mut();
        for (_, tx) in table.drain() {
            let _ = tx.send(Err(RfcError::ConnectionClosed.into()));
        }
    }

    /// Number of calls currently awaiting a Return. Used by tests to assert
    /// invariant 3 (an empty table once CLOSED).
    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
