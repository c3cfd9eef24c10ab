//! In-memory transport double, the analogue of the teacher's
//! `json_rpc::test_util::transport::mock::MockTransport`: records every
//! frame a Communicator sends so a test can inspect it, and lets a test
//! hand frames back in by decoding them and calling `reply_data` directly
//! (see `ide::transport::test_utils::TestWithMockedTransport`, which drove
//! its `Handler` the same way).

use crate::communicator::Sink;
use crate::error::FallibleResult;
use crate::invoke::{encode, Invoke};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A `Sink` that appends every encoded frame to an in-memory queue instead
/// of writing to a real transport. Cheap to `Clone`: all clones share the
/// same backing queue.
#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Rc<RefCell<VecDeque<String>>>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport").field("queued", &self.sent.borrow().len()).finish()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pops the oldest sent frame, if any.
    pub fn pop_sent(&self) -> Option<String> {
        self.sent.borrow_mut().pop_front()
    }

    /// Number of frames sent but not yet popped.
    pub fn sent_len(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Sink for MockTransport {
    fn send(&self, invoke: &Invoke) -> FallibleResult<()> {
        self.sent.borrow_mut().push_back(encode(invoke)?);
        Ok(())
    }
}
