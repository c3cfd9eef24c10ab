//! Transport-agnostic remote function call (RFC) runtime.
//!
//! A client holds a [`proxy::Driver`] for a remote object's interface and
//! invokes its methods — including nested method chains and callback
//! arguments — as if the object were local. This crate is the
//! `Communicator` core: the wire protocol, the provider registry, the
//! pending-call table, the proxy driver, and the Connector/Server
//! lifecycle state machine every transport adapter wraps it in. Concrete
//! transports (WebSocket, Worker, SharedWorker) live in their own sibling
//! crates and depend on this one.

pub mod communicator;
pub mod error;
pub mod invoke;
pub mod lifecycle;
pub mod pending;
pub mod proxy;
pub mod registry;
pub mod state;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use communicator::{Communicator, Sink};
pub use error::{FallibleResult, RfcError};
pub use invoke::{decode, encode, Call, HandleRef, Invoke, Parameter, Return};
pub use lifecycle::{Connector, Server};
pub use proxy::{Arg, Driver};
pub use registry::{Argument, Callable, MethodTable, Provider};
pub use state::State;
