//! The proxy driver (spec §4.4): a caller-side handle that accumulates a
//! dot-path and, on invocation, synthesises a Call. Rust has no dynamic
//! property interception, so per spec §9 this offers the explicit-path
//! form (`driver.call(path, args)`) plus a chainable builder
//! (`driver.path("a").path("b")`) that collapses to the same Call —
//! options (b)/(c) of the design note.

use crate::communicator::Communicator;
use crate::error::{FallibleResult, RfcError};
use crate::invoke::{HandleRef, Parameter};
use crate::registry::{Argument, Callable};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::rc::Rc;

/// One argument to pass through [`Driver::call`]: either a plain JSON
/// value or a local function to export as a callback (spec §4.4.3).
pub enum Arg {
    /// A plain by-value argument.
    Value(Value),
    /// A local function, exported under a fresh handle uid and released
    /// automatically once the Return for this Call arrives.
    Callback(Callable),
    /// A local function exported with `retain: true` (spec §4.5): the
    /// remote side may invoke it after the Return, so it is not released
    /// automatically.
    RetainedCallback(Callable),
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

/// A chainable handle rooted at `""` (or, for a materialised callback, at
/// `@handle:<uid>`) on a remote provider. Every [`Driver::path`] call
/// extends the recorded dot-path; [`Driver::call`] (or the convenience
/// [`Driver::invoke`]) is the terminal step that actually emits a Call.
#[derive(Clone)]
pub struct Driver {
    communicator: Rc<Communicator>,
    path: String,
}

impl Driver {
    pub(crate) fn new(communicator: Rc<Communicator>, path: impl Into<String>) -> Self {
        Self { communicator, path: path.into() }
    }

    /// Extends the recorded path by one property-access segment, without
    /// invoking anything yet — "arbitrary-depth property chaining without
    /// any prior declaration of the remote interface" (spec §4.4.1).
    pub fn path(&self, segment: &str) -> Driver {
        let path = if self.path.is_empty() { segment.to_string() } else { format!("{}.{}", self.path, segment) };
        Driver { communicator: self.communicator.clone(), path }
    }

    /// The terminal step: invokes the method at the accumulated path with
    /// `args`, exporting any callback arguments first. Resolves to the
    /// remote's returned value, or rejects with the remote's thrown error
    /// (spec §4.4.2).
    pub fn call(&self, args: Vec<Arg>) -> LocalBoxFuture<'static, FallibleResult<Value>> {
        self.invoke(self.path.clone(), args)
    }

    /// Equivalent to `self.path(path).call(args)` in one step — the
    /// explicit-path form spec §9 asks every implementation to offer.
    pub fn invoke(&self, path: impl Into<String>, args: Vec<Arg>) -> LocalBoxFuture<'static, FallibleResult<Value>> {
        let communicator = self.communicator.clone();
        let path = path.into();
        async move { communicator.send_call(&path, args).await }.boxed_local()
    }
}

/// Builds the wire `Parameter` for one `Arg`, exporting callbacks into
/// `communicator`'s registry as a side effect. Returns the parameter plus,
/// for a non-retained callback, the uid to release once the Return for
/// this Call arrives (spec §4.4.3, §4.5).
pub(crate) fn export_argument(communicator: &Communicator, arg: Arg) -> (Parameter, Option<u64>) {
    match arg {
        Arg::Value(v) => (Parameter::Value(v), None),
        Arg::Callback(callable) => {
            let uid = communicator.next_handle_uid();
            communicator.registry().install(uid, callable);
            (Parameter::Handle(HandleRef::new(uid, false)), Some(uid))
        }
        Arg::RetainedCallback(callable) => {
            let uid = communicator.next_handle_uid();
            communicator.registry().install(uid, callable);
            (Parameter::Handle(HandleRef::new(uid, true)), None)
        }
    }
}

/// Materialises the argument an inbound Call parameter should be presented
/// as to the local provider function: by-value parameters pass through
/// unchanged, a by-reference parameter becomes a callback driver targeting
/// `@handle:<uid>` on the *same* Communicator (spec §4.4.4).
pub(crate) fn materialize_parameter(communicator: &Rc<Communicator>, parameter: Parameter) -> Argument {
    match parameter {
        Parameter::Value(v) => Argument::Value(v),
        Parameter::Handle(h) => {
            let driver = Driver::new(communicator.clone(), format!("@handle:{}", h.uid));
            let callable: Callable = Rc::new(move |args: Vec<Argument>| {
                let driver = driver.clone();
                async move {
                    let params = args
                        .into_iter()
                        .map(|a| match a {
                            Argument::Value(v) => Ok(v),
                            Argument::Callback(_) => {
                                Err(RfcError::ProtocolError("nested callback arguments are not supported".into())
                                    .into())
                            }
                        })
                        .collect::<FallibleResult<Vec<Value>>>()?;
                    let args: Vec<Arg> = params.into_iter().map(Arg::Value).collect();
                    driver.call(args).await
                }
                .boxed_local()
            });
            Argument::Callback(callable)
        }
    }
}
