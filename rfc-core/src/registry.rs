//! Provider registry (spec §4.2): maps a uid (or a dotted listener path
//! rooted at `""`) to a callable, and separately tracks the refcounted
//! handle slab used for callables exported as Call arguments.

use crate::error::{FallibleResult, RfcError};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A callable entry: takes the positional arguments of a Call and returns
/// the value to place in a successful Return (or an error for a failed
/// one). Not `Send`/`Sync` — per spec §5 all of one Communicator's state
/// (registry included) lives on a single logical executor.
pub type Callable = Rc<dyn Fn(Vec<Argument>) -> LocalBoxFuture<'static, FallibleResult<Value>>>;

/// One materialised argument passed to a [`Callable`]. By-value arguments
/// are plain JSON; a by-reference argument (spec §3 "Parameter") is
/// materialised as another `Callable` — the local proxy driver described
/// in spec §4.4.4, which emits a Call targeting `@handle:<uid>` when
/// invoked.
#[derive(Clone)]
pub enum Argument {
    Value(Value),
    Callback(Callable),
}

impl Argument {
    /// Accesses this argument as plain JSON, failing if it was actually a
    /// by-reference callback. Convenience for providers that never accept
    /// callback parameters.
    pub fn as_value(&self) -> FallibleResult<&Value> {
        match self {
            Argument::Value(v) => Ok(v),
            Argument::Callback(_) => {
                Err(RfcError::ProtocolError("expected a by-value argument, got a callback".into()).into())
            }
        }
    }

    /// Accesses this argument as a callback, failing if it was plain JSON.
    pub fn as_callback(&self) -> FallibleResult<&Callable> {
        match self {
            Argument::Callback(c) => Ok(c),
            Argument::Value(_) => {
                Err(RfcError::ProtocolError("expected a callback argument, got a by-value payload".into()).into())
            }
        }
    }
}

/// A (possibly nested) object graph of methods, the "Required
/// provider-interface shape" of spec §6. Implementations resolve a
/// dot-separated path themselves, which is how method receivers end up
/// preserved (spec §4.2): a nested provider's methods close over that
/// provider's own state, so invoking `a.b.c` naturally runs with `a.b` as
/// receiver without the registry needing to know anything about binding.
pub trait Provider: fmt::Debug {
    /// Resolves `path` (already split off the root) to a callable, or
    /// `None` if no such property/method exists. `path == ""` is the
    /// reserved root key (spec §3/§4.2: "empty listener path resolves to
    /// root") — a provider that should itself be directly invocable (a
    /// bare `Driver::call` with no prior `.path(...)`) answers it the same
    /// way it answers any other name; [`MethodTable::callable`] is the
    /// builder-side shorthand for registering one.
    fn resolve(&self, path: &str) -> Option<Callable>;
}

/// A concrete, builder-style [`Provider`] — the "builder API" alternative
/// spec §9 names for languages without dynamic property interception.
/// Exposes its leaves' receivers naturally: each `method`/`child` closure
/// captures whatever state it needs.
#[derive(Default)]
pub struct MethodTable {
    methods: HashMap<String, Callable>,
    children: HashMap<String, Rc<dyn Provider>>,
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a leaf method, invocable at the path segment `name`.
    pub fn method(mut self, name: impl Into<String>, f: Callable) -> Self {
        self.methods.insert(name.into(), f);
        self
    }

    /// Registers a leaf method that only ever deals in by-value JSON
    /// arguments (the common case — `plus`, `minus`, `sqrt`, ...). Rejects
    /// the call with a `ProtocolError` if the caller passed a callback
    /// where this method expects a value.
    pub fn value_method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> FallibleResult<Value> + 'static,
    {
        let f = Rc::new(f);
        self.method(
            name,
            Rc::new(move |args: Vec<Argument>| -> LocalBoxFuture<'static, FallibleResult<Value>> {
                let f = f.clone();
                async move {
                    let values: Vec<Value> = args
                        .iter()
                        .map(|a| a.as_value().cloned())
                        .collect::<FallibleResult<Vec<_>>>()?;
                    f(values)
                }
                .boxed_local()
            }),
        )
    }

    /// Registers a nested provider, invocable under `name.<rest>`.
    pub fn child(mut self, name: impl Into<String>, provider: Rc<dyn Provider>) -> Self {
        self.children.insert(name.into(), provider);
        self
    }

    /// Registers `f` under the reserved empty-string key, making this table
    /// itself directly invocable (spec §3: "optionally the root provider
    /// object, installed under the reserved key `\"\"`"). A root installed
    /// this way answers a bare `communicator.get_driver().call(args)`, with
    /// no `.path(...)` segment, in addition to whatever named methods and
    /// children the table also carries.
    pub fn callable(self, f: Callable) -> Self {
        self.method("", f)
    }
}

impl Provider for MethodTable {
    fn resolve(&self, path: &str) -> Option<Callable> {
        match path.split_once('.') {
            None => self.methods.get(path).cloned(),
            Some((head, rest)) => self.children.get(head)?.resolve(rest),
        }
    }
}

struct HandleEntry {
    callable: Callable,
    refcount: u32,
}

/// Per-Communicator registry: the optional root provider (installed under
/// the reserved `""` key per spec §3) plus the transient handle slab for
/// callables exported as by-reference parameters.
#[derive(Default)]
pub struct Registry {
    root: RefCell<Option<Rc<dyn Provider>>>,
    handles: RefCell<HashMap<u64, HandleEntry>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("has_root", &self.root.borrow().is_some())
            .field("handle_count", &self.handles.borrow().len())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps the root provider. Callers are responsible for enforcing
    /// invariant 5 (only while OPENING); the registry itself is a dumb
    /// container.
    pub fn set_root(&self, provider: Option<Rc<dyn Provider>>) {
        *self.root.borrow_mut() = provider;
    }

    /// Installs (or, if already present, increments the refcount of) a
    /// callable under `uid`.
    pub fn install(&self, uid: u64, callable: Callable) {
        let mut handles = self.handles.borrow_mut();
        handles
            .entry(uid)
            .and_modify(|e| e.refcount += 1)
            .or_insert(HandleEntry { callable, refcount: 1 });
    }

    /// Decrements the refcount of `uid`, evicting it at zero. A release of
    /// an unknown uid is a no-op: it may already have been evicted.
    pub fn release(&self, uid: u64) {
        let mut handles = self.handles.borrow_mut();
        let evict = match handles.get_mut(&uid) {
            Some(entry) => {
                entry.refcount = entry.refcount.saturating_sub(1);
                entry.refcount == 0
            }
            None => false,
        };
        if evict {
            handles.remove(&uid);
        }
    }

    /// Resolves a listener path per spec §4.2: `@handle:<n>` addresses the
    /// handle slab directly (ignoring anything past the uid); anything else,
    /// including the empty string, is walked against the root provider —
    /// an empty listener resolves whatever the root registered under its
    /// own reserved `""` key, which is `None` unless the root was built
    /// with [`MethodTable::callable`].
    pub fn resolve(&self, listener: &str) -> FallibleResult<Callable> {
        if let Some(rest) = listener.strip_prefix("@handle:") {
            let uid = parse_leading_uid(rest)
                .ok_or_else(|| RfcError::ProtocolError(format!("malformed handle listener: {listener}")))?;
            return self
                .handles
                .borrow()
                .get(&uid)
                .map(|e| e.callable.clone())
                .ok_or(RfcError::HandleReleased(uid))
                .map_err(Into::into);
        }
        let root = self.root.borrow();
        let root = root.as_ref().ok_or_else(|| RfcError::ListenerNotFound(listener.to_string()))?;
        root.resolve(listener)
            .ok_or_else(|| RfcError::ListenerNotFound(listener.to_string()).into())
    }
}

/// Parses the uid prefix of an `@handle:<uid>[:...]` remainder, ignoring
/// anything after the digits (spec §4.2: "the remainder is ignored").
fn parse_leading_uid(rest: &str) -> Option<u64> {
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync_callable(f: impl Fn(Vec<Value>) -> Value + 'static) -> Callable {
        Rc::new(move |args: Vec<Argument>| {
            let values: Vec<Value> = args.iter().map(|a| a.as_value().unwrap().clone()).collect();
            futures::future::ready(Ok(f(values))).boxed_local()
        })
    }

    #[test]
    fn resolves_nested_path_with_receiver() {
        let scientific =
            Rc::new(MethodTable::new().value_method("sqrt", |args| {
                let x = args[0].as_f64().unwrap();
                Ok(serde_json::json!(x.sqrt()))
            }));
        let root = MethodTable::new().child("scientific", scientific);
        let registry = Registry::new();
        registry.set_root(Some(Rc::new(root)));

        let callable = registry.resolve("scientific.sqrt").unwrap();
        let result =
            futures::executor::block_on(callable(vec![Argument::Value(serde_json::json!(16))])).unwrap();
        assert_eq!(result, serde_json::json!(4.0));
    }

    #[test]
    fn unresolved_listener_is_not_found() {
        let registry = Registry::new();
        registry.set_root(Some(Rc::new(MethodTable::new())));
        let err = match registry.resolve("missing") {
            Err(e) => e,
            Ok(_) => panic!("expected resolve to fail"),
        };
        assert!(matches!(err.downcast::<RfcError>().unwrap(), RfcError::ListenerNotFound(_)));
    }

    #[test]
    fn install_and_release_tracks_refcount_and_evicts_at_zero() {
        let registry = Registry::new();
        let callable = sync_callable(|_| serde_json::json!(null));
        registry.install(5, callable.clone());
        registry.install(5, callable);
        assert!(registry.resolve("@handle:5").is_ok());
        registry.release(5);
        assert!(registry.resolve("@handle:5").is_ok());
        registry.release(5);
        let err = match registry.resolve("@handle:5") {
            Err(e) => e,
            Ok(_) => panic!("expected resolve to fail"),
        };
        assert!(matches!(err.downcast::<RfcError>().unwrap(), RfcError::HandleReleased(5)));
    }

    #[test]
    fn empty_listener_resolves_to_the_root_itself_when_registered_as_callable() {
        let root = MethodTable::new().callable(sync_callable(|args| args[0].clone()));
        let registry = Registry::new();
        registry.set_root(Some(Rc::new(root)));

        let callable = registry.resolve("").unwrap();
        let result = futures::executor::block_on(callable(vec![Argument::Value(serde_json::json!("hi"))])).unwrap();
        assert_eq!(result, serde_json::json!("hi"));
    }

    #[test]
    fn empty_listener_is_not_found_when_root_has_no_bare_callable() {
        let registry = Registry::new();
        registry.set_root(Some(Rc::new(MethodTable::new().value_method("plus", |_| Ok(serde_json::json!(0))))));
        let err = match registry.resolve("") {
            Err(e) => e,
            Ok(_) => panic!("expected resolve to fail"),
        };
        assert!(matches!(err.downcast::<RfcError>().unwrap(), RfcError::ListenerNotFound(_)));
    }

    #[test]
    fn handle_listener_ignores_trailing_path() {
        let registry = Registry::new();
        registry.install(9, sync_callable(|_| serde_json::json!("hi")));
        assert!(registry.resolve("@handle:9.ignored.tail").is_ok());
    }
}
