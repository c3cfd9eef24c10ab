//! The Invoke wire codec (spec §4.1, §6). `Invoke` is untagged: a Call is
//! recognised by the presence of `listener`, a Return by the presence of
//! `success`. The codec is UTF-8 JSON text; binary transports wrap the same
//! bytes unchanged (spec §4.1).

use crate::error::{FallibleResult, RfcError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One wire message: either a method invocation or its reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Invoke {
    /// A request to invoke `listener` with `parameters`.
    Call(Call),
    /// The reply to a previously sent Call of the same `uid`.
    Return(Return),
}

/// `{ uid, listener, parameters }` — spec §3 "Call".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Call {
    pub uid: u64,
    pub listener: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// `{ uid, success, value }` — spec §3 "Return". When `success` is false,
/// `value` holds `{name, message, stack?}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Return {
    pub uid: u64,
    pub success: bool,
    pub value: Value,
}

/// A single positional argument: either an opaque by-value payload or a
/// by-reference handle to a callable exported by the sender (spec §3
/// "Parameter").
///
/// Declaration order matters: `serde(untagged)` tries variants top to
/// bottom and keeps the first one that deserialises successfully. `Handle`
/// must come first, since its shape (`{"handle": true, "uid": N, ...}`) is
/// a strict subset of what `Value` (which matches anything) would also
/// accept.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameter {
    Handle(HandleRef),
    Value(Value),
}

/// `{"handle":true,"uid":N,"retain":false}` (spec §6). `retain` defaults to
/// `false`: a single-use handle, released by the exporter once the Call's
/// Return arrives (spec §4.5).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HandleRef {
    pub handle: bool,
    pub uid: u64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub retain: bool,
}

fn is_false(b: &bool) -> bool {
    !b
}

impl HandleRef {
    pub fn new(uid: u64, retain: bool) -> Self {
        Self { handle: true, uid, retain }
    }
}

/// Encodes an `Invoke` as UTF-8 JSON text.
pub fn encode(invoke: &Invoke) -> FallibleResult<String> {
    serde_json::to_string(invoke).map_err(|e| RfcError::ProtocolError(e.to_string()).into())
}

/// Decodes UTF-8 JSON text into an `Invoke`. Malformed frames (including
/// ones matching neither shape) are a `ProtocolError`, fatal per spec §7.
pub fn decode(text: &str) -> FallibleResult<Invoke> {
    serde_json::from_str(text).map_err(|e| RfcError::ProtocolError(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_round_trips() {
        let call = Invoke::Call(Call {
            uid: 42,
            listener: "scientific.sqrt".into(),
            parameters: vec![Parameter::Value(serde_json::json!(16))],
        });
        let text = encode(&call).unwrap();
        let back = decode(&text).unwrap();
        match back {
            Invoke::Call(c) => {
                assert_eq!(c.uid, 42);
                assert_eq!(c.listener, "scientific.sqrt");
            }
            Invoke::Return(_) => panic!("decoded a Call as a Return"),
        }
    }

    #[test]
    fn return_round_trips() {
        let ret = Invoke::Return(Return { uid: 7, success: true, value: serde_json::json!(5) });
        let text = encode(&ret).unwrap();
        let back = decode(&text).unwrap();
        match back {
            Invoke::Return(r) => {
                assert_eq!(r.uid, 7);
                assert!(r.success);
                assert_eq!(r.value, serde_json::json!(5));
            }
            Invoke::Call(_) => panic!("decoded a Return as a Call"),
        }
    }

    #[test]
    fn handle_parameter_round_trips_with_retain() {
        let call = Invoke::Call(Call {
            uid: 1,
            listener: "forEach".into(),
            parameters: vec![
                Parameter::Value(serde_json::json!([1, 2, 3])),
                Parameter::Handle(HandleRef::new(99, true)),
            ],
        });
        let text = encode(&call).unwrap();
        assert!(text.contains("\"retain\":true"));
        let back = decode(&text).unwrap();
        match back {
            Invoke::Call(c) => match &c.parameters[1] {
                Parameter::Handle(h) => {
                    assert_eq!(h.uid, 99);
                    assert!(h.retain);
                }
                Parameter::Value(_) => panic!("by-reference parameter decoded as by-value"),
            },
            Invoke::Return(_) => unreachable!(),
        }
    }

    #[test]
    fn default_retain_is_omitted_and_false() {
        let h = HandleRef::new(3, false);
        let text = serde_json::to_string(&Parameter::Handle(h)).unwrap();
        assert!(!text.contains("retain"));
    }

    #[test]
    fn malformed_frame_is_protocol_error() {
        assert!(decode("not json").is_err());
        assert!(decode("{}").is_err());
    }
}
