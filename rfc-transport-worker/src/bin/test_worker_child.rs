//! A minimal worker child used only by `tests/calculator.rs`: completes the
//! handshake, exposes a one-method calculator provider, and runs until the
//! parent closes the channel.

use rfc_core::MethodTable;
use std::rc::Rc;

fn main() {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, async move {
        let _header = rfc_transport_worker::child::read_header_argument().unwrap_or(serde_json::Value::Null);
        let provider = MethodTable::new().value_method("plus", |a| {
            Ok(serde_json::json!(a[0].as_i64().unwrap() + a[1].as_i64().unwrap()))
        });
        let connector =
            rfc_transport_worker::child::attach(tokio::io::stdin(), tokio::io::stdout(), Some(Rc::new(provider)))
                .await
                .expect("handshake with parent failed");

        // Keep the process alive until the parent drops the channel.
        while connector.state() != rfc_core::State::Closed {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    });
}
