//! End-to-end calculator scenario (spec.md §8 scenario 1) over a real
//! loopback TCP socket, the native analogue of the teacher's
//! `tests/native_ws.rs`.

use rfc_core::MethodTable;
use rfc_transport_websocket::{WebSocketConnectorConfig, WebSocketServerConfig};
use std::rc::Rc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn calculator_round_trip_over_loopback_socket() {
    let addr = "127.0.0.1:0";
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let bound_addr = listener.local_addr().unwrap();
    drop(listener);

    let server_addr = bound_addr.to_string();
    let server_config = WebSocketServerConfig::new(server_addr.clone());

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let local = tokio::task::LocalSet::new();
        local.block_on(&rt, async move {
            let server_handle = Rc::new(rfc_core::Server::new());
            let _ = rfc_transport_websocket::serve(server_config, server_handle, |acceptor| async move {
                let provider = MethodTable::new().value_method("plus", |a| {
                    Ok(serde_json::json!(a[0].as_i64().unwrap() + a[1].as_i64().unwrap()))
                });
                acceptor.accept(Some(Rc::new(provider)))?;
                Ok(())
            })
            .await;
        });
    });

    // Give the listener a moment to bind before dialing.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let client_config =
                WebSocketConnectorConfig::new(format!("ws://{server_addr}"), serde_json::json!({}));
            let connector = rfc_transport_websocket::connect(client_config, None).await.unwrap();
            let driver = connector.communicator().get_driver();
            let result = driver
                .path("plus")
                .call(vec![
                    rfc_core::Arg::Value(serde_json::json!(2)),
                    rfc_core::Arg::Value(serde_json::json!(3)),
                ])
                .await
                .unwrap();
            assert_eq!(result, serde_json::json!(5));
        })
        .await;
}

/// spec.md §8 scenario 6 "Server multi-client": several concurrently
/// attached clients, each issuing a batch of Calls against randomly chosen
/// listeners on the same listening server, all resolving to the correct
/// values with no cross-talk between Connectors.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_6_server_multi_client() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bound_addr = listener.local_addr().unwrap();
    drop(listener);

    let server_addr = bound_addr.to_string();
    let server_config = WebSocketServerConfig::new(server_addr.clone());

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let local = tokio::task::LocalSet::new();
        local.block_on(&rt, async move {
            let server_handle = Rc::new(rfc_core::Server::new());
            let _ = rfc_transport_websocket::serve(server_config, server_handle, |acceptor| async move {
                let provider = MethodTable::new()
                    .value_method("plus", |a| {
                        Ok(serde_json::json!(a[0].as_i64().unwrap() + a[1].as_i64().unwrap()))
                    })
                    .value_method("minus", |a| {
                        Ok(serde_json::json!(a[0].as_i64().unwrap() - a[1].as_i64().unwrap()))
                    });
                acceptor.accept(Some(Rc::new(provider)))?;
                Ok(())
            })
            .await;
        });
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    const CLIENTS: usize = 3;
    const CALLS_PER_CLIENT: usize = 100;

    let mut client_threads = Vec::with_capacity(CLIENTS);
    for client_idx in 0..CLIENTS {
        let server_addr = server_addr.clone();
        client_threads.push(std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let local = tokio::task::LocalSet::new();
            local.block_on(&rt, async move {
                let client_config =
                    WebSocketConnectorConfig::new(format!("ws://{server_addr}"), serde_json::json!({}));
                let connector = rfc_transport_websocket::connect(client_config, None).await.unwrap();
                let driver = connector.communicator().get_driver();

                for call_idx in 0..CALLS_PER_CLIENT {
                    let seed = client_idx * CALLS_PER_CLIENT + call_idx;
                    let a = (seed % 50) as i64;
                    let b = (seed % 7) as i64 + 1;
                    let use_plus = seed % 2 == 0;
                    let listener = if use_plus { "plus" } else { "minus" };
                    let expected = if use_plus { a + b } else { a - b };

                    let result = driver
                        .path(listener)
                        .call(vec![rfc_core::Arg::Value(serde_json::json!(a)), rfc_core::Arg::Value(serde_json::json!(b))])
                        .await
                        .unwrap();
                    assert_eq!(result, serde_json::json!(expected));
                }
            });
        }));
    }

    for handle in client_threads {
        handle.join().unwrap();
    }
}
