//! Literal end-to-end scenarios from spec.md §8, driven entirely through
//! `rfc_core::test_util::MockTransport` — no real transport needed since
//! these exercise `Communicator`/`Registry`/`PendingCalls` behaviour, not
//! any particular wire adapter. Placed under `tests/` the way the teacher
//! placed its own `ide/tests/language_server.rs` integration suite.

use rfc_core::{Arg, Argument, Communicator, MethodTable, RfcError, State};
use serde_json::json;
use std::rc::Rc;

fn open_pair(provider: MethodTable) -> (Rc<Communicator>, rfc_core::test_util::MockTransport) {
    let comm = Communicator::new();
    let transport = rfc_core::test_util::MockTransport::new();
    comm.attach_sink(Rc::new(transport.clone()));
    comm.transition(State::Opening).unwrap();
    comm.set_provider(Some(Rc::new(provider))).unwrap();
    comm.transition(State::Open).unwrap();
    (comm, transport)
}

#[tokio::test]
async fn scenario_1_calculator() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let provider = MethodTable::new()
                .value_method("plus", |a| Ok(json!(a[0].as_i64().unwrap() + a[1].as_i64().unwrap())))
                .value_method("minus", |a| Ok(json!(a[0].as_i64().unwrap() - a[1].as_i64().unwrap())))
                .value_method("multiplies", |a| Ok(json!(a[0].as_i64().unwrap() * a[1].as_i64().unwrap())));
            let (comm, transport) = open_pair(provider);

            let sum = call_and_reply(&comm, &transport, "plus", vec![Arg::Value(json!(2)), Arg::Value(json!(3))])
                .await
                .unwrap();
            assert_eq!(sum, json!(5));

            let product = call_and_reply(
                &comm,
                &transport,
                "multiplies",
                vec![Arg::Value(sum), Arg::Value(json!(4))],
            )
            .await
            .unwrap();
            assert_eq!(product, json!(20));
        })
        .await;
}

#[tokio::test]
async fn scenario_2_nested_object() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let scientific = MethodTable::new()
                .value_method("sqrt", |a| Ok(json!((a[0].as_f64().unwrap()).sqrt())));
            let provider = MethodTable::new().child("scientific", Rc::new(scientific));
            let (comm, transport) = open_pair(provider);

            let result =
                call_and_reply(&comm, &transport, "scientific.sqrt", vec![Arg::Value(json!(16))]).await.unwrap();
            assert_eq!(result, json!(4.0));
        })
        .await;
}

#[tokio::test]
async fn scenario_3_remote_throw() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let provider = MethodTable::new().value_method("fails", |_a| {
                Err(RfcError::UserError {
                    name: "DomainError".to_string(),
                    message: "bad".to_string(),
                    stack: None,
                }
                .into())
            });
            let (comm, transport) = open_pair(provider);

            let err = call_and_reply(&comm, &transport, "fails", vec![]).await.unwrap_err();
            let err = err.downcast::<RfcError>().unwrap();
            match err {
                RfcError::UserError { name, message, .. } => {
                    assert_eq!(name, "DomainError");
                    assert_eq!(message, "bad");
                }
                other => panic!("expected UserError, got {other:?}"),
            }
        })
        .await;
}

#[tokio::test]
async fn scenario_4_callback_parameter() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            // Provider: forEach(arr, cb) invokes cb(x) for every element,
            // sequentially, then returns null.
            let provider = MethodTable::new().method(
                "forEach",
                Rc::new(|args: Vec<Argument>| {
                    Box::pin(async move {
                        let mut args = args.into_iter();
                        let arr = match args.next() {
                            Some(Argument::Value(v)) => v,
                            _ => return Err(RfcError::ProtocolError("expected array".into()).into()),
                        };
                        let cb = match args.next() {
                            Some(Argument::Callback(cb)) => cb,
                            _ => return Err(RfcError::ProtocolError("expected callback".into()).into()),
                        };
                        for item in arr.as_array().cloned().unwrap_or_default() {
                            cb(vec![Argument::Value(item)]).await?;
                        }
                        Ok(json!(null))
                    }) as futures::future::LocalBoxFuture<'static, rfc_core::FallibleResult<serde_json::Value>>
                }),
            );
            let (comm, transport) = open_pair(provider);

            let accum: Rc<std::cell::RefCell<Vec<i64>>> = Rc::new(std::cell::RefCell::new(Vec::new()));
            let accum_for_cb = accum.clone();
            let cb: rfc_core::Callable = Rc::new(move |args: Vec<Argument>| {
                let accum = accum_for_cb.clone();
                Box::pin(async move {
                    if let Some(Argument::Value(v)) = args.into_iter().next() {
                        accum.borrow_mut().push(v.as_i64().unwrap());
                    }
                    Ok(json!(null))
                }) as futures::future::LocalBoxFuture<'static, rfc_core::FallibleResult<serde_json::Value>>
            });

            let result = call_and_reply(
                &comm,
                &transport,
                "forEach",
                vec![Arg::Value(json!([1, 2, 3])), Arg::Callback(cb)],
            )
            .await;
            assert!(result.is_ok());
            assert_eq!(*accum.borrow(), vec![1, 2, 3]);
        })
        .await;
}

#[tokio::test]
async fn scenario_5_reconnect_loop() {
    let provider_factory = || {
        MethodTable::new().value_method("plus", |a| Ok(json!(a[0].as_i64().unwrap() + a[1].as_i64().unwrap())))
    };

    for _ in 0..5 {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (comm, transport) = open_pair(provider_factory());
                let result =
                    call_and_reply(&comm, &transport, "plus", vec![Arg::Value(json!(1)), Arg::Value(json!(1))])
                        .await
                        .unwrap();
                assert_eq!(result, json!(2));
                comm.transition(State::Closing).unwrap();
                comm.transition(State::Closed).unwrap();
            })
            .await;
    }
}

/// Drives a single Call to completion by replaying whatever frames the mock
/// transport captures back through `reply_data`, resolving nested
/// request/reply chains (a Call that itself invokes an exported callback
/// produces more than one frame before the top-level Return).
async fn call_and_reply(
    comm: &Rc<Communicator>,
    transport: &rfc_core::test_util::MockTransport,
    path: &str,
    args: Vec<Arg>,
) -> rfc_core::FallibleResult<serde_json::Value> {
    let driver = comm.get_driver();
    let path = path.to_string();
    let task = tokio::task::spawn_local(async move { driver.path(&path).call(args).await });

    loop {
        tokio::task::yield_now().await;
        while let Some(frame) = transport.pop_sent() {
            let invoke = rfc_core::decode(&frame).unwrap();
            comm.reply_data(invoke);
        }
        if task.is_finished() {
            break;
        }
    }
    task.await.unwrap()
}
