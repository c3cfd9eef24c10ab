//! Shared-worker listener (spec.md §4.6 "SharedWorker"): one long-lived
//! process binds a Unix domain socket and multiplexes many attaching
//! clients, giving each its own Communicator — the same handshake as the
//! Worker transport, just replayed once per accepted connection instead of
//! once per spawned child.
//!
//! As with the WebSocket server, each accepted connection gets its own OS
//! thread and `LocalSet` (spec.md §5: one logical thread per Communicator).

use crate::config::SharedWorkerConfig;
use crate::error::SharedWorkerError;
use rfc_core::{Connector as CoreConnector, FallibleResult, Provider, Server as CoreServer};
use rfc_transport_worker::framing::write_line;
use rfc_transport_worker::sentinel::Sentinel;
use rfc_transport_worker::sink::PipeSink;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Binds `config.socket_path` and drives the accept loop, handing every
/// newly-attached, already-OPEN Connector to `handler`. `handler` (and the
/// `provider` it returns) are constructed fresh per connection on that
/// connection's own thread, so only the factory itself needs to be `Send`.
pub async fn serve<F>(config: SharedWorkerConfig, server: Rc<CoreServer>, make_provider: F) -> FallibleResult<()>
where
    F: Fn() -> Option<Rc<dyn Provider>> + Clone + Send + 'static,
{
    server.begin_open()?;
    let _ = std::fs::remove_file(&config.socket_path);
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| SharedWorkerError::BindFailed { path: config.socket_path.clone(), reason: e.to_string() })?;
    server.mark_listening()?;

    loop {
        let (stream, _addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "accept() failed, continuing");
                continue;
            }
        };
        let header = config.header.clone();
        let make_provider = make_provider.clone();
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(error = %e, "failed to build per-connection runtime");
                    return;
                }
            };
            let local = tokio::task::LocalSet::new();
            local.block_on(&rt, async move {
                if let Err(e) = handle_connection(stream, header, make_provider()).await {
                    tracing::warn!(error = %e, "shared-worker connection handshake failed");
                }
            });
        });
    }
}

async fn handle_connection(
    stream: UnixStream,
    header: serde_json::Value,
    provider: Option<Rc<dyn Provider>>,
) -> FallibleResult<Rc<CoreConnector>> {
    let connector = Rc::new(CoreConnector::new());
    connector.begin_connect()?;

    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let first = lines.next_line().await.map_err(|_| SharedWorkerError::HandshakeAborted)?;
    match first.as_deref().and_then(Sentinel::parse) {
        Some(Sentinel::Opening) => {}
        _ => {
            connector.fail_connect()?;
            return Err(SharedWorkerError::HandshakeAborted.into());
        }
    }

    let envelope = serde_json::json!({ "header": header }).to_string();
    if let Err(e) = write_line(&mut write_half, &envelope).await {
        connector.fail_connect()?;
        return Err(e);
    }

    let second = lines.next_line().await.map_err(|_| SharedWorkerError::HandshakeAborted)?;
    match second.as_deref().and_then(Sentinel::parse) {
        Some(Sentinel::Open) => {}
        _ => {
            connector.fail_connect()?;
            return Err(SharedWorkerError::HandshakeAborted.into());
        }
    }

    let sink = Rc::new(PipeSink::spawn(write_half));
    connector.communicator().attach_sink(sink);
    connector.mark_open(provider)?;

    let communicator = connector.communicator().clone();
    let connector_for_loop = connector.clone();
    tokio::task::spawn_local(async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if Sentinel::parse(&line) == Some(Sentinel::Closing) {
                        break;
                    }
                    match rfc_core::decode(&line) {
                        Ok(invoke) => communicator.reply_data(invoke),
                        Err(e) => {
                            tracing::error!(error = %e, "malformed line, closing connection");
                            break;
                        }
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
        let _ = connector_for_loop.fail();
    });

    Ok(connector)
}
