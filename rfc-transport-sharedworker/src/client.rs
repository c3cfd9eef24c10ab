//! Attaching-client side of the SharedWorker transport: dials the listener's
//! Unix domain socket, posts OPENING, decodes the header envelope the
//! listener replies with, and posts OPEN.

use crate::error::SharedWorkerError;
use rfc_core::{Connector as CoreConnector, FallibleResult, Provider};
use rfc_transport_worker::framing::write_line;
use rfc_transport_worker::sentinel::Sentinel;
use rfc_transport_worker::sink::PipeSink;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;

/// Connects to `socket_path`, completes the handshake and returns a
/// Connector already OPEN with `provider` installed. Must run inside a
/// `tokio::task::LocalSet`.
pub async fn attach(socket_path: impl Into<String>, provider: Option<Rc<dyn Provider>>) -> FallibleResult<Rc<CoreConnector>> {
    let socket_path = socket_path.into();
    let connector = Rc::new(CoreConnector::new());
    connector.begin_connect()?;

    let stream = UnixStream::connect(&socket_path)
        .await
        .map_err(|e| SharedWorkerError::ConnectFailed { path: socket_path.clone(), reason: e.to_string() })?;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    if let Err(e) = write_line(&mut write_half, Sentinel::Opening.as_str()).await {
        connector.fail_connect()?;
        return Err(e);
    }

    let header_line = match lines.next_line().await {
        Ok(Some(line)) => line,
        _ => {
            connector.fail_connect()?;
            return Err(SharedWorkerError::HandshakeAborted.into());
        }
    };
    if let Err(e) = serde_json::from_str::<serde_json::Value>(&header_line) {
        connector.fail_connect()?;
        return Err(SharedWorkerError::ConnectFailed { path: socket_path.clone(), reason: e.to_string() }.into());
    }

    if let Err(e) = write_line(&mut write_half, Sentinel::Open.as_str()).await {
        connector.fail_connect()?;
        return Err(e);
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
