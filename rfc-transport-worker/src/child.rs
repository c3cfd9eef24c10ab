//! Child side of the Worker transport: reads the header the parent baked
//! into the `__m_pArgs` command-line argument, completes the handshake over
//! its own stdin/stdout, and hands back a live Connector. Intended for a
//! binary that `rfc_transport_worker::connector::connect` spawns as its
//! child.

use crate::config::HEADER_ARGUMENT_NAME;
use crate::error::WorkerError;
use crate::framing::write_line;
use crate::sentinel::Sentinel;
use crate::sink::PipeSink;
use rfc_core::{Connector as CoreConnector, FallibleResult, Provider};
use serde_json::Value;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin, Stdout};

/// Parses the header serialised into this process's own command line
/// (spec.md §6 "Child reads and parses this on first access to
/// `getHeader()`").
pub fn read_header_argument() -> FallibleResult<Value> {
    let prefix = format!("--{HEADER_ARGUMENT_NAME}=");
    let raw = std::env::args()
        .find(|a| a.starts_with(&prefix))
        .ok_or(WorkerError::MissingHeaderArgument)?;
    let json = &raw[prefix.len()..];
    serde_json::from_str(json).map_err(|e| WorkerError::InvalidHeaderArgument(e.to_string()).into())
}

/// Completes the child side of the handshake over `stdin`/`stdout` and
/// returns a Connector already OPEN with `provider` installed. Must run
/// inside a `tokio::task::LocalSet`.
pub async fn attach(
    stdin: Stdin,
    stdout: Stdout,
    provider: Option<Rc<dyn Provider>>,
) -> FallibleResult<Rc<CoreConnector>> {
    let connector = Rc::new(CoreConnector::new());
    connector.begin_connect()?;

    let mut stdout = stdout;
    let mut lines = BufReader::new(stdin).lines();

    if let Err(e) = write_line(&mut stdout, Sentinel::Opening.as_str()).await {
        connector.fail_connect()?;
        return Err(e);
    }

    let header_line = match lines.next_line().await {
        Ok(Some(line)) => line,
        _ => {
            connector.fail_connect()?;
            return Err(WorkerError::HandshakeAborted.into());
        }
    };
    let envelope: Value = match serde_json::from_str(&header_line) {
        Ok(envelope) => envelope,
        Err(e) => {
            connector.fail_connect()?;
            return Err(WorkerError::InvalidHeaderArgument(e.to_string()).into());
        }
    };
    let _header = envelope.get("header").cloned().unwrap_or(Value::Null);

    if let Err(e) = write_line(&mut stdout, Sentinel::Open.as_str()).await {
        connector.fail_connect()?;
        return Err(e);
    }

    let sink = Rc::new(PipeSink::spawn(stdout));
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
                            tracing::error!(error = %e, "malformed line from parent, closing connection");
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
