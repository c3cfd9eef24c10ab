//! Parent side of the Worker transport (spec.md §4.6 "Worker"): spawns the
//! child process with its header serialised into the `__m_pArgs` argument,
//! completes the OPENING/OPEN sentinel handshake and then drives the
//! Communicator over the child's stdin/stdout.

use crate::config::{WorkerConfig, HEADER_ARGUMENT_NAME};
use crate::error::WorkerError;
use crate::framing::write_line;
use crate::sentinel::Sentinel;
use crate::sink::PipeSink;
use rfc_core::{Connector as CoreConnector, FallibleResult, Provider};
use std::process::Stdio;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Spawns `config.program`, performs the handshake and returns a Connector
/// already OPEN with `provider` installed. Must run inside a
/// `tokio::task::LocalSet`.
pub async fn connect(
    config: WorkerConfig,
    provider: Option<Rc<dyn Provider>>,
) -> FallibleResult<Rc<CoreConnector>> {
    let connector = Rc::new(CoreConnector::new());
    connector.begin_connect()?;

    let header_json = serde_json::to_string(&config.header)
        .map_err(|e| WorkerError::InvalidHeaderArgument(e.to_string()))?;
    let mut args = config.args.clone();
    args.push(format!("--{HEADER_ARGUMENT_NAME}={header_json}"));

    let mut child = match Command::new(&config.program).args(&args).stdin(Stdio::piped()).stdout(Stdio::piped()).spawn()
    {
        Ok(child) => child,
        Err(e) => {
            connector.fail_connect()?;
            return Err(WorkerError::SpawnFailed { program: config.program.clone(), reason: e.to_string() }.into());
        }
    };

    let mut stdin = child.stdin.take().expect("stdin was requested as piped");
    let stdout = child.stdout.take().expect("stdout was requested as piped");
    let mut lines = BufReader::new(stdout).lines();

    match expect_sentinel(&mut lines, Sentinel::Opening).await {
        Ok(()) => {}
        Err(e) => {
            connector.fail_connect()?;
            return Err(e);
        }
    }

    let header_envelope = serde_json::json!({ "header": config.header }).to_string();
    if let Err(e) = write_line(&mut stdin, &header_envelope).await {
        connector.fail_connect()?;
        return Err(e);
    }

    match expect_sentinel(&mut lines, Sentinel::Open).await {
        Ok(()) => {}
        Err(e) => {
            connector.fail_connect()?;
            return Err(e);
        }
    }

    let sink = Rc::new(PipeSink::spawn(stdin));
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
                            tracing::error!(error = %e, "malformed line from child, closing connection");
                            break;
                        }
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
        let _ = connector_for_loop.fail();
        let _ = child.kill().await;
        let _ = child.wait().await;
    });

    Ok(connector)
}

async fn expect_sentinel<R: tokio::io::AsyncBufRead + Unpin>(
    lines: &mut tokio::io::Lines<R>,
    expected: Sentinel,
) -> FallibleResult<()> {
    let line = lines
        .next_line()
        .await
        .map_err(|_| WorkerError::HandshakeAborted)?
        .ok_or(WorkerError::HandshakeAborted)?;
    match Sentinel::parse(&line) {
        Some(s) if s == expected => Ok(()),
        _ => Err(WorkerError::UnexpectedSentinel { expected: expected.as_str(), got: line }.into()),
    }
}
