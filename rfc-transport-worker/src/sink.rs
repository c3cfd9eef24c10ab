//! Bridges `rfc_core::Sink`'s synchronous `send` to an async pipe writer,
//! the same unbounded-channel-plus-writer-task shape as
//! `rfc_transport_websocket::sink::WsSink`.

use crate::framing::write_line;
use futures::StreamExt;
use rfc_core::{FallibleResult, Invoke, RfcError, Sink as CommSink};
use std::fmt;
use tokio::io::AsyncWrite;

pub struct PipeSink {
    tx: futures::channel::mpsc::UnboundedSender<String>,
}

impl fmt::Debug for PipeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeSink").finish()
    }
}

impl PipeSink {
    pub fn spawn<W>(mut writer: W) -> Self
    where
        W: AsyncWrite + Unpin + 'static,
    {
        let (tx, mut rx) = futures::channel::mpsc::unbounded::<String>();
        tokio::task::spawn_local(async move {
            while let Some(line) = rx.next().await {
                if let Err(e) = write_line(&mut writer, &line).await {
                    tracing::warn!(error = %e, "worker pipe write failed, closing writer task");
                    break;
                }
            }
        });
        Self { tx }
    }

    pub fn send_line(&self, line: String) -> FallibleResult<()> {
        self.tx.unbounded_send(line).map_err(|e| RfcError::TransportError(e.to_string()).into())
    }
}

impl CommSink for PipeSink {
    fn send(&self, invoke: &Invoke) -> FallibleResult<()> {
        self.send_line(rfc_core::encode(invoke)?)
    }
}
