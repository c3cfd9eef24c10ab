//! Bridges `rfc_core::Sink`'s synchronous `send` to the async
//! `WebSocketStream` write half. `Communicator::send_call`/`handle_call`
//! call `Sink::send` from non-async contexts, so outbound frames are handed
//! to an unbounded channel and written by a dedicated writer task — the
//! same shape the teacher's commented-out `native_ws.rs` sketch reached for
//! (`UnboundedSender<Message>` feeding a task that owns the split sink).

use futures::stream::SplitSink;
use futures::SinkExt;
use rfc_core::{FallibleResult, Invoke, RfcError, Sink as CommSink};
use std::fmt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsSink {
    tx: futures::channel::mpsc::UnboundedSender<Message>,
}

impl fmt::Debug for WsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsSink").finish()
    }
}

impl WsSink {
    /// Spawns the writer task owning `write_half` and returns a handle that
    /// can be cloned-by-`Rc` into a `Communicator`.
    pub fn spawn(mut write_half: SplitSink<WsStream, Message>) -> Self {
        let (tx, mut rx) = futures::channel::mpsc::unbounded::<Message>();
        tokio::task::spawn_local(async move {
            use futures::StreamExt;
            while let Some(message) = rx.next().await {
                if let Err(e) = write_half.send(message).await {
                    tracing::warn!(error = %e, "websocket write failed, closing writer task");
                    break;
                }
            }
            let _ = write_half.close().await;
        });
        Self { tx }
    }

    pub fn send_text(&self, text: String) -> FallibleResult<()> {
        self.tx
            .unbounded_send(Message::Text(text))
            .map_err(|e| RfcError::TransportError(e.to_string()).into())
    }

    pub fn send_close(&self) -> FallibleResult<()> {
        self.send_message(Message::Close(None))
    }

    pub fn send_text_or_close(&self, message: Message) -> FallibleResult<()> {
        self.send_message(message)
    }

    fn send_message(&self, message: Message) -> FallibleResult<()> {
        self.tx.unbounded_send(message).map_err(|e| RfcError::TransportError(e.to_string()).into())
    }
}

impl CommSink for WsSink {
    fn send(&self, invoke: &Invoke) -> FallibleResult<()> {
        self.send_text(rfc_core::encode(invoke)?)
    }
}
