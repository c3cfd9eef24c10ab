//! WebSocket server (spec.md §4.6 "WebSocket server (multi-client)"): binds
//! a TCP port, and for each upgrade reads exactly one header frame before
//! constructing an [`Acceptor`] that hands the decision to `accept(provider)`
//! or `reject(code, reason)` to the caller. Business frames are never
//! processed while the acceptor is pending.
//!
//! Per spec.md §5 each Communicator lives on its own single logical thread;
//! a multi-client server therefore gives every accepted connection its own
//! OS thread with a fresh current-thread runtime and `LocalSet`, rather than
//! sharing one `LocalSet` (and thus one thread) across all clients.

use crate::config::WebSocketServerConfig;
use crate::error::WsError;
use crate::sink::WsSink;
use futures::StreamExt;
use rfc_core::{Connector as CoreConnector, FallibleResult, Provider, RfcError, Server as CoreServer};
use serde_json::Value;
use std::future::Future;
use std::rc::Rc;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
use tokio_tungstenite::tungstenite::Message;

/// A pending per-client connection: the header has been read but the
/// handler hasn't yet decided whether to admit it.
pub struct Acceptor {
    connector: Rc<CoreConnector>,
    header: Value,
    sink: Rc<WsSink>,
    read_half: futures::stream::SplitStream<crate::sink::WsStream>,
}

impl Acceptor {
    pub fn header(&self) -> &Value {
        &self.header
    }

    /// Admits the connection: replies with an empty confirmation frame,
    /// installs `provider` and transitions the Connector into OPEN. Must run
    /// inside a `tokio::task::LocalSet`.
    pub fn accept(self, provider: Option<Rc<dyn Provider>>) -> FallibleResult<Rc<CoreConnector>> {
        self.sink.send_text("{}".to_string())?;
        self.connector.communicator().attach_sink(self.sink);
        self.connector.mark_open(provider)?;

        let communicator = self.connector.communicator().clone();
        let connector_for_loop = self.connector.clone();
        let mut read_half = self.read_half;
        tokio::task::spawn_local(async move {
            while let Some(frame) = read_half.next().await {
                match frame {
                    Ok(Message::Text(text)) => match rfc_core::decode(&text) {
                        Ok(invoke) => communicator.reply_data(invoke),
                        Err(e) => {
                            tracing::error!(error = %e, "malformed frame, closing connection");
                            break;
                        }
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            let _ = connector_for_loop.fail();
        });

        Ok(self.connector)
    }

    /// Rejects the connection: closes the socket with `code`/`reason` and
    /// leaves the Connector in CLOSED without ever having installed a
    /// provider.
    pub fn reject(self, code: u16, reason: String) -> FallibleResult<()> {
        let frame = CloseFrame { code: CloseCode::from(code), reason: reason.into() };
        self.sink
            .send_text_or_close(Message::Close(Some(frame)))
            .and_then(|_| self.connector.fail_connect())
    }
}

/// Binds `config.addr` and drives the accept loop until an unrecoverable
/// listener error occurs, calling `handler` once per upgraded connection
/// with its freshly-read [`Acceptor`]. `handler` runs on the connection's
/// own OS thread, inside that thread's own `LocalSet` — it does not need to
/// be `Send` itself, only constructible from a `Send + Clone` factory.
pub async fn serve<F, Fut>(
    config: WebSocketServerConfig,
    server: Rc<CoreServer>,
    handler: F,
) -> FallibleResult<()>
where
    F: Fn(Acceptor) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = FallibleResult<()>> + 'static,
{
    server.begin_open()?;
    let listener = TcpListener::bind(&config.addr)
        .await
        .map_err(|e| WsError::BindFailed { addr: config.addr.clone(), reason: e.to_string() })?;
    server.mark_listening()?;

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "accept() failed, continuing");
                continue;
            }
        };
        let handler = handler.clone();
        let header_timeout = config.header_timeout;
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build();
            let rt = match rt {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(error = %e, %peer, "failed to build per-connection runtime");
                    return;
                }
            };
            let local = tokio::task::LocalSet::new();
            local.block_on(&rt, async move {
                if let Err(e) = handle_connection(stream, header_timeout, handler).await {
                    tracing::warn!(error = %e, %peer, "connection handshake failed");
                }
            });
        });
    }
}

async fn handle_connection<F, Fut>(
    stream: tokio::net::TcpStream,
    header_timeout: Option<std::time::Duration>,
    handler: F,
) -> FallibleResult<()>
where
    F: Fn(Acceptor) -> Fut,
    Fut: Future<Output = FallibleResult<()>>,
{
    let accept = tokio_tungstenite::accept_async(tokio_tungstenite::MaybeTlsStream::Plain(stream));
    let ws_stream = match header_timeout {
        Some(timeout) => tokio::time::timeout(timeout, accept)
            .await
            .map_err(|_| RfcError::TransportError("timed out waiting for upgrade".into()))??,
        None => accept.await?,
    };

    let (write_half, mut read_half) = ws_stream.split();
    let connector = Rc::new(CoreConnector::new());
    connector.begin_connect()?;
    let sink = Rc::new(WsSink::spawn(write_half));

    let first_frame = match header_timeout {
        Some(timeout) => tokio::time::timeout(timeout, read_half.next())
            .await
            .map_err(|_| RfcError::TransportError("timed out waiting for header frame".into()))?,
        None => read_half.next().await,
    };

    let header = match first_frame {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
            Ok(envelope) => envelope.get("header").cloned().unwrap_or(Value::Null),
            Err(e) => {
                connector.fail_connect()?;
                return Err(WsError::InvalidHeaderFrame(e.to_string()).into());
            }
        },
        Some(Ok(Message::Close(_))) | None => {
            connector.fail_connect()?;
            return Err(WsError::HandshakeAborted.into());
        }
        Some(Ok(_)) => {
            connector.fail_connect()?;
            return Err(WsError::UnexpectedFrameKind.into());
        }
        Some(Err(e)) => {
            connector.fail_connect()?;
            return Err(WsError::InvalidHeaderFrame(e.to_string()).into());
        }
    };

    let acceptor = Acceptor { connector, header, sink, read_half };
    handler(acceptor).await
}
