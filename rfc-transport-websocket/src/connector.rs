//! WebSocket client Connector (spec.md §4.6 "WebSocket client"): dials a
//! URL, sends its header envelope as the first frame, and waits for the
//! server's confirmation frame before entering OPEN.

use crate::config::WebSocketConnectorConfig;
use crate::error::WsError;
use crate::sink::WsSink;
use futures::StreamExt;
use rfc_core::{Connector as CoreConnector, FallibleResult, Provider};
use serde_json::Value;
use std::rc::Rc;
use tokio_tungstenite::tungstenite::Message;

/// Dials `config.url`, performs the header handshake and returns a
/// `Connector` already transitioned into OPEN with `provider` installed.
/// Must run inside a `tokio::task::LocalSet` (the returned Connector's
/// Communicator dispatches inbound Calls via `spawn_local`).
pub async fn connect(
    config: WebSocketConnectorConfig,
    provider: Option<Rc<dyn Provider>>,
) -> FallibleResult<Rc<CoreConnector>> {
    let connector = Rc::new(CoreConnector::new());
    connector.begin_connect()?;

    let dial = tokio_tungstenite::connect_async(&config.url).await;
    let (stream, _response) = match dial {
        Ok(pair) => pair,
        Err(e) => {
            connector.fail_connect()?;
            return Err(WsError::DialFailed { url: config.url.clone(), reason: e.to_string() }.into());
        }
    };

    let (write_half, mut read_half) = stream.split();
    let sink = Rc::new(WsSink::spawn(write_half));

    let header_frame = serde_json::json!({ "header": config.header }).to_string();
    if let Err(e) = sink.send_text(header_frame) {
        connector.fail_connect()?;
        return Err(e);
    }

    match read_half.next().await {
        Some(Ok(Message::Text(text))) => {
            if let Err(e) = serde_json::from_str::<Value>(&text) {
                connector.fail_connect()?;
                return Err(WsError::InvalidHeaderFrame(e.to_string()).into());
            }
        }
        Some(Ok(Message::Close(frame))) => {
            connector.fail_connect()?;
            let (code, reason) = frame
                .map(|f| (u16::from(f.code), f.reason.to_string()))
                .unwrap_or((1000, String::new()));
            return Err(WsError::HandshakeRejected { code, reason }.into());
        }
        Some(Ok(_)) => {
            connector.fail_connect()?;
            return Err(WsError::UnexpectedFrameKind.into());
        }
        Some(Err(e)) => {
            connector.fail_connect()?;
            return Err(WsError::DialFailed { url: config.url, reason: e.to_string() }.into());
        }
        None => {
            connector.fail_connect()?;
            return Err(WsError::HandshakeAborted.into());
        }
    }

    connector.communicator().attach_sink(sink);
    connector.mark_open(provider)?;

    let communicator = connector.communicator().clone();
    let connector_for_loop = connector.clone();
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

    Ok(connector)
}
