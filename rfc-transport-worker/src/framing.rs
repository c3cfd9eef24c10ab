//! Newline-delimited framing shared by both sides of the Worker transport:
//! each line is either a control sentinel or one encoded Invoke frame.
//! Encoded frames are always single-line JSON (`rfc_core::encode` never
//! inserts a literal newline), so splitting on `\n` never corrupts a frame.

use rfc_core::{FallibleResult, RfcError};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> FallibleResult<()> {
    writer.write_all(line.as_bytes()).await.map_err(|e| RfcError::TransportError(e.to_string()))?;
    writer.write_all(b"\n").await.map_err(|e| RfcError::TransportError(e.to_string()))?;
    writer.flush().await.map_err(|e| RfcError::TransportError(e.to_string()))?;
    Ok(())
}
