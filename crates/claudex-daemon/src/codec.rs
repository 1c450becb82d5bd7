use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{ClaudexError, Result};

/// Read a single JSONL message from an async buffered reader.
///
/// Returns `Ok(None)` on a clean EOF or a blank line (the connection's
/// natural close). A transport failure (`reader.read_line` itself erroring)
/// surfaces as `Err(ClaudexError::Io(_))`; a line that fails to parse as
/// JSON surfaces as the distinct `Err(ClaudexError::MalformedMessage(_))` so
/// the caller can tell the two apart — the former means the connection is
/// gone, the latter means one client frame was garbage and the connection
/// stays open. The caller is expected to log and drop on
/// `MalformedMessage` rather than close.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Ok(None);
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let msg: T = serde_json::from_str(trimmed)
        .map_err(|e| ClaudexError::MalformedMessage(format!("invalid JSON: {e}: {trimmed}")))?;
    Ok(Some(msg))
}

/// Write a single JSONL message and flush, so a slow consumer never holds
/// half a frame in a userspace buffer.
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(msg)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
