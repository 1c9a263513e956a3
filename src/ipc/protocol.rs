//! JSON message protocol between the CLI and the signing daemon.
//!
//! Each message is one JSON object on its own line: the client writes a
//! [`Command`], the daemon answers with a [`Response`] and closes.

use crate::error::{IslError, Result};
use crate::queue::{ItemId, QueueItem};
use crate::session::SessionStatus;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Commands sent by the CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Queue a sentence for signing
    Submit { text: String },
    /// List recent queue items
    Queue,
    /// Get daemon status
    Status,
    /// Shutdown the daemon
    Shutdown,
}

/// Responses sent by the daemon to the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Command succeeded
    Ok,
    /// Sentence queued under `id`
    Accepted { id: ItemId },
    /// Sentence repeated the previous one and was dropped
    Duplicate,
    /// Blank sentence; nothing queued
    Ignored,
    /// Recent queue items, oldest first
    Queue { items: Vec<QueueItem> },
    /// Current daemon status
    Status {
        status: SessionStatus,
        pacing: String,
        player: String,
    },
    /// Error occurred
    Error { message: String },
}

/// Write `message` as one JSON line and flush.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message).map_err(|e| IslError::IpcProtocol {
        message: format!("Failed to serialize message: {e}"),
    })?;
    line.push(b'\n');

    let write_failed = |e: std::io::Error| IslError::IpcConnection {
        message: format!("Failed to write message: {e}"),
    };
    writer.write_all(&line).await.map_err(write_failed)?;
    writer.flush().await.map_err(write_failed)
}

/// Read one JSON line. `Ok(None)` if the peer closed without sending one.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|e| IslError::IpcConnection {
            message: format!("Failed to read message: {e}"),
        })?;
    if read == 0 {
        return Ok(None);
    }

    serde_json::from_str(line.trim())
        .map(Some)
        .map_err(|e| IslError::IpcProtocol {
            message: format!("Malformed message: {e}"),
        })
}
