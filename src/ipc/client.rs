//! Client side of the daemon socket.

use crate::error::{IslError, Result};
use crate::ipc::protocol::{Command, Response, read_frame, write_frame};
use std::path::Path;
use tokio::io::BufReader;
use tokio::net::UnixStream;

/// Send one command to the daemon and wait for its response.
///
/// # Errors
/// `IslError::IpcConnection` if the daemon cannot be reached, and
/// `IslError::IpcProtocol` if it replies with something other than a response.
pub async fn send_command(socket_path: &Path, command: Command) -> Result<Response> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| IslError::IpcConnection {
            message: format!("Failed to connect to daemon: {e}"),
        })?;
    let (reader, mut writer) = stream.into_split();

    write_frame(&mut writer, &command).await?;
    read_frame(&mut BufReader::new(reader))
        .await?
        .ok_or_else(|| IslError::IpcProtocol {
            message: "daemon closed the connection without replying".to_string(),
        })
}
