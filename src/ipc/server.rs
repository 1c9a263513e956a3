//! Unix socket server for the signing daemon.

use crate::error::{IslError, Result};
use crate::ipc::protocol::{Command, Response, read_frame, write_frame};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;

/// Maps each daemon command to its response.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: Command) -> Response;
}

/// A bound daemon socket. One request line in, one response line out.
pub struct IpcServer {
    socket_path: PathBuf,
    listener: UnixListener,
    shutdown: watch::Sender<bool>,
}

impl IpcServer {
    /// Bind `socket_path`, replacing a socket left behind by an earlier run.
    pub fn bind(socket_path: PathBuf) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(&socket_path).map_err(|e| IslError::IpcSocket {
                message: format!("Failed to remove stale socket: {e}"),
            })?;
        }

        let listener = UnixListener::bind(&socket_path).map_err(|e| IslError::IpcSocket {
            message: format!("Failed to bind {}: {e}", socket_path.display()),
        })?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            socket_path,
            listener,
            shutdown,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// `$XDG_RUNTIME_DIR/islplay.sock`, or `/tmp/islplay-<uid>.sock`.
    pub fn default_socket_path() -> PathBuf {
        match std::env::var_os("XDG_RUNTIME_DIR").filter(|dir| !dir.is_empty()) {
            Some(dir) => PathBuf::from(dir).join("islplay.sock"),
            None => {
                let uid = unsafe { libc::getuid() };
                PathBuf::from(format!("/tmp/islplay-{uid}.sock"))
            }
        }
    }

    /// Serve connections until [`IpcServer::stop`] is called.
    pub async fn run<H>(&self, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        let handler = Arc::new(handler);
        let mut stopped = self.shutdown.subscribe();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, _) = accepted.map_err(|e| IslError::IpcConnection {
                        message: format!("Failed to accept connection: {e}"),
                    })?;
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler.as_ref()).await {
                            tracing::warn!("IPC client error: {e}");
                        }
                    });
                }
                _ = async { stopped.wait_for(|stop| *stop).await.is_err() } => break,
            }
        }

        tracing::debug!(socket = %self.socket_path.display(), "IPC server stopped");
        Ok(())
    }

    /// End [`IpcServer::run`] and remove the socket file.
    pub fn stop(&self) -> Result<()> {
        self.shutdown.send_replace(true);

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| IslError::IpcSocket {
                message: format!("Failed to remove socket: {e}"),
            })?;
        }
        Ok(())
    }
}

async fn handle_client<H: CommandHandler>(stream: UnixStream, handler: &H) -> Result<()> {
    let (reader, mut writer) = stream.into_split();

    let response = match read_frame::<_, Command>(&mut BufReader::new(reader)).await {
        Ok(Some(command)) => {
            tracing::debug!(?command, "IPC command");
            handler.handle(command).await
        }
        Ok(None) => return Ok(()),
        // Malformed requests get an error reply instead of a dropped connection
        Err(IslError::IpcProtocol { message }) => Response::Error { message },
        Err(e) => return Err(e),
    };

    write_frame(&mut writer, &response).await
}
