//! Daemon mode: one long-lived signing session behind the IPC server.

pub mod handler;

use crate::config::Config;
use crate::error::{IslError, Result};
use crate::ipc::server::IpcServer;
use crate::sequencer::PlaybackEvent;
use crate::session::Session;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::sync::mpsc;

/// Run the daemon: build the session, start the IPC server, wait for shutdown.
///
/// Shutdown comes from SIGINT, SIGTERM or a `shutdown` command.
pub async fn run_daemon(config: Config, socket_path: Option<PathBuf>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = Session::from_config(&config, Some(tx))?;
    tracing::info!(
        catalog = %config.catalog.path.display(),
        clips = session.resolver().catalog().len(),
        parser = %config.service.parser_url,
        "session ready"
    );

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_playback_event(&event);
        }
    });

    let socket_path = socket_path.unwrap_or_else(IpcServer::default_socket_path);
    serve(session, socket_path).await
}

/// Serve `session` on `socket_path` until a signal or `shutdown` command.
pub async fn serve(session: Session, socket_path: PathBuf) -> Result<()> {
    let server = Arc::new(IpcServer::bind(socket_path)?);
    let shutdown = Arc::new(Notify::new());
    let handler = handler::DaemonCommandHandler::new(session, Arc::clone(&shutdown));

    tracing::info!(
        socket = %server.socket_path().display(),
        "IPC server listening"
    );

    let server_clone = Arc::clone(&server);
    let server_handle = tokio::spawn(async move { server_clone.run(handler).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
        }
        res = wait_for_sigterm() => {
            if let Err(e) = res {
                tracing::error!("error setting up signal handler: {e}");
            }
            tracing::info!("received SIGTERM, shutting down");
        }
        _ = shutdown.notified() => {
            tracing::info!("shutdown requested over IPC");
        }
    }

    server.stop()?;

    match server_handle.await {
        Ok(Err(e)) => tracing::error!("daemon server failed: {e}"),
        Err(e) => tracing::error!("daemon server task failed: {e}"),
        Ok(Ok(())) => {}
    }

    tracing::info!("daemon stopped");
    Ok(())
}

fn log_playback_event(event: &PlaybackEvent) {
    match event {
        PlaybackEvent::ClipStarted { index, total, clip } => {
            tracing::debug!(clip = %clip.display(), "clip {}/{}", index + 1, total);
        }
        PlaybackEvent::Hint { text } => tracing::info!(hint = %text, "hint"),
        PlaybackEvent::Finished { played, failed } => {
            tracing::debug!(played, failed, "sentence finished");
        }
    }
}

/// Wait for SIGTERM (sent by service managers).
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| IslError::Other(format!("Failed to register SIGTERM handler: {}", e)))?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    std::future::pending().await
}
