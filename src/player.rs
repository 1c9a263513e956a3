//! Avatar player collaborators.
//!
//! A [`Player`] starts a clip and returns immediately. It reports that the
//! avatar can take the next clip by finishing the [`ClipTicket`] it was
//! handed. Each claim of the [`ReadySignal`] bumps a generation counter, so a
//! ticket from an earlier clip can never mark a later one finished.
//!
//! The `Player` trait lets the renderer be swapped (logging, external command, mock).

use crate::config::{PlayerConfig, PlayerKind};
use crate::error::{IslError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

/// Shared "player ready" flag.
///
/// Starts ready. The sequencer claims it before starting a clip and gets a
/// [`ClipTicket`]; the player finishes the ticket when the clip has ended.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    inner: Arc<ReadyInner>,
}

#[derive(Debug)]
struct ReadyInner {
    state: Mutex<ReadyState>,
    notify: Notify,
}

#[derive(Debug, Clone, Copy)]
struct ReadyState {
    ready: bool,
    generation: u64,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ReadyInner {
                state: Mutex::new(ReadyState {
                    ready: true,
                    generation: 0,
                }),
                notify: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReadyState> {
        match self.inner.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state().ready
    }

    fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Take exclusive use of the player. Returns `None` if it is busy.
    pub fn try_claim(&self) -> Option<ClipTicket> {
        let mut state = self.state();
        if !state.ready {
            return None;
        }
        state.ready = false;
        state.generation += 1;
        Some(ClipTicket {
            signal: self.clone(),
            generation: state.generation,
        })
    }

    /// Give up on the current clip: mark ready and void its ticket.
    pub fn release(&self) {
        {
            let mut state = self.state();
            state.ready = true;
            state.generation += 1;
        }
        self.inner.notify.notify_waiters();
    }

    /// Wait until the flag is set.
    pub async fn wait_ready(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_ready() {
                return;
            }
            notified.await;
        }
    }
}

/// Permission to play one clip, handed to the player.
#[derive(Debug)]
pub struct ClipTicket {
    signal: ReadySignal,
    generation: u64,
}

impl ClipTicket {
    /// True while no later claim or release has happened.
    pub fn is_current(&self) -> bool {
        self.signal.generation() == self.generation
    }

    /// Mark the clip finished. No-op (returns false) for a stale ticket.
    pub fn finish(&self) -> bool {
        {
            let mut state = self.signal.state();
            if state.generation != self.generation {
                return false;
            }
            state.ready = true;
        }
        self.signal.inner.notify.notify_waiters();
        true
    }

    /// Resolves once the ticket is stale, e.g. after the sequencer timed
    /// the clip out. Players stop their clip when this fires.
    pub async fn superseded(&self) {
        loop {
            let notified = self.signal.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_current() {
                return;
            }
            notified.await;
        }
    }
}

/// Sleep for `duration` unless the ticket is superseded first.
async fn finish_after(duration: Duration, ticket: ClipTicket) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {
            ticket.finish();
        }
        _ = ticket.superseded() => {}
    }
}

/// Renders sign clips on the avatar.
#[async_trait]
pub trait Player: Send + Sync {
    /// Start playing `clip`.
    ///
    /// Returns once playback has started. Implementations must call
    /// `ticket.finish()` when the clip ends, and should stop the clip once
    /// `ticket.superseded()` resolves.
    async fn play(&self, clip: &Path, ticket: ClipTicket) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Build the configured player.
pub fn build_player(config: &PlayerConfig) -> Result<Arc<dyn Player>> {
    match config.kind {
        PlayerKind::Log => Ok(Arc::new(LogPlayer::new(config.clip_duration))),
        PlayerKind::Command => {
            let command = config
                .command
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or_else(|| IslError::ConfigInvalidValue {
                    key: "player.command".to_string(),
                    message: "required when player.kind = \"command\"".to_string(),
                })?;
            Ok(Arc::new(CommandPlayer::new(command, config.args.clone())))
        }
    }
}

/// Logs each clip and pretends it lasts a fixed duration.
#[derive(Debug, Clone)]
pub struct LogPlayer {
    clip_duration: Duration,
}

impl LogPlayer {
    pub fn new(clip_duration: Duration) -> Self {
        Self { clip_duration }
    }
}

#[async_trait]
impl Player for LogPlayer {
    async fn play(&self, clip: &Path, ticket: ClipTicket) -> Result<()> {
        tracing::info!(clip = %clip.display(), "playing clip");
        tokio::spawn(finish_after(self.clip_duration, ticket));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Runs an external program per clip; the clip path is the last argument.
/// The clip counts as finished when the program exits. A superseded clip's
/// process is killed.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    command: String,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl Player for CommandPlayer {
    async fn play(&self, clip: &Path, ticket: ClipTicket) -> Result<()> {
        let mut child = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(clip)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    IslError::PlayerNotFound {
                        command: self.command.clone(),
                    }
                } else {
                    IslError::PlayerFailed {
                        message: format!("Failed to execute {}: {}", self.command, e),
                    }
                }
            })?;

        let command = self.command.clone();
        let clip = clip.to_path_buf();
        tokio::spawn(async move {
            let superseded = tokio::select! {
                exit = child.wait() => {
                    match exit {
                        Ok(status) if !status.success() => {
                            tracing::warn!(%command, clip = %clip.display(), %status, "player exited with failure");
                        }
                        Err(e) => {
                            tracing::warn!(%command, clip = %clip.display(), "failed to wait for player: {e}");
                        }
                        Ok(_) => {}
                    }
                    false
                }
                _ = ticket.superseded() => true,
            };
            if superseded {
                tracing::warn!(%command, clip = %clip.display(), "stopping superseded player");
                if let Err(e) = child.kill().await {
                    tracing::warn!(%command, "failed to kill player: {e}");
                }
            } else {
                ticket.finish();
            }
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Player double that records clips instead of rendering them.
#[derive(Debug, Clone, Default)]
pub struct MockPlayer {
    played: Arc<Mutex<Vec<PathBuf>>>,
    clip_duration: Duration,
    fail_on: Option<String>,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal ready only after `duration` instead of immediately.
    pub fn with_clip_duration(mut self, duration: Duration) -> Self {
        self.clip_duration = duration;
        self
    }

    /// Fail clips whose file name equals `file_name`.
    pub fn with_failure_on(mut self, file_name: &str) -> Self {
        self.fail_on = Some(file_name.to_string());
        self
    }

    /// Clips started so far, in order.
    pub fn played(&self) -> Vec<PathBuf> {
        match self.played.lock() {
            Ok(played) => played.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Player for MockPlayer {
    async fn play(&self, clip: &Path, ticket: ClipTicket) -> Result<()> {
        if let Some(ref fail_on) = self.fail_on
            && clip.file_name().is_some_and(|f| f == fail_on.as_str())
        {
            return Err(IslError::PlayerFailed {
                message: format!("mock failure for {}", clip.display()),
            });
        }

        match self.played.lock() {
            Ok(mut played) => played.push(clip.to_path_buf()),
            Err(poisoned) => poisoned.into_inner().push(clip.to_path_buf()),
        }

        if self.clip_duration.is_zero() {
            ticket.finish();
        } else {
            tokio::spawn(finish_after(self.clip_duration, ticket));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
