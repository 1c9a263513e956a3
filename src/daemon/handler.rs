//! Command handler implementation for the daemon.

use crate::ipc::protocol::{Command, Response};
use crate::ipc::server::CommandHandler;
use crate::queue::Admission;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Notify;

/// Maps IPC commands onto the daemon's session.
pub struct DaemonCommandHandler {
    session: Session,
    shutdown: Arc<Notify>,
}

impl DaemonCommandHandler {
    pub fn new(session: Session, shutdown: Arc<Notify>) -> Self {
        Self { session, shutdown }
    }

    async fn submit(&self, text: &str) -> Response {
        match self.session.submit(text).await {
            Admission::Accepted(id) => Response::Accepted { id },
            Admission::Duplicate => Response::Duplicate,
            Admission::Empty => Response::Ignored,
        }
    }

    async fn get_status(&self) -> Response {
        let sequencer = self.session.sequencer();
        Response::Status {
            status: self.session.status().await,
            pacing: sequencer.pacing().as_str().to_string(),
            player: sequencer.player_name().to_string(),
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for DaemonCommandHandler {
    async fn handle(&self, command: Command) -> Response {
        match command {
            Command::Submit { text } => self.submit(&text).await,
            Command::Queue => Response::Queue {
                items: self.session.snapshot().await,
            },
            Command::Status => self.get_status().await,
            Command::Shutdown => {
                // Stored permit: the daemon wakes even if it is not waiting yet
                self.shutdown.notify_one();
                Response::Ok
            }
        }
    }
}
