//! Sentence queue: one record per accepted sentence, from parse to playback.
//!
//! Invariants kept here:
//! - at most one item is `playing`;
//! - a sentence equal to the previously accepted one is not queued again;
//! - only terminal items are ever pruned.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

pub type ItemId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueStatus {
    /// Waiting for the parser.
    Processing,
    /// Parsed; waiting for the player.
    Ready,
    /// Parser produced nothing to sign.
    NoMatch,
    /// Parser request failed.
    Error,
    Playing,
    Played,
}

impl QueueStatus {
    /// Terminal items never change again and never block the queue.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueueStatus::NoMatch | QueueStatus::Error | QueueStatus::Played
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Processing => "processing",
            QueueStatus::Ready => "ready",
            QueueStatus::NoMatch => "no-match",
            QueueStatus::Error => "error",
            QueueStatus::Playing => "playing",
            QueueStatus::Played => "played",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    pub original: String,
    pub pre_processed: String,
    pub isl_text: String,
    pub status: QueueStatus,
}

/// Result of offering a sentence to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted(ItemId),
    /// Blank after trimming.
    Empty,
    /// Same as the previously accepted sentence.
    Duplicate,
}

#[derive(Debug)]
pub struct SentenceQueue {
    items: VecDeque<QueueItem>,
    next_id: ItemId,
    last_accepted: Option<String>,
    max_retained: usize,
}

impl SentenceQueue {
    pub fn new(max_retained: usize) -> Self {
        Self {
            items: VecDeque::new(),
            next_id: 1,
            last_accepted: None,
            max_retained,
        }
    }

    /// Trim, deduplicate and enqueue a sentence as `processing`.
    pub fn accept(&mut self, sentence: &str) -> Admission {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            return Admission::Empty;
        }
        if self.last_accepted.as_deref() == Some(sentence) {
            return Admission::Duplicate;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.last_accepted = Some(sentence.to_string());
        self.items.push_back(QueueItem {
            id,
            original: sentence.to_string(),
            pre_processed: String::new(),
            isl_text: String::new(),
            status: QueueStatus::Processing,
        });
        self.prune();
        Admission::Accepted(id)
    }

    pub fn get(&self, id: ItemId) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    fn get_mut(&mut self, id: ItemId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Record a parse result. An empty pre-processed string means no match.
    ///
    /// Returns the new status, or `None` if the item is unknown or no longer processing.
    pub fn complete_parse(
        &mut self,
        id: ItemId,
        pre_processed: &str,
        isl_text: &str,
    ) -> Option<QueueStatus> {
        let item = self.get_mut(id)?;
        if item.status != QueueStatus::Processing {
            return None;
        }
        item.pre_processed = pre_processed.trim().to_string();
        item.isl_text = isl_text.trim().to_string();
        item.status = if item.pre_processed.is_empty() {
            QueueStatus::NoMatch
        } else {
            QueueStatus::Ready
        };
        Some(item.status)
    }

    /// Record a failed parse request.
    pub fn fail_parse(&mut self, id: ItemId) -> Option<QueueStatus> {
        let item = self.get_mut(id)?;
        if item.status != QueueStatus::Processing {
            return None;
        }
        item.status = QueueStatus::Error;
        Some(item.status)
    }

    /// Claim the first `ready` item for playback.
    ///
    /// Returns `None` while another item is playing or when nothing is ready.
    pub fn begin_next_playback(&mut self) -> Option<QueueItem> {
        if self.playing().is_some() {
            return None;
        }
        let item = self
            .items
            .iter_mut()
            .find(|item| item.status == QueueStatus::Ready)?;
        item.status = QueueStatus::Playing;
        Some(item.clone())
    }

    /// Mark the playing item `played`.
    pub fn finish_playback(&mut self, id: ItemId) -> bool {
        match self.get_mut(id) {
            Some(item) if item.status == QueueStatus::Playing => {
                item.status = QueueStatus::Played;
                self.prune();
                true
            }
            _ => false,
        }
    }

    pub fn playing(&self) -> Option<&QueueItem> {
        self.items
            .iter()
            .find(|item| item.status == QueueStatus::Playing)
    }

    /// Number of items in `status`.
    pub fn count(&self, status: QueueStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }

    /// True when every item is terminal.
    pub fn is_idle(&self) -> bool {
        self.items.iter().all(|item| item.status.is_terminal())
    }

    /// The newest `limit` items, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<QueueItem> {
        let skip = self.items.len().saturating_sub(limit);
        self.items.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop the oldest terminal items while over the retention limit.
    fn prune(&mut self) {
        while self.items.len() > self.max_retained {
            let Some(pos) = self.items.iter().position(|i| i.status.is_terminal()) else {
                break;
            };
            self.items.remove(pos);
        }
    }
}
