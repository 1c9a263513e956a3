//! Sentence sources.
//!
//! Sources deliver interim and final transcripts. Only final transcripts are
//! submitted for signing; interim ones are shown as they grow. [`FallbackSource`] switches to a secondary source
//! after repeated failures of the primary one.

use crate::error::{IslError, Result};
use crate::transcribe::TranscriptionService;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Partial transcript; display only.
    Interim(String),
    /// Finished sentence.
    Final(String),
}

/// Delivers transcript events until exhausted (`Ok(None)`).
#[async_trait]
pub trait SentenceSource: Send {
    async fn next_event(&mut self) -> Result<Option<InputEvent>>;

    fn name(&self) -> &'static str;
}

/// Typed input: every non-blank line is a final sentence.
pub struct LineSource<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> SentenceSource for LineSource<R> {
    async fn next_event(&mut self) -> Result<Option<InputEvent>> {
        loop {
            let line = self.lines.next_line().await.map_err(|e| IslError::Input {
                message: format!("failed to read line: {e}"),
            })?;
            match line {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(InputEvent::Final(line.trim().to_string()))),
                None => return Ok(None),
            }
        }
    }

    fn name(&self) -> &'static str {
        "lines"
    }
}

/// Recorded WAV chunks sent to the transcription service, one per interval.
///
/// Chunk transcripts accumulate into one sentence. Each chunk yields the text
/// so far as an interim event until a chunk ends in sentence punctuation,
/// which makes it final. Text left over when the chunks run out is final too.
pub struct TranscriptionSource {
    service: Arc<dyn TranscriptionService>,
    chunks: VecDeque<PathBuf>,
    ticker: Interval,
    pending: String,
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end().ends_with(['.', '?', '!', '\u{0964}'])
}

impl TranscriptionSource {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        chunks: Vec<PathBuf>,
        interval: Duration,
    ) -> Self {
        let mut ticker = tokio::time::interval_at(Instant::now(), interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            service,
            chunks: chunks.into(),
            ticker,
            pending: String::new(),
        }
    }

    /// Use every `*.wav` file in `dir`, in file name order.
    pub fn from_dir(
        service: Arc<dyn TranscriptionService>,
        dir: &Path,
        interval: Duration,
    ) -> Result<Self> {
        let mut chunks: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
            })
            .collect();
        chunks.sort();
        Ok(Self::new(service, chunks, interval))
    }
}

#[async_trait]
impl SentenceSource for TranscriptionSource {
    async fn next_event(&mut self) -> Result<Option<InputEvent>> {
        while let Some(chunk) = self.chunks.pop_front() {
            self.ticker.tick().await;
            let bytes = tokio::fs::read(&chunk).await.map_err(|e| IslError::Input {
                message: format!("failed to read {}: {e}", chunk.display()),
            })?;
            let text = self.service.transcribe(bytes).await?;
            let text = text.trim();
            if text.is_empty() {
                tracing::debug!(chunk = %chunk.display(), "empty transcription");
                continue;
            }

            if !self.pending.is_empty() {
                self.pending.push(' ');
            }
            self.pending.push_str(text);
            if ends_sentence(text) {
                return Ok(Some(InputEvent::Final(std::mem::take(&mut self.pending))));
            }
            return Ok(Some(InputEvent::Interim(self.pending.clone())));
        }

        if self.pending.is_empty() {
            Ok(None)
        } else {
            Ok(Some(InputEvent::Final(std::mem::take(&mut self.pending))))
        }
    }

    fn name(&self) -> &'static str {
        "transcription"
    }
}

/// Primary source with a fallback after `max_failures` consecutive errors.
pub struct FallbackSource {
    primary: Box<dyn SentenceSource>,
    fallback: Option<Box<dyn SentenceSource>>,
    failures: u32,
    max_failures: u32,
}

impl FallbackSource {
    pub fn new(
        primary: Box<dyn SentenceSource>,
        fallback: Option<Box<dyn SentenceSource>>,
        max_failures: u32,
    ) -> Self {
        Self {
            primary,
            fallback,
            failures: 0,
            max_failures: max_failures.max(1),
        }
    }

    /// Name of the source currently in use.
    pub fn active_name(&self) -> &'static str {
        self.primary.name()
    }
}

#[async_trait]
impl SentenceSource for FallbackSource {
    async fn next_event(&mut self) -> Result<Option<InputEvent>> {
        loop {
            match self.primary.next_event().await {
                Ok(event) => {
                    self.failures = 0;
                    return Ok(event);
                }
                Err(e) => {
                    self.failures += 1;
                    tracing::warn!(
                        source = self.primary.name(),
                        failures = self.failures,
                        "input source failed: {e}"
                    );
                    if self.failures < self.max_failures {
                        continue;
                    }
                    match self.fallback.take() {
                        Some(fallback) => {
                            tracing::warn!(
                                from = self.primary.name(),
                                to = fallback.name(),
                                "switching to fallback input"
                            );
                            self.primary = fallback;
                            self.failures = 0;
                        }
                        None => {
                            return Err(IslError::Input {
                                message: format!("speech input unavailable: {e}"),
                            });
                        }
                    }
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}
