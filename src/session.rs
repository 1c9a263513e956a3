//! The queue drainer.
//!
//! A [`Session`] owns everything a running signer needs: the resolver, the
//! parser client, the sequencer and the sentence queue. Submitting a sentence
//! spawns its parse request; each completed parse re-triggers playback, which
//! drains `ready` items one at a time.

use crate::catalog::Catalog;
use crate::config::{Config, QueueConfig};
use crate::error::Result;
use crate::parser::{HttpParser, SentenceParser};
use crate::player::{Player, ReadySignal, build_player};
use crate::queue::{Admission, ItemId, QueueItem, QueueStatus, SentenceQueue};
use crate::resolver::Resolver;
use crate::sequencer::{PlaybackEvent, Sequencer, SequencerConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex, Notify};

/// Queue counters reported by `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub total: usize,
    pub processing: usize,
    pub ready: usize,
    pub played: usize,
    pub no_match: usize,
    pub error: usize,
    pub playing: Option<ItemId>,
    pub catalog_size: usize,
}

/// Shared signing session. Cloning is cheap; clones share one queue.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    resolver: Resolver,
    parser: Arc<dyn SentenceParser>,
    sequencer: Sequencer,
    queue: Mutex<SentenceQueue>,
    /// Woken whenever an item changes status.
    changed: Notify,
    display_limit: usize,
}

impl Session {
    pub fn new(
        resolver: Resolver,
        parser: Arc<dyn SentenceParser>,
        sequencer: Sequencer,
        queue: &QueueConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                resolver,
                parser,
                sequencer,
                queue: Mutex::new(SentenceQueue::new(queue.max_retained)),
                changed: Notify::new(),
                display_limit: queue.display_limit,
            }),
        }
    }

    /// Build a session from configuration: load the catalog, connect the
    /// parser client and start the configured player.
    pub fn from_config(
        config: &Config,
        events: Option<UnboundedSender<PlaybackEvent>>,
    ) -> Result<Self> {
        let catalog = Arc::new(Catalog::load(&config.catalog.path)?);
        let player = build_player(&config.player)?;
        let parser = Arc::new(HttpParser::new(
            config.service.parser_url.clone(),
            config.service.timeout,
        )?);
        Ok(Self::with_collaborators(config, catalog, parser, player, events))
    }

    /// Build a session around explicit collaborators.
    pub fn with_collaborators(
        config: &Config,
        catalog: Arc<Catalog>,
        parser: Arc<dyn SentenceParser>,
        player: Arc<dyn Player>,
        events: Option<UnboundedSender<PlaybackEvent>>,
    ) -> Self {
        let resolver = Resolver::new(catalog, config.input.language.tokenizer());
        let mut sequencer =
            Sequencer::new(player, ReadySignal::new(), SequencerConfig::from(config));
        if let Some(tx) = events {
            sequencer = sequencer.with_event_sender(tx);
        }
        Self::new(resolver, parser, sequencer, &config.queue)
    }

    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.inner.sequencer
    }

    /// Offer a sentence. Accepted sentences are parsed in the background.
    pub async fn submit(&self, sentence: &str) -> Admission {
        let (admission, original) = {
            let mut queue = self.inner.queue.lock().await;
            let admission = queue.accept(sentence);
            let original = match admission {
                Admission::Accepted(id) => queue.get(id).map(|item| item.original.clone()),
                _ => None,
            };
            (admission, original)
        };

        match (admission, original) {
            (Admission::Accepted(id), Some(original)) => {
                tracing::info!(id, sentence = %original, "queued sentence");
                self.inner.changed.notify_waiters();
                let session = self.clone();
                tokio::spawn(async move { session.process(id, original).await });
            }
            (Admission::Duplicate, _) => {
                tracing::debug!(sentence = sentence.trim(), "dropping duplicate sentence");
            }
            _ => {}
        }
        admission
    }

    async fn process(&self, id: ItemId, original: String) {
        let outcome = self.inner.parser.parse(&original).await;

        let status = {
            let mut queue = self.inner.queue.lock().await;
            match outcome {
                Ok(parsed) => queue.complete_parse(id, &parsed.pre_processed, &parsed.isl_text),
                Err(e) => {
                    tracing::warn!(id, sentence = %original, "parse failed: {e}");
                    queue.fail_parse(id)
                }
            }
        };
        tracing::debug!(id, status = ?status, "parse complete");
        self.inner.changed.notify_waiters();

        if status == Some(QueueStatus::Ready) {
            self.trigger_playback().await;
        }
    }

    /// Drain `ready` items unless something is already playing.
    pub async fn trigger_playback(&self) {
        let mut next = self.inner.queue.lock().await.begin_next_playback();

        while let Some(item) = next {
            self.inner.changed.notify_waiters();
            self.play_item(&item).await;

            let mut queue = self.inner.queue.lock().await;
            queue.finish_playback(item.id);
            next = queue.begin_next_playback();
            drop(queue);
            self.inner.changed.notify_waiters();
        }
    }

    async fn play_item(&self, item: &QueueItem) {
        let resolution = self.inner.resolver.resolve(&item.pre_processed);
        if !resolution.unresolved.is_empty() {
            tracing::debug!(
                id = item.id,
                unresolved = ?resolution.unresolved,
                dropped = resolution.dropped_chars,
                "spelled out unknown words"
            );
        }
        tracing::info!(
            id = item.id,
            isl = %item.isl_text,
            clips = resolution.words.len(),
            "playing sentence"
        );
        self.inner
            .sequencer
            .play(&resolution.words, &item.original)
            .await;
    }

    /// Resolve once every queued item is terminal.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.queue.lock().await.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// The most recent items, oldest first.
    pub async fn snapshot(&self) -> Vec<QueueItem> {
        self.inner
            .queue
            .lock()
            .await
            .recent(self.inner.display_limit)
    }

    pub async fn status(&self) -> SessionStatus {
        let queue = self.inner.queue.lock().await;
        SessionStatus {
            total: queue.len(),
            processing: queue.count(QueueStatus::Processing),
            ready: queue.count(QueueStatus::Ready),
            played: queue.count(QueueStatus::Played),
            no_match: queue.count(QueueStatus::NoMatch),
            error: queue.count(QueueStatus::Error),
            playing: queue.playing().map(|item| item.id),
            catalog_size: self.inner.resolver.catalog().len(),
        }
    }
}

/// True when `sentence` is the phrase that ends a listening session.
pub fn is_stop_phrase(sentence: &str, stop_phrase: &str) -> bool {
    let phrase = stop_phrase.trim();
    !phrase.is_empty() && sentence.trim().eq_ignore_ascii_case(phrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ClipEntry;
    use crate::parser::MockParser;
    use crate::player::MockPlayer;
    use std::path::PathBuf;
    use std::time::Duration;

    fn catalog(names: &[&str]) -> Arc<Catalog> {
        Arc::new(Catalog::new(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| ClipEntry {
                    id: i as u32 + 1,
                    name: n.to_string(),
                    file_name: format!("{n}.sigml"),
                })
                .collect(),
        ))
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.playback.clip_timeout = Duration::from_secs(2);
        config.playback.poll_interval = Duration::from_millis(5);
        config
    }

    fn session(parser: MockParser, player: MockPlayer) -> Session {
        Session::with_collaborators(
            &test_config(),
            catalog(&["hello", "world", "a", "b", "c", "d", "h", "i"]),
            Arc::new(parser),
            Arc::new(player),
            None,
        )
    }

    async fn settle(session: &Session) {
        tokio::time::timeout(Duration::from_secs(5), session.wait_idle())
            .await
            .expect("session should go idle");
    }

    fn file_names(player: &MockPlayer) -> Vec<String> {
        player
            .played()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn sentence_plays_its_clips_in_order() {
        let player = MockPlayer::new().with_clip_duration(Duration::from_millis(5));
        let session = session(MockParser::new(), player.clone());

        let Admission::Accepted(id) = session.submit("hello world.").await else {
            panic!("sentence should be accepted");
        };
        settle(&session).await;

        assert_eq!(
            player.played(),
            vec![
                PathBuf::from("SignFiles/hello.sigml"),
                PathBuf::from("SignFiles/world.sigml")
            ]
        );
        let items = session.snapshot().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].status, QueueStatus::Played);
    }

    #[tokio::test]
    async fn empty_sentence_makes_no_request() {
        let parser = MockParser::new();
        let session = session(parser.clone(), MockPlayer::new());

        assert_eq!(session.submit("   ").await, Admission::Empty);
        settle(&session).await;

        assert!(parser.calls().is_empty());
        assert!(session.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn parser_failure_marks_error_without_playback() {
        let parser = MockParser::new().with_failure("hello", "Java is not installed");
        let player = MockPlayer::new();
        let session = session(parser, player.clone());

        session.submit("hello").await;
        settle(&session).await;

        let status = session.status().await;
        assert_eq!(status.error, 1);
        assert!(player.played().is_empty());
    }

    #[tokio::test]
    async fn empty_parse_is_no_match() {
        let parser = MockParser::new().with_response("um", "", "");
        let session = session(parser, MockPlayer::new());

        session.submit("um").await;
        settle(&session).await;

        assert_eq!(session.status().await.no_match, 1);
    }

    #[tokio::test]
    async fn unresolvable_sentence_completes_without_player() {
        let player = MockPlayer::new();
        let session = session(MockParser::new(), player.clone());

        session.submit("zzz 99").await;
        settle(&session).await;

        assert!(player.played().is_empty());
        assert_eq!(session.status().await.played, 1);
    }

    #[tokio::test]
    async fn consecutive_duplicates_are_queued_once() {
        let parser = MockParser::new();
        let session = session(parser.clone(), MockPlayer::new());

        assert!(matches!(session.submit("hello").await, Admission::Accepted(_)));
        assert_eq!(session.submit("hello").await, Admission::Duplicate);
        settle(&session).await;

        assert_eq!(session.snapshot().await.len(), 1);
        assert_eq!(parser.calls(), vec!["hello"]);
    }

    #[tokio::test]
    async fn ready_item_overtakes_slow_parse() {
        let parser = MockParser::new().with_delay("hello", Duration::from_millis(80));
        let player = MockPlayer::new();
        let session = session(parser, player.clone());

        session.submit("hello").await;
        session.submit("world").await;
        settle(&session).await;

        assert_eq!(file_names(&player), vec!["world.sigml", "hello.sigml"]);
    }

    #[tokio::test]
    async fn at_most_one_item_plays_at_a_time() {
        let sentences = ["a b", "c d", "b a", "d c", "a c", "b d"];
        let mut parser = MockParser::new();
        for (i, s) in sentences.iter().enumerate() {
            parser = parser.with_delay(s, Duration::from_millis((i as u64 * 7) % 20));
        }
        let player = MockPlayer::new().with_clip_duration(Duration::from_millis(3));
        let session = session(parser, player.clone());

        let watcher = {
            let session = session.clone();
            tokio::spawn(async move {
                let mut max_playing = 0;
                for _ in 0..400 {
                    let playing = session.inner.queue.lock().await.count(QueueStatus::Playing);
                    max_playing = max_playing.max(playing);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                max_playing
            })
        };

        for s in sentences {
            session.submit(s).await;
        }
        settle(&session).await;

        assert!(watcher.await.unwrap() <= 1);
        let played = file_names(&player);
        assert_eq!(played.len(), sentences.len() * 2);
        // Clips of one sentence are never interleaved with another's
        for pair in played.chunks(2) {
            let joined = format!(
                "{} {}",
                pair[0].trim_end_matches(".sigml"),
                pair[1].trim_end_matches(".sigml")
            );
            assert!(sentences.contains(&joined.as_str()), "interleaved: {joined}");
        }
    }

    #[tokio::test]
    async fn status_reports_catalog_size() {
        let session = session(MockParser::new(), MockPlayer::new());
        let status = session.status().await;
        assert_eq!(status.catalog_size, 8);
        assert_eq!(status.total, 0);
        assert_eq!(status.playing, None);
    }

    #[test]
    fn stop_phrase_matches_case_insensitively() {
        assert!(is_stop_phrase("  Stop Avatar ", "stop avatar"));
        assert!(!is_stop_phrase("stop the avatar", "stop avatar"));
        assert!(!is_stop_phrase("", ""));
    }
}
