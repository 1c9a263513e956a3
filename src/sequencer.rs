//! Plays one sentence's clips through the player, one at a time.
//!
//! A clip is started only after the ready flag has been claimed, and the
//! sentence completes only once the last clip has finished (flag ready
//! again). In `poll` pacing the flag is sampled on a fixed timer; in `event`
//! pacing the sequencer wakes as soon as the player sets it. In both modes a
//! clip that runs past `clip_timeout` is released and its ticket voided, so a
//! late finish from that clip cannot start the next one early.

use crate::config::{Config, Pacing};
use crate::player::{ClipTicket, Player, ReadySignal};
use crate::resolver::ResolvedWord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, MissedTickBehavior};

/// Display events emitted while a sentence plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// A clip was handed to the player.
    ClipStarted {
        index: usize,
        total: usize,
        clip: PathBuf,
    },
    /// Text to show as the current hint.
    Hint { text: String },
    /// All clips finished.
    Finished { played: usize, failed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    AwaitingReady,
    Playing,
    Done,
}

/// Outcome of one sequencing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub played: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    pub pacing: Pacing,
    pub poll_interval: Duration,
    pub clip_timeout: Duration,
    /// Prepended to each clip's file name.
    pub clip_dir: PathBuf,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SequencerConfig {
    fn from(config: &Config) -> Self {
        Self {
            pacing: config.playback.pacing,
            poll_interval: config.playback.poll_interval,
            clip_timeout: config.playback.clip_timeout,
            clip_dir: config.catalog.clip_dir.clone(),
        }
    }
}

pub struct Sequencer {
    player: Arc<dyn Player>,
    ready: ReadySignal,
    config: SequencerConfig,
    state: Mutex<SequencerState>,
    /// Held for the duration of a run so runs never overlap.
    active: tokio::sync::Mutex<()>,
    events: Option<UnboundedSender<PlaybackEvent>>,
}

impl Sequencer {
    pub fn new(player: Arc<dyn Player>, ready: ReadySignal, config: SequencerConfig) -> Self {
        Self {
            player,
            ready,
            config,
            state: Mutex::new(SequencerState::Idle),
            active: tokio::sync::Mutex::new(()),
            events: None,
        }
    }

    pub fn with_event_sender(mut self, tx: UnboundedSender<PlaybackEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> SequencerState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn ready_signal(&self) -> &ReadySignal {
        &self.ready
    }

    pub fn pacing(&self) -> Pacing {
        self.config.pacing
    }

    pub fn player_name(&self) -> &'static str {
        self.player.name()
    }

    /// Play `words` in order, then show `final_hint`.
    ///
    /// An empty sequence completes at once without touching the player.
    pub async fn play(&self, words: &[ResolvedWord], final_hint: &str) -> PlaybackReport {
        let _active = self.active.lock().await;

        let report = if words.is_empty() {
            PlaybackReport::default()
        } else {
            match self.config.pacing {
                Pacing::Poll => self.run_polling(words).await,
                Pacing::Event => self.run_event_driven(words).await,
            }
        };

        self.set_state(SequencerState::Done);
        self.emit(PlaybackEvent::Hint {
            text: final_hint.to_string(),
        });
        self.emit(PlaybackEvent::Finished {
            played: report.played,
            failed: report.failed,
        });
        tracing::debug!(
            played = report.played,
            failed = report.failed,
            "sentence playback finished"
        );
        report
    }

    async fn run_polling(&self, words: &[ResolvedWord]) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        let period = self.config.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut index = 0;
        let mut claimed_at: Option<Instant> = None;
        self.set_state(SequencerState::AwaitingReady);
        loop {
            ticker.tick().await;

            if !self.ready.is_ready()
                && claimed_at.is_some_and(|at| at.elapsed() >= self.config.clip_timeout)
            {
                self.give_up_on_clip();
            }

            if index == words.len() {
                if self.ready.is_ready() {
                    break;
                }
                continue;
            }

            if let Some(ticket) = self.ready.try_claim() {
                claimed_at = Some(Instant::now());
                self.start_clip(index, words, ticket, &mut report).await;
                index += 1;
                self.set_state(SequencerState::AwaitingReady);
            }
        }
        report
    }

    async fn run_event_driven(&self, words: &[ResolvedWord]) -> PlaybackReport {
        let mut report = PlaybackReport::default();

        for index in 0..words.len() {
            self.set_state(SequencerState::AwaitingReady);
            let ticket = loop {
                self.await_ready().await;
                if let Some(ticket) = self.ready.try_claim() {
                    break ticket;
                }
            };
            self.start_clip(index, words, ticket, &mut report).await;
        }

        self.set_state(SequencerState::AwaitingReady);
        self.await_ready().await;
        report
    }

    /// Wait for the player, giving up on the clip if it never finishes.
    async fn await_ready(&self) {
        if tokio::time::timeout(self.config.clip_timeout, self.ready.wait_ready())
            .await
            .is_err()
        {
            self.give_up_on_clip();
        }
    }

    fn give_up_on_clip(&self) {
        tracing::warn!(
            timeout = ?self.config.clip_timeout,
            player = self.player.name(),
            "player did not finish clip in time; continuing"
        );
        self.ready.release();
    }

    /// Hand clip `index` to the player under a claimed `ticket`.
    async fn start_clip(
        &self,
        index: usize,
        words: &[ResolvedWord],
        ticket: ClipTicket,
        report: &mut PlaybackReport,
    ) {
        let word = &words[index];
        let clip = self.config.clip_dir.join(&word.file_name);
        self.set_state(SequencerState::Playing);

        match self.player.play(&clip, ticket).await {
            Ok(()) => {
                report.played += 1;
                self.emit(PlaybackEvent::ClipStarted {
                    index,
                    total: words.len(),
                    clip,
                });
                self.emit(PlaybackEvent::Hint {
                    text: word.word.clone(),
                });
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(clip = %clip.display(), "skipping clip: {e}");
                self.ready.release();
            }
        }
    }

    fn set_state(&self, next: SequencerState) {
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(ref tx) = self.events
            && tx.send(event).is_err()
        {
            // Receiver dropped - display is optional
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::MockPlayer;
    use std::collections::HashMap;
    use std::path::Path;
    use tokio::sync::mpsc;

    fn words(names: &[&str]) -> Vec<ResolvedWord> {
        names
            .iter()
            .map(|n| ResolvedWord::new(*n, format!("{n}.sigml")))
            .collect()
    }

    fn config(pacing: Pacing) -> SequencerConfig {
        SequencerConfig {
            pacing,
            poll_interval: Duration::from_millis(5),
            clip_timeout: Duration::from_secs(2),
            clip_dir: PathBuf::from("SignFiles"),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn event_pacing_plays_clips_in_order() {
        let player = MockPlayer::new().with_clip_duration(Duration::from_millis(5));
        let sequencer = Sequencer::new(
            Arc::new(player.clone()),
            ReadySignal::new(),
            config(Pacing::Event),
        );

        let report = sequencer.play(&words(&["hello", "world"]), "hello world").await;

        assert_eq!(report, PlaybackReport { played: 2, failed: 0 });
        assert_eq!(
            player.played(),
            vec![
                PathBuf::from("SignFiles/hello.sigml"),
                PathBuf::from("SignFiles/world.sigml")
            ]
        );
        assert_eq!(sequencer.state(), SequencerState::Done);
        assert!(sequencer.ready_signal().is_ready());
    }

    #[tokio::test]
    async fn poll_pacing_plays_clips_in_order() {
        let player = MockPlayer::new().with_clip_duration(Duration::from_millis(12));
        let sequencer = Sequencer::new(
            Arc::new(player.clone()),
            ReadySignal::new(),
            config(Pacing::Poll),
        );

        let report = sequencer.play(&words(&["a", "b", "c"]), "abc").await;

        assert_eq!(report.played, 3);
        assert_eq!(
            player.played(),
            vec![
                PathBuf::from("SignFiles/a.sigml"),
                PathBuf::from("SignFiles/b.sigml"),
                PathBuf::from("SignFiles/c.sigml")
            ]
        );
        assert!(sequencer.ready_signal().is_ready());
    }

    #[tokio::test]
    async fn poll_pacing_waits_for_last_clip_to_finish() {
        let player = MockPlayer::new().with_clip_duration(Duration::from_millis(60));
        let sequencer = Sequencer::new(
            Arc::new(player.clone()),
            ReadySignal::new(),
            config(Pacing::Poll),
        );

        let started = std::time::Instant::now();
        sequencer.play(&words(&["only"]), "only").await;

        assert!(started.elapsed() >= Duration::from_millis(60));
        assert!(sequencer.ready_signal().is_ready());
    }

    #[tokio::test]
    async fn empty_sequence_completes_without_player() {
        let player = MockPlayer::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sequencer = Sequencer::new(
            Arc::new(player.clone()),
            ReadySignal::new(),
            config(Pacing::Poll),
        )
        .with_event_sender(tx);

        let report = sequencer.play(&[], "nothing to sign").await;

        assert_eq!(report, PlaybackReport::default());
        assert!(player.played().is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![
                PlaybackEvent::Hint {
                    text: "nothing to sign".to_string()
                },
                PlaybackEvent::Finished {
                    played: 0,
                    failed: 0
                }
            ]
        );
    }

    #[tokio::test]
    async fn emits_hint_per_clip_then_final_hint() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sequencer = Sequencer::new(
            Arc::new(MockPlayer::new()),
            ReadySignal::new(),
            config(Pacing::Event),
        )
        .with_event_sender(tx);

        sequencer.play(&words(&["hi", "there"]), "Hi there").await;

        let hints: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                PlaybackEvent::Hint { text } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(hints, vec!["hi", "there", "Hi there"]);
    }

    #[tokio::test]
    async fn failing_clip_is_skipped() {
        let player = MockPlayer::new().with_failure_on("b.sigml");
        let sequencer = Sequencer::new(
            Arc::new(player.clone()),
            ReadySignal::new(),
            config(Pacing::Event),
        );

        let report = sequencer.play(&words(&["a", "b", "c"]), "abc").await;

        assert_eq!(report, PlaybackReport { played: 2, failed: 1 });
        assert_eq!(
            player.played(),
            vec![
                PathBuf::from("SignFiles/a.sigml"),
                PathBuf::from("SignFiles/c.sigml")
            ]
        );
    }

    /// Never reports ready.
    struct SilentPlayer;

    #[async_trait::async_trait]
    impl Player for SilentPlayer {
        async fn play(&self, _clip: &Path, _ticket: ClipTicket) -> crate::Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "silent"
        }
    }

    /// Finishes each clip after its own duration and ignores cancellation.
    #[derive(Default)]
    struct StubbornPlayer {
        durations: HashMap<String, Duration>,
        starts: Mutex<Vec<(String, std::time::Instant)>>,
    }

    #[async_trait::async_trait]
    impl Player for StubbornPlayer {
        async fn play(&self, clip: &Path, ticket: ClipTicket) -> crate::Result<()> {
            let stem = clip.file_stem().unwrap().to_string_lossy().to_string();
            let duration = self.durations.get(&stem).copied().unwrap_or_default();
            self.starts
                .lock()
                .unwrap()
                .push((stem, std::time::Instant::now()));
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                ticket.finish();
            });
            Ok(())
        }

        fn name(&self) -> &'static str {
            "stubborn"
        }
    }

    #[tokio::test]
    async fn stuck_player_times_out() {
        let mut cfg = config(Pacing::Event);
        cfg.clip_timeout = Duration::from_millis(20);
        let sequencer = Sequencer::new(Arc::new(SilentPlayer), ReadySignal::new(), cfg);

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            sequencer.play(&words(&["a", "b"]), "ab"),
        )
        .await
        .expect("timeout should unblock the sequencer");
        assert_eq!(report.played, 2);
    }

    #[tokio::test]
    async fn stuck_player_times_out_when_polling() {
        let mut cfg = config(Pacing::Poll);
        cfg.clip_timeout = Duration::from_millis(30);
        let sequencer = Sequencer::new(Arc::new(SilentPlayer), ReadySignal::new(), cfg);

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            sequencer.play(&words(&["a", "b"]), "ab"),
        )
        .await
        .expect("timeout should unblock the polling sequencer");
        assert_eq!(report.played, 2);
        assert!(sequencer.ready_signal().is_ready());
    }

    #[tokio::test]
    async fn late_finish_of_timed_out_clip_does_not_cut_next_clip_short() {
        let player = Arc::new(StubbornPlayer {
            durations: HashMap::from([
                ("a".to_string(), Duration::from_millis(100)),
                ("b".to_string(), Duration::from_millis(200)),
                ("c".to_string(), Duration::from_millis(10)),
            ]),
            ..Default::default()
        });
        let mut cfg = config(Pacing::Event);
        cfg.clip_timeout = Duration::from_millis(80);
        let sequencer = Sequencer::new(player.clone(), ReadySignal::new(), cfg);

        sequencer.play(&words(&["a", "b", "c"]), "abc").await;

        let starts = player.starts.lock().unwrap().clone();
        let names: Vec<&str> = starts.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        // "a" finishing at 100ms must not release "b", which started at 80ms.
        let gap = starts[2].1 - starts[1].1;
        assert!(gap >= Duration::from_millis(75), "c started {gap:?} after b");
    }

    #[tokio::test]
    async fn concurrent_runs_do_not_overlap() {
        let player = MockPlayer::new().with_clip_duration(Duration::from_millis(10));
        let sequencer = Arc::new(Sequencer::new(
            Arc::new(player.clone()),
            ReadySignal::new(),
            config(Pacing::Event),
        ));

        let first = {
            let s = Arc::clone(&sequencer);
            tokio::spawn(async move { s.play(&words(&["a1", "a2"]), "a").await })
        };
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = {
            let s = Arc::clone(&sequencer);
            tokio::spawn(async move { s.play(&words(&["b1", "b2"]), "b").await })
        };
        first.await.unwrap();
        second.await.unwrap();

        let names: Vec<String> = player
            .played()
            .iter()
            .map(|p| p.file_stem().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a1", "a2", "b1", "b2"]);
    }
}
