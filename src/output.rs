//! Terminal rendering for playback events, queue listings and resolutions.
//! Shared by the one-shot commands and the daemon client commands.

use crate::queue::{QueueItem, QueueStatus};
use crate::resolver::Resolution;
use crate::sequencer::PlaybackEvent;
use crate::session::SessionStatus;
use owo_colors::OwoColorize;

/// Status column width; "processing" is the longest label.
const STATUS_WIDTH: usize = 10;

/// One line for a playback event, or `None` for events that are not shown.
pub fn format_event(event: &PlaybackEvent, verbose: bool) -> Option<String> {
    match event {
        PlaybackEvent::ClipStarted { index, total, clip } if verbose => Some(format!(
            "{} {}",
            format!("[{}/{}]", index + 1, total).dimmed(),
            clip.display().dimmed()
        )),
        PlaybackEvent::ClipStarted { .. } => None,
        PlaybackEvent::Hint { text } => Some(format!("{} {}", "▶".green(), text.bold())),
        PlaybackEvent::Finished { played, failed } if *failed > 0 => Some(format!(
            "{}",
            format!("{played} clips played, {failed} skipped").yellow()
        )),
        PlaybackEvent::Finished { .. } => None,
    }
}

fn colored_status(status: QueueStatus) -> String {
    let label = format!("{:<STATUS_WIDTH$}", status.as_str());
    match status {
        QueueStatus::Processing => label.dimmed().to_string(),
        QueueStatus::Ready => label.cyan().to_string(),
        QueueStatus::Playing => label.green().bold().to_string(),
        QueueStatus::Played => label.green().to_string(),
        QueueStatus::NoMatch => label.yellow().to_string(),
        QueueStatus::Error => label.red().to_string(),
    }
}

/// `  #id  status      original  →  GLOSS`
pub fn format_queue_item(item: &QueueItem) -> String {
    let mut line = format!(
        "{}  {}  {}",
        format!("{:>5}", format!("#{}", item.id)).dimmed(),
        colored_status(item.status),
        item.original
    );
    if !item.isl_text.is_empty() {
        line.push_str(&format!("  {} {}", "→".dimmed(), item.isl_text.cyan()));
    }
    line
}

pub fn format_queue(items: &[QueueItem]) -> String {
    if items.is_empty() {
        return "Queue is empty.".dimmed().to_string();
    }
    items
        .iter()
        .map(format_queue_item)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_resolution(resolution: &Resolution) -> String {
    let mut lines: Vec<String> = resolution
        .words
        .iter()
        .map(|w| format!("  {:<16} {}", w.word, w.file_name.dimmed()))
        .collect();

    if resolution.words.is_empty() {
        lines.push("  (no clips)".dimmed().to_string());
    }
    if !resolution.unresolved.is_empty() {
        lines.push(format!(
            "{} {}",
            "Spelled out:".yellow(),
            resolution.unresolved.join(", ")
        ));
    }
    if resolution.dropped_chars > 0 {
        lines.push(format!(
            "{} {}",
            "Dropped letters:".yellow(),
            resolution.dropped_chars
        ));
    }
    lines.join("\n")
}

pub fn format_status(status: &SessionStatus, pacing: &str, player: &str) -> String {
    let playing = match status.playing {
        Some(id) => format!("#{id}").green().to_string(),
        None => "idle".dimmed().to_string(),
    };
    [
        format!("  {}   {}", "Playing:".dimmed(), playing),
        format!(
            "  {}     {} total, {} processing, {} ready, {} played",
            "Queue:".dimmed(),
            status.total,
            status.processing,
            status.ready,
            status.played
        ),
        format!(
            "  {}    {} no-match, {} error",
            "Failed:".dimmed(),
            status.no_match,
            status.error
        ),
        format!("  {}   {} clips", "Catalog:".dimmed(), status.catalog_size),
        format!("  {}    {} pacing, {} player", "Player:".dimmed(), pacing, player),
    ]
    .join("\n")
}
