//! islplay - English to Indian Sign Language avatar playback
//!
//! Sentences are parsed by an external service, resolved to sign clips from a
//! catalog and played one clip at a time through an avatar player.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod daemon;
pub mod defaults;
pub mod error;
pub mod input;
pub mod ipc;
#[cfg(feature = "cli")]
pub mod output;
pub mod parser;
pub mod player;
pub mod queue;
pub mod resolver;
pub mod sequencer;
pub mod session;
pub mod tokenize;
pub mod transcribe;

// Collaborator traits (input → parse → resolve → play)
pub use input::SentenceSource;
pub use parser::SentenceParser;
pub use player::Player;
pub use tokenize::Tokenizer;
pub use transcribe::TranscriptionService;

// Core
pub use catalog::{Catalog, ClipEntry};
pub use queue::{Admission, QueueItem, QueueStatus};
pub use resolver::{Resolution, ResolvedWord, Resolver};
pub use sequencer::{PlaybackEvent, Sequencer};
pub use session::Session;

// Error handling
pub use error::{IslError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", hash_part);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
