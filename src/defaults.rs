//! Default configuration constants for islplay.
//!
//! Shared by the config types and the components that fall back to them
//! when constructed without a config.

/// Default parser service endpoint.
///
/// Receives `?speech=<text>` and answers with the pre-processed sentence
/// and its sign-language gloss.
pub const PARSER_URL: &str = "http://localhost:5001/parser";

/// Default transcription service endpoint (multipart WAV upload).
pub const TRANSCRIBE_URL: &str = "http://localhost:5001/api/transcribe";

/// Default HTTP timeout for service requests, in milliseconds.
pub const SERVICE_TIMEOUT_MS: u64 = 30_000;

/// Default clip catalog file.
pub const CATALOG_PATH: &str = "js/sigmlFiles.json";

/// Directory prefix prepended to a clip's file name before it reaches the player.
pub const CLIP_DIR: &str = "SignFiles";

/// Extension used when deriving a file name for a new catalog entry.
pub const CLIP_EXTENSION: &str = ".sigml";

/// Token emitted by the tokenizer to mark end of line. Never resolved.
pub const EOL_TOKEN: &str = "EOL";

/// Playback poll period in milliseconds.
///
/// Used only by the `poll` pacing mode; matches the pace at which the
/// avatar renderer was originally sampled for readiness.
pub const POLL_INTERVAL_MS: u64 = 3000;

/// Maximum time to wait for the player to finish a clip, in milliseconds.
pub const CLIP_TIMEOUT_MS: u64 = 30_000;

/// Simulated clip duration for the logging player, in milliseconds.
pub const CLIP_DURATION_MS: u64 = 1200;

/// Number of queue items shown by queue listings.
pub const QUEUE_DISPLAY_LIMIT: usize = 50;

/// Number of items kept before terminal items are pruned.
pub const QUEUE_MAX_RETAINED: usize = 500;

/// Phrase that ends a listening session instead of being queued.
pub const STOP_PHRASE: &str = "stop avatar";

/// Interval between audio chunk uploads on the transcription path, in milliseconds.
pub const CHUNK_INTERVAL_MS: u64 = 5000;

/// Consecutive capture failures tolerated before switching to the fallback source.
pub const MAX_CAPTURE_FAILURES: u32 = 3;
