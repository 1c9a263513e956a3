//! Error types for islplay.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IslError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Clip catalog errors
    #[error("Clip catalog not found at {path}")]
    CatalogNotFound { path: String },

    #[error("Failed to parse clip catalog: {message}")]
    CatalogParse { message: String },

    #[error("Clip '{name}' already exists in catalog")]
    DuplicateClip { name: String },

    // Parser service errors
    #[error("Parser request failed: {message}")]
    ParserRequest { message: String },

    #[error("Parser returned an error: {message}")]
    ParserRejected { message: String },

    // Transcription service errors
    #[error("Invalid audio payload: {message}")]
    InvalidAudio { message: String },

    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    // Avatar player errors
    #[error("Player command not found: {command}")]
    PlayerNotFound { command: String },

    #[error("Player failed: {message}")]
    PlayerFailed { message: String },

    // Input source errors
    #[error("Input source failed: {message}")]
    Input { message: String },

    // IPC errors
    #[error("IPC socket error: {message}")]
    IpcSocket { message: String },

    #[error("IPC protocol error: {message}")]
    IpcProtocol { message: String },

    #[error("IPC connection failed: {message}")]
    IpcConnection { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, IslError>;
