//! Client for the external transcription service.
//!
//! Audio is posted as multipart field `audio` (`recording.wav`, `audio/wav`);
//! the service answers `{ "success": bool, "text"?: ..., "error"?: ... }`.

use crate::error::{IslError, Result};
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub success: bool,
    pub text: Option<String>,
    pub error: Option<String>,
}

/// Basic facts about a WAV payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: Duration,
}

/// Check that `bytes` is a non-empty WAV file.
pub fn inspect_wav(bytes: &[u8]) -> Result<WavInfo> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| IslError::InvalidAudio {
        message: e.to_string(),
    })?;
    let spec = reader.spec();
    let frames = reader.duration();
    if frames == 0 || spec.sample_rate == 0 {
        return Err(IslError::InvalidAudio {
            message: "WAV payload contains no samples".to_string(),
        });
    }

    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        duration: Duration::from_secs_f64(frames as f64 / spec.sample_rate as f64),
    })
}

/// Speech-to-text collaborator.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Transcribe a WAV recording to text.
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpTranscriber {
    client: reqwest::Client,
    url: String,
}

impl HttpTranscriber {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IslError::Other(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TranscriptionService for HttpTranscriber {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        let info = inspect_wav(&wav)?;
        tracing::debug!(
            sample_rate = info.sample_rate,
            channels = info.channels,
            duration = ?info.duration,
            "uploading recording"
        );

        let part = multipart::Part::bytes(wav)
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|e| IslError::InvalidAudio {
                message: e.to_string(),
            })?;
        let form = multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| IslError::Transcription {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(IslError::Transcription {
                message: format!("transcription service returned status {}", response.status()),
            });
        }

        let body: TranscribeResponse =
            response.json().await.map_err(|e| IslError::Transcription {
                message: format!("invalid transcription response: {e}"),
            })?;

        match body {
            TranscribeResponse {
                success: true,
                text: Some(text),
                ..
            } => Ok(text.trim().to_string()),
            TranscribeResponse { error, .. } => Err(IslError::Transcription {
                message: error.unwrap_or_else(|| "no text returned".to_string()),
            }),
        }
    }
}
