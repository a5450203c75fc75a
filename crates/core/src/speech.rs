//! Speech capability interface
//!
//! The platform (browser bridge, native TTS/ASR, test double) implements
//! [`SpeechCapability`]. Turn-taking rules such as synthesis/recognition
//! mutual exclusion and silence detection live in the agent's voice
//! controller, not in implementations of this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Synthesis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSettings {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// BCP-47 language tag
    pub language: String,
    /// Preferred platform voice, if any
    pub voice: Option<String>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            rate: 0.7,
            pitch: 1.0,
            volume: 1.0,
            language: "en-US".to_string(),
            voice: None,
        }
    }
}

/// Recognition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    /// Stop after the first final result
    OneShot,
    /// Keep recognizing, emitting interim and final results
    Continuous,
}

/// Event emitted by an active recognition session
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Result { transcript: String, is_final: bool },
    Ended,
    Error(SpeechErrorKind),
}

/// Recognition failure subtype reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechErrorKind {
    NoSpeech,
    NotAllowed,
    Network,
    AudioCapture,
    Aborted,
    Other(String),
}

impl SpeechErrorKind {
    /// Map a platform error code (`no-speech`, `not-allowed`, ...) to a kind
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "not-allowed" | "service-not-allowed" => Self::NotAllowed,
            "network" => Self::Network,
            "audio-capture" => Self::AudioCapture,
            "aborted" => Self::Aborted,
            other => Self::Other(other.to_string()),
        }
    }

    /// Message shown to the visitor
    pub fn user_message(&self) -> String {
        match self {
            Self::NotAllowed => {
                "Microphone access denied. Please allow microphone access and try again."
                    .to_string()
            },
            Self::NoSpeech => "No speech detected. Please try speaking again.".to_string(),
            Self::Network => "Network error. Please check your internet connection.".to_string(),
            Self::AudioCapture => {
                "No microphone found. Please check your microphone connection.".to_string()
            },
            Self::Aborted => "Speech recognition was aborted.".to_string(),
            Self::Other(code) => format!("Speech recognition error: {}", code),
        }
    }
}

/// Speech errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpeechError {
    #[error("{}", .0.user_message())]
    Recognition(SpeechErrorKind),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// Platform speech capability
#[async_trait]
pub trait SpeechCapability: Send + Sync + 'static {
    /// Speak text; resolves when the utterance finishes
    async fn speak(&self, text: &str, settings: &SpeechSettings) -> Result<(), SpeechError>;

    /// Cancel the current utterance. Must be a no-op when idle.
    async fn stop_speaking(&self);

    /// Whether an utterance is in progress
    fn is_speaking(&self) -> bool;

    /// Start recognition; events arrive on the returned channel
    async fn start_listening(
        &self,
        mode: ListenMode,
        language: &str,
    ) -> Result<mpsc::Receiver<RecognitionEvent>, SpeechError>;

    /// Stop recognition. Must be a no-op when idle.
    async fn stop_listening(&self);

    fn is_synthesis_supported(&self) -> bool;

    fn is_recognition_supported(&self) -> bool;

    async fn check_microphone_permission(&self) -> bool;

    async fn request_microphone_permission(&self) -> bool;
}
