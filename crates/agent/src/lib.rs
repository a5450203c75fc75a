//! Booking dialogue framework
//!
//! Features:
//! - Rule-based slot extraction and booking state tracking
//! - Canned follow-up prompting over a fixed slot order
//! - Dialogue session with rolling history and UI events
//! - Voice controller over a platform speech capability
//! - Booking confirmation export

pub mod dst;
pub mod export;
pub mod policy;
pub mod session;
pub mod voice;

pub use dst::{BookingStateTracker, ChangeSource, FieldChange, SlotExtractor};
pub use export::{BookingSummary, SummaryEntry};
pub use policy::{DialoguePolicy, PolicyDecision, COMPLETION_MESSAGE, SLOT_ORDER};
pub use session::{DialogueSession, SessionEvent, SessionHandle, SessionSnapshot, TurnOutcome};
pub use voice::{speakable_text, TranscriptEvent, VoiceController};

use thiserror::Error;

use booking_assistant_config::ConfigError;
use booking_assistant_core::SpeechError;
use booking_assistant_llm::{ApiError, LlmError};

/// Session errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A message is already being processed")]
    Busy,

    #[error("{0}")]
    Generation(#[from] ApiError),
}

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Completion client error: {0}")]
    Llm(#[from] LlmError),

    #[error("Already listening")]
    AlreadyListening,

    #[error("Voice input is disabled")]
    VoiceDisabled,
}
