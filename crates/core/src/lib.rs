//! Core traits and types for the booking assistant
//!
//! This crate provides foundational types used across all other crates:
//! - Booking fields and the booking record
//! - Chat messages and conversation turns
//! - The speech capability trait used by the voice controller
//! - Error types

pub mod booking;
pub mod conversation;
pub mod error;
pub mod speech;

pub use booking::{BookingField, BookingRecord};
pub use conversation::{ConversationTurn, Message, Sender, TurnRole};
pub use error::{Error, Result};
pub use speech::{
    ListenMode, RecognitionEvent, SpeechCapability, SpeechError, SpeechErrorKind, SpeechSettings,
};
