//! Slot prompting policy
//!
//! After each assistant reply the policy walks a fixed slot order and decides
//! whether a canned follow-up question should be appended. It is advisory:
//! the language model usually asks on its own, so a question is suppressed
//! whenever the reply already contains that field's trigger phrase.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use booking_assistant_core::{BookingField, BookingRecord};

/// Order in which the booking form is walked; theme is never prompted for
pub const SLOT_ORDER: [BookingField; 8] = [
    BookingField::Phone,
    BookingField::EventType,
    BookingField::NumberOfGuests,
    BookingField::AgeGroup,
    BookingField::Location,
    BookingField::EventDate,
    BookingField::TimeSlot,
    BookingField::SpecialRequirements,
];

pub const COMPLETION_MESSAGE: &str =
    "Thank you! Your booking details are complete. We will now confirm your booking.";

struct FieldPrompt {
    field: BookingField,
    question: &'static str,
    /// Phrases showing the reply already asks for this field
    trigger: Regex,
}

static FIELD_PROMPTS: Lazy<Vec<FieldPrompt>> = Lazy::new(|| vec![
    FieldPrompt {
        field: BookingField::Phone,
        question: "Could you please share your phone number?",
        trigger: Regex::new(r"(?i)phone|mobile|contact number").unwrap(),
    },
    FieldPrompt {
        field: BookingField::EventType,
        question: "Thank you for sharing your phone number. What type of event would you like to book? (e.g., Birthday Party, Kitty Party, Corporate Event, etc.)",
        trigger: Regex::new(r"(?i)event type|what type of event|which event").unwrap(),
    },
    FieldPrompt {
        field: BookingField::NumberOfGuests,
        question: "How many guests are you expecting for the event?",
        trigger: Regex::new(r"(?i)number of guests|how many guests|guests are you expecting").unwrap(),
    },
    FieldPrompt {
        field: BookingField::AgeGroup,
        question: "What is the age group of the guests? (e.g., Kids, Teens, Adults, Mixed)",
        trigger: Regex::new(r"(?i)age group|what is the age|guests.*age").unwrap(),
    },
    FieldPrompt {
        field: BookingField::Location,
        question: "Which SkyJumper location would you prefer for your event?",
        trigger: Regex::new(r"(?i)location|which location|skyjumper location").unwrap(),
    },
    FieldPrompt {
        field: BookingField::EventDate,
        question: "On which date would you like to book the event? (Please specify DD/MM/YYYY or describe)",
        trigger: Regex::new(r"(?i)(?:date|when|which day|what day)[^.!?]*\?").unwrap(),
    },
    FieldPrompt {
        field: BookingField::TimeSlot,
        question: "What time slot do you prefer for your event? (e.g., 10:00 AM - 12:00 PM)",
        trigger: Regex::new(r"(?i)time slot|what time|which time|when").unwrap(),
    },
    FieldPrompt {
        field: BookingField::SpecialRequirements,
        question: "Any special requirements or notes for your event? If not, just say \"No\".",
        trigger: Regex::new(r"(?i)special requirements?|special requests?|any (?:other )?notes").unwrap(),
    },
]);

/// What the session should append after an assistant reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyDecision {
    /// Ask for the next missing field
    Ask {
        field: BookingField,
        prompt: String,
    },
    /// Every field in the slot order is filled
    Complete { message: String },
}

impl PolicyDecision {
    pub fn text(&self) -> &str {
        match self {
            PolicyDecision::Ask { prompt, .. } => prompt,
            PolicyDecision::Complete { message } => message,
        }
    }
}

/// Dialogue policy over [`SLOT_ORDER`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DialoguePolicy;

impl DialoguePolicy {
    pub fn new() -> Self {
        Self
    }

    /// Decide the follow-up for `record` after `assistant_reply`
    pub fn next_prompt(&self, record: &BookingRecord, assistant_reply: &str) -> Option<PolicyDecision> {
        if self.is_complete(record) {
            return Some(PolicyDecision::Complete {
                message: COMPLETION_MESSAGE.to_string(),
            });
        }

        let field = self.pending_field(record)?;
        if self.already_asked(field, assistant_reply) {
            tracing::trace!(slot = %field, "Reply already asks for slot");
            return None;
        }

        self.question_for(field).map(|question| PolicyDecision::Ask {
            field,
            prompt: question.to_string(),
        })
    }

    /// The first unfilled field that directly follows a filled one
    pub fn pending_field(&self, record: &BookingRecord) -> Option<BookingField> {
        SLOT_ORDER
            .windows(2)
            .find(|pair| record.is_filled(pair[0]) && !record.is_filled(pair[1]))
            .map(|pair| pair[1])
    }

    pub fn is_complete(&self, record: &BookingRecord) -> bool {
        SLOT_ORDER.iter().all(|field| record.is_filled(*field))
    }

    /// Whether the reply already contains the field's trigger phrase
    pub fn already_asked(&self, field: BookingField, assistant_reply: &str) -> bool {
        FIELD_PROMPTS
            .iter()
            .find(|p| p.field == field)
            .map(|p| p.trigger.is_match(assistant_reply))
            .unwrap_or(false)
    }

    pub fn question_for(&self, field: BookingField) -> Option<&'static str> {
        FIELD_PROMPTS
            .iter()
            .find(|p| p.field == field)
            .map(|p| p.question)
    }
}
