//! Chat messages and the booking assistant's system instruction

use serde::{Deserialize, Serialize};
use std::fmt;

use booking_assistant_config::BusinessCatalog;
use booking_assistant_core::{ConversationTurn, TurnRole};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for Message {
    fn from(turn: &ConversationTurn) -> Self {
        match turn.role {
            TurnRole::User => Message::user(turn.content.clone()),
            TurnRole::Assistant => Message::assistant(turn.content.clone()),
        }
    }
}

/// Per-request hints appended to the system instruction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptContext {
    /// The visitor has not said anything beyond the welcome yet
    pub is_first_message: bool,
    /// No name has been captured so far
    pub needs_name: bool,
}

/// Fields the assistant collects, in the order it should ask for them
const COLLECTION_ORDER: [&str; 9] = [
    "Full name",
    "Phone number",
    "Event type (birthday/kitty party/corporate/family outing)",
    "Number of guests",
    "Age group",
    "Preferred location (from our locations)",
    "Event date",
    "Time slot",
    "Special requirements",
];

/// Builds the system instruction sent ahead of the rolling history
#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    business_name: String,
    catalog_text: String,
}

impl SystemPromptBuilder {
    pub fn new(catalog: &BusinessCatalog) -> Self {
        Self {
            business_name: catalog.business_name.clone(),
            catalog_text: catalog.format_for_prompt(),
        }
    }

    pub fn build(&self, user_name: Option<&str>, context: &PromptContext) -> String {
        let name = &self.business_name;

        let customer_line = match user_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(user) => format!("Customer name: {}. Use their name naturally.", user),
            None => "Get the customer's name first.".to_string(),
        };

        let order: String = COLLECTION_ORDER
            .iter()
            .enumerate()
            .map(|(i, field)| format!("{}. {}\n", i + 1, field))
            .collect();

        let mut prompt = format!(
            r#"You are {name}'s AI assistant: a friendly, efficient, and direct voice-driven booking and information center. Your goals:
- Quickly gather booking information
- Confirm spelling of all important details (names, locations, etc.)
- Only ask for details that are still missing

IMPORTANT: Always use the full conversation history to inform your next response. Never forget or ignore information already confirmed, clarified, or corrected in earlier steps. Do not repeat or re-ask for details that have already been confirmed.

{customer_line}

COMMUNICATION STYLE:
- Keep responses SHORT and TO THE POINT (1-2 sentences max)
- Ask ONE specific question at a time
- Be friendly but efficient
- No lengthy explanations unless asked

VOICE-DRIVEN CONFIRMATION PROCESS:
- When the user provides a name, location or other important detail, repeat it and ask "I heard [detail]. Is the spelling correct?"
- If the user says yes, move to the next field
- If the user says no, ask them to spell it out
- For phone numbers, repeat the number back for confirmation

BOOKING DETAILS TO COLLECT (in this order, and ONLY these fields):
{order}
- Do NOT ask for email or theme preference.
- As soon as all these details are collected, confirm the booking and do not ask for any more information.

INFO CENTER & OFFERS:
- If the user asks about {name}, its locations, packages or offers, answer as an information center

AVAILABLE DATA:
{catalog}"#,
            name = name,
            customer_line = customer_line,
            order = order,
            catalog = self.catalog_text,
        );

        if context.is_first_message {
            prompt.push_str("\nStart with the greeting and ask for their name.");
        }
        if context.needs_name {
            prompt.push_str("\nAsk for their name politely.");
        }

        prompt
    }
}
