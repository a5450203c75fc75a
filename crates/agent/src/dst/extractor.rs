//! Slot Value Extraction for Booking Conversations
//!
//! Rule-based extraction over the visitor's message and the assistant's reply.
//! Every field has an ordered pattern list; the first match wins and fields
//! are matched independently, so one message may fill several slots.
//!
//! Most fields are matched against `"{user} {assistant}"` lower-cased. Name,
//! event type and age group only look at what the visitor typed.
//!
//! ## Static Regex Patterns
//!
//! Patterns are compiled once using `once_cell::sync::Lazy`.

use once_cell::sync::Lazy;
use regex::Regex;

use booking_assistant_core::{BookingField, BookingRecord};

// =============================================================================
// STATIC REGEX PATTERNS
// =============================================================================

// Name phrases, applied to the visitor's text
static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"(?i)(?:my name is|i'm|i am|call me)\s+([a-z][a-z ]+)").unwrap(),
    Regex::new(r"(?i)(?:hi|hello),?\s*(?:i'm|i am)\s+([a-z][a-z ]+)").unwrap(),
    Regex::new(r"(?i)(?:this is|it's)\s+([a-z][a-z ]+)").unwrap(),
]);

// A bare Title-Case answer such as "Rajat Shukla"
static TITLE_CASE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-z]+(?: [A-Z][a-z]+)*$").unwrap());

// Indian mobile numbers first, then generic groupings
static PHONE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"(?:^|\D)(?:\+?91[\s-]?)?([6-9]\d{4}[-.\s]?\d{5})(?:\D|$)").unwrap(),
    Regex::new(r"(?:^|\D)(?:\+?91[\s-]?)?([6-9]\d{2}[-.\s]?\d{3}[-.\s]?\d{4})(?:\D|$)").unwrap(),
    Regex::new(r"(\d{3}[-.\s]?\d{3}[-.\s]?\d{4})").unwrap(),
    Regex::new(r"(\d{10})").unwrap(),
]);

static PHONE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-.\s]").unwrap());

static BARE_MOBILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[6-9]\d{9}$").unwrap());

static EVENT_TYPE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| vec![
    (Regex::new(r"(?i)\bbirthday(?: party)?\b").unwrap(), "Birthday Party"),
    (Regex::new(r"(?i)\bkitty(?: party)?\b").unwrap(), "Kitty Party"),
    (Regex::new(r"(?i)\bcorporate(?: event)?\b").unwrap(), "Corporate Event"),
    (Regex::new(r"(?i)\bfamily(?: outing)?\b").unwrap(), "Family Outing"),
    (Regex::new(r"(?i)\bteam(?: building)?\b").unwrap(), "Team Building"),
]);

static GUEST_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*(?:people|guests|kids|children|adults|persons)").unwrap()
});

// Group 2 marks a number that is really part of a date or a time
static GUEST_PREPOSITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:for|about)\s*(\d+)(\s*(?:am|pm)\b|st\b|nd\b|rd\b|th\b|[:/.-]\d)?").unwrap()
});

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

static AGE_GROUP_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| vec![
    (Regex::new(r"(?i)kids?|children|3-12|under.*12").unwrap(), "Kids (3-12 years)"),
    (Regex::new(r"(?i)teen|13-17|teenager").unwrap(), "Teens (13-17 years)"),
    (Regex::new(r"(?i)adult|18\+|grown.*up").unwrap(), "Adults (18+ years)"),
    (Regex::new(r"(?i)mixed|all.*age|family").unwrap(), "Mixed Ages"),
]);

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"\b(?:on|for)\s*(\d{1,2}(?:st|nd|rd|th)?\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\w*)").unwrap(),
    Regex::new(r"\b(\d{1,2}(?:st|nd|rd|th)?\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\w*)").unwrap(),
    Regex::new(r"\b(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})\b").unwrap(),
    Regex::new(r"\b(tomorrow|next week|this weekend)\b").unwrap(),
]);

static TIME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"(\d{1,2}:\d{2}\s*(?:am|pm)?\s*-?\s*\d{1,2}:\d{2}\s*(?:am|pm)?)").unwrap(),
    Regex::new(r"\b(morning|afternoon|evening)\b").unwrap(),
    Regex::new(r"\b(\d{1,2}\s*(?:am|pm))\b").unwrap(),
]);

static NEGATIVE_ANSWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:no(?: thanks?| thank you)?|none|nothing|nope|n/?a)[.!\s]*$").unwrap()
});

/// Branch cities, in match priority order
pub const DEFAULT_LOCATIONS: [&str; 15] = [
    "ambernath", "amritsar", "bangalore", "bathinda", "chennai", "chandigarh", "delhi",
    "faridabad", "ghaziabad", "gurugram", "jalandhar", "karnal", "lucknow", "noida", "pune",
];

pub const THEMES: [&str; 9] = [
    "superhero", "princess", "unicorn", "sports", "space", "frozen", "cars", "avengers",
    "bollywood",
];

// Words that end a captured name or disqualify it outright
const NAME_STOP_WORDS: &[&str] = &[
    "a", "also", "am", "an", "and", "are", "at", "back", "booking", "but", "calling", "excited",
    "fine", "for", "from", "glad", "going", "good", "great", "happy", "here", "i", "in",
    "interested", "is", "it", "just", "looking", "me", "mobile", "my", "not", "number", "of",
    "ok", "okay", "on", "our", "phone", "planning", "please", "ready", "so", "sure", "thank",
    "thanks", "that", "the", "this", "to", "trying", "want", "was", "we", "with", "would",
    "you", "your",
];

// Short replies that are Title-Case but never a name
const FILLER_WORDS: &[&str] = &[
    "cool", "correct", "done", "fine", "good", "great", "hello", "hey", "hi", "no", "nope",
    "none", "nothing", "ok", "okay", "perfect", "please", "right", "sure", "thanks", "wrong",
    "yeah", "yep", "yes",
];

/// Booking slot extractor
#[derive(Debug, Clone)]
pub struct SlotExtractor {
    /// Lower-case branch cities, first hit wins
    locations: Vec<String>,
}

impl Default for SlotExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotExtractor {
    /// Extractor over the built-in branch city list
    pub fn new() -> Self {
        Self::with_locations(DEFAULT_LOCATIONS.iter().map(|c| c.to_string()))
    }

    /// Extractor over a custom city list, e.g. `BusinessCatalog::cities()`
    pub fn with_locations<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locations: locations
                .into_iter()
                .map(|c| c.into().trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Extract every slot found in one exchange
    pub fn extract(&self, user_text: &str, assistant_text: &str) -> BookingRecord {
        self.extract_with_context(user_text, assistant_text, None)
    }

    /// Extract with knowledge of the field the visitor was just asked for
    ///
    /// Free-text answers (special requirements) are only captured when the
    /// previous prompt asked for them.
    pub fn extract_with_context(
        &self,
        user_text: &str,
        assistant_text: &str,
        awaiting: Option<BookingField>,
    ) -> BookingRecord {
        let combined = format!("{} {}", user_text, assistant_text).to_lowercase();
        let mut record = BookingRecord::new();

        let mut put = |field: BookingField, value: Option<String>| {
            if let Some(value) = value {
                record.set(field, value);
            }
        };

        put(BookingField::Name, self.extract_name(user_text));
        put(BookingField::Phone, self.extract_phone(&combined));
        put(BookingField::EventType, self.extract_event_type(user_text));
        put(BookingField::NumberOfGuests, self.extract_guests(&combined, user_text));
        put(BookingField::AgeGroup, self.extract_age_group(user_text));
        put(BookingField::Location, self.extract_location(&combined));
        put(BookingField::EventDate, self.extract_date(&combined));
        put(BookingField::TimeSlot, self.extract_time(&combined));
        put(BookingField::Theme, self.extract_theme(&combined));

        if awaiting == Some(BookingField::SpecialRequirements) {
            put(
                BookingField::SpecialRequirements,
                self.extract_special_requirements(user_text),
            );
        }

        record
    }

    /// Extract the visitor's name from an introduction or a bare Title-Case reply
    pub fn extract_name(&self, user_text: &str) -> Option<String> {
        for pattern in NAME_PATTERNS.iter() {
            if let Some(name) = pattern
                .captures(user_text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| clean_name(m.as_str()))
                .filter(|name| !self.is_other_answer(name))
            {
                return Some(name);
            }
        }

        let trimmed = user_text.trim();
        if TITLE_CASE_NAME.is_match(trimmed) && !self.is_other_answer(trimmed) {
            return Some(trimmed.to_string());
        }

        None
    }

    /// Extract a phone number, stripped of separators
    pub fn extract_phone(&self, text: &str) -> Option<String> {
        PHONE_PATTERNS.iter().find_map(|pattern| {
            pattern
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| PHONE_SEPARATORS.replace_all(m.as_str(), "").into_owned())
                .filter(|digits| digits.len() == 10)
        })
    }

    pub fn extract_event_type(&self, user_text: &str) -> Option<String> {
        EVENT_TYPE_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(user_text))
            .map(|(_, value)| value.to_string())
    }

    /// Extract a guest count from `combined`, falling back to a bare number reply
    /// that is not a mobile number
    pub fn extract_guests(&self, combined: &str, user_text: &str) -> Option<String> {
        if let Some(caps) = GUEST_COUNT.captures(combined) {
            return Some(caps[1].to_string());
        }

        for caps in GUEST_PREPOSITION.captures_iter(combined) {
            if caps.get(2).is_none() && caps[1].len() <= 4 {
                return Some(caps[1].to_string());
            }
        }

        let trimmed = user_text.trim();
        if BARE_NUMBER.is_match(trimmed) && !BARE_MOBILE.is_match(trimmed) {
            return Some(trimmed.to_string());
        }

        None
    }

    pub fn extract_age_group(&self, user_text: &str) -> Option<String> {
        AGE_GROUP_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(user_text))
            .map(|(_, value)| value.to_string())
    }

    pub fn extract_location(&self, combined: &str) -> Option<String> {
        self.locations
            .iter()
            .find(|city| combined.contains(city.as_str()))
            .map(|city| capitalize(city))
    }

    pub fn extract_date(&self, combined: &str) -> Option<String> {
        first_capture(&DATE_PATTERNS, combined)
    }

    pub fn extract_time(&self, combined: &str) -> Option<String> {
        first_capture(&TIME_PATTERNS, combined)
    }

    pub fn extract_theme(&self, combined: &str) -> Option<String> {
        THEMES
            .iter()
            .find(|theme| combined.contains(*theme))
            .map(|theme| capitalize(theme))
    }

    /// Free-text answer; a negative reply is recorded as "None"
    pub fn extract_special_requirements(&self, user_text: &str) -> Option<String> {
        let trimmed = user_text.trim();
        if trimmed.is_empty() {
            None
        } else if NEGATIVE_ANSWER.is_match(trimmed) {
            Some("None".to_string())
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Whether a Title-Case reply is really an answer for another slot
    fn is_other_answer(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        lowered
            .split_whitespace()
            .any(|word| FILLER_WORDS.contains(&word))
            || self.extract_event_type(text).is_some()
            || self.extract_age_group(text).is_some()
            || self.extract_location(&lowered).is_some()
            || self.extract_theme(&lowered).is_some()
            || self.extract_date(&lowered).is_some()
            || self.extract_time(&lowered).is_some()
    }
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}

/// Keep up to three leading name words, stopping at filler
fn clean_name(raw: &str) -> Option<String> {
    let words: Vec<String> = raw
        .split_whitespace()
        .take_while(|w| !NAME_STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .take(3)
        .map(capitalize)
        .collect();

    let name = words.join(" ");
    if name.len() > 1 {
        Some(name)
    } else {
        None
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(user: &str, assistant: &str) -> BookingRecord {
        SlotExtractor::new().extract(user, assistant)
    }

    #[test]
    fn test_name_from_introduction() {
        let extractor = SlotExtractor::new();
        assert_eq!(extractor.extract_name("my name is rajat shukla").as_deref(), Some("Rajat Shukla"));
        assert_eq!(extractor.extract_name("Hello, I'm Priya").as_deref(), Some("Priya"));
        assert_eq!(extractor.extract_name("call me Anu").as_deref(), Some("Anu"));
        assert_eq!(
            extractor.extract_name("My name is Rajat and my number is 9876543210").as_deref(),
            Some("Rajat")
        );
    }

    #[test]
    fn test_name_ignores_non_introductions() {
        let extractor = SlotExtractor::new();
        assert_eq!(extractor.extract_name("I'm looking for a birthday party"), None);
        assert_eq!(extractor.extract_name("it's my son's birthday"), None);
        assert_eq!(extractor.extract_name("Yes"), None);
        assert_eq!(extractor.extract_name("Pune"), None);
        assert_eq!(extractor.extract_name("Superhero"), None);
    }

    #[test]
    fn test_slot_answer_phrasing_is_not_a_name() {
        let extractor = SlotExtractor::new();
        assert_eq!(extractor.extract_name("It's Pune"), None);
        assert_eq!(extractor.extract_name("this is evening"), None);
        assert_eq!(extractor.extract_name("it's Rajat").as_deref(), Some("Rajat"));

        let record = extract("It's Pune", "Which SkyJumper location would you prefer?");
        assert_eq!(record.get(BookingField::Location), Some("Pune"));
        assert_eq!(record.get(BookingField::Name), None);
    }

    #[test]
    fn test_title_case_fallback() {
        let record = extract("Rajat Shukla", "Nice to meet you!");
        assert_eq!(record.get(BookingField::Name), Some("Rajat Shukla"));

        let record = extract("rajat shukla", "");
        assert_eq!(record.get(BookingField::Name), None);
    }

    #[test]
    fn test_phone_normalization() {
        let extractor = SlotExtractor::new();
        assert_eq!(extractor.extract_phone("+91 98765-43210").as_deref(), Some("9876543210"));
        assert_eq!(extractor.extract_phone("my number is 9876543210").as_deref(), Some("9876543210"));
        assert_eq!(extractor.extract_phone("+919876543210").as_deref(), Some("9876543210"));
        assert_eq!(extractor.extract_phone("987 654 3210").as_deref(), Some("9876543210"));
        assert_eq!(extractor.extract_phone("98765 43210").as_deref(), Some("9876543210"));
        assert_eq!(extractor.extract_phone("25 guests"), None);
    }

    #[test]
    fn test_bare_number_is_guest_count_not_phone() {
        let record = extract("25", "Great!");
        assert_eq!(record.get(BookingField::NumberOfGuests), Some("25"));
        assert_eq!(record.get(BookingField::Phone), None);

        let record = extract("9876543210", "Thanks!");
        assert_eq!(record.get(BookingField::Phone), Some("9876543210"));
        assert_eq!(record.get(BookingField::NumberOfGuests), None);
    }

    #[test]
    fn test_any_length_bare_number_counts_guests() {
        let record = extract("12345", "Great!");
        assert_eq!(record.get(BookingField::NumberOfGuests), Some("12345"));
        assert_eq!(record.get(BookingField::Phone), None);

        let record = extract("1234567890", "Thanks!");
        assert_eq!(record.get(BookingField::NumberOfGuests), Some("1234567890"));
        assert_eq!(record.get(BookingField::Phone), Some("1234567890"));

        let record = extract("150", "Lovely!");
        assert_eq!(record.get(BookingField::NumberOfGuests), Some("150"));
    }

    #[test]
    fn test_guest_count_patterns() {
        let extractor = SlotExtractor::new();
        assert_eq!(extractor.extract_guests("we are 30 people", "").as_deref(), Some("30"));
        assert_eq!(extractor.extract_guests("a party for 12", "").as_deref(), Some("12"));
        assert_eq!(extractor.extract_guests("book for 15th march", ""), None);
        assert_eq!(extractor.extract_guests("book for 5 pm", ""), None);
    }

    #[test]
    fn test_event_type_and_age_group_use_user_text_only() {
        let record = extract("It's a birthday party for kids", "Do you want a corporate event?");
        assert_eq!(record.get(BookingField::EventType), Some("Birthday Party"));
        assert_eq!(record.get(BookingField::AgeGroup), Some("Kids (3-12 years)"));

        let record = extract("sounds good", "Is this for adults or kids?");
        assert_eq!(record.get(BookingField::AgeGroup), None);
        assert_eq!(record.get(BookingField::EventType), None);
    }

    #[test]
    fn test_age_group_priority() {
        let extractor = SlotExtractor::new();
        assert_eq!(extractor.extract_age_group("teenagers mostly").as_deref(), Some("Teens (13-17 years)"));
        assert_eq!(extractor.extract_age_group("all adults").as_deref(), Some("Adults (18+ years)"));
        assert_eq!(extractor.extract_age_group("whole family").as_deref(), Some("Mixed Ages"));
    }

    #[test]
    fn test_location_and_theme_from_combined_text() {
        let record = extract("near Noida please", "We have a superhero theme there.");
        assert_eq!(record.get(BookingField::Location), Some("Noida"));
        assert_eq!(record.get(BookingField::Theme), Some("Superhero"));
    }

    #[test]
    fn test_location_list_order_wins() {
        let extractor = SlotExtractor::with_locations(["Pune", "Delhi"]);
        assert_eq!(extractor.extract_location("delhi or pune").as_deref(), Some("Pune"));
    }

    #[test]
    fn test_date_patterns() {
        let extractor = SlotExtractor::new();
        assert_eq!(extractor.extract_date("book it on 15th march").as_deref(), Some("15th march"));
        assert_eq!(extractor.extract_date("date is 12/05/2025").as_deref(), Some("12/05/2025"));
        assert_eq!(extractor.extract_date("maybe this weekend").as_deref(), Some("this weekend"));
        assert_eq!(extractor.extract_date("no idea yet"), None);
    }

    #[test]
    fn test_time_patterns() {
        let extractor = SlotExtractor::new();
        assert_eq!(
            extractor.extract_time("10:00 am - 12:00 pm works").as_deref(),
            Some("10:00 am - 12:00 pm")
        );
        assert_eq!(extractor.extract_time("in the evening").as_deref(), Some("evening"));
        assert_eq!(extractor.extract_time("around 4 pm").as_deref(), Some("4 pm"));
    }

    #[test]
    fn test_one_message_fills_several_slots() {
        let record = extract("Birthday for 20 kids in Pune on 5th june", "");
        assert_eq!(record.get(BookingField::EventType), Some("Birthday Party"));
        assert_eq!(record.get(BookingField::NumberOfGuests), Some("20"));
        assert_eq!(record.get(BookingField::Location), Some("Pune"));
        assert_eq!(record.get(BookingField::EventDate), Some("5th june"));
    }

    #[test]
    fn test_special_requirements_only_when_awaited() {
        let extractor = SlotExtractor::new();
        let record = extractor.extract("Need a cake table", "");
        assert_eq!(record.get(BookingField::SpecialRequirements), None);

        let record = extractor.extract_with_context(
            "Need a cake table",
            "",
            Some(BookingField::SpecialRequirements),
        );
        assert_eq!(record.get(BookingField::SpecialRequirements), Some("Need a cake table"));

        let record = extractor.extract_with_context("No thanks", "", Some(BookingField::SpecialRequirements));
        assert_eq!(record.get(BookingField::SpecialRequirements), Some("None"));
    }

    #[test]
    fn test_nothing_matched_is_empty() {
        assert!(extract("hmm", "ok").is_empty());
    }
}
