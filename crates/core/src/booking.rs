//! Booking fields and the partially-filled booking record

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A single slot of the booking form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingField {
    Name,
    Phone,
    EventType,
    NumberOfGuests,
    AgeGroup,
    Location,
    EventDate,
    TimeSlot,
    Theme,
    SpecialRequirements,
}

impl BookingField {
    /// All fields in form order
    pub const ALL: [BookingField; 10] = [
        BookingField::Name,
        BookingField::Phone,
        BookingField::EventType,
        BookingField::NumberOfGuests,
        BookingField::AgeGroup,
        BookingField::Location,
        BookingField::EventDate,
        BookingField::TimeSlot,
        BookingField::Theme,
        BookingField::SpecialRequirements,
    ];

    /// Wire key (camelCase)
    pub fn key(&self) -> &'static str {
        match self {
            BookingField::Name => "name",
            BookingField::Phone => "phone",
            BookingField::EventType => "eventType",
            BookingField::NumberOfGuests => "numberOfGuests",
            BookingField::AgeGroup => "ageGroup",
            BookingField::Location => "location",
            BookingField::EventDate => "eventDate",
            BookingField::TimeSlot => "timeSlot",
            BookingField::Theme => "theme",
            BookingField::SpecialRequirements => "specialRequirements",
        }
    }

    /// Human-readable label for forms and exported documents
    pub fn label(&self) -> &'static str {
        match self {
            BookingField::Name => "Full Name",
            BookingField::Phone => "Phone Number",
            BookingField::EventType => "Event Type",
            BookingField::NumberOfGuests => "Number of Guests",
            BookingField::AgeGroup => "Age Group",
            BookingField::Location => "Preferred Location",
            BookingField::EventDate => "Event Date",
            BookingField::TimeSlot => "Time Slot",
            BookingField::Theme => "Theme",
            BookingField::SpecialRequirements => "Special Requirements",
        }
    }

    /// Whether the booking form requires this field before submission
    pub fn is_required(&self) -> bool {
        !matches!(
            self,
            BookingField::AgeGroup | BookingField::Theme | BookingField::SpecialRequirements
        )
    }
}

impl fmt::Display for BookingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for BookingField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingField::ALL
            .iter()
            .copied()
            .find(|field| field.key() == s)
            .ok_or_else(|| Error::UnknownField(s.to_string()))
    }
}

/// Booking record: every field is independent and optional
///
/// Merging is shallow: fields present in the incoming record overwrite,
/// absent fields are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingRecord {
    fields: BTreeMap<BookingField, String>,
}

impl BookingRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: BookingField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Set a field, returning the previous value
    pub fn set(&mut self, field: BookingField, value: impl Into<String>) -> Option<String> {
        self.fields.insert(field, value.into())
    }

    pub fn remove(&mut self, field: BookingField) -> Option<String> {
        self.fields.remove(&field)
    }

    /// A field counts as filled when it holds non-blank text
    pub fn is_filled(&self, field: BookingField) -> bool {
        self.get(field).map(|v| !v.trim().is_empty()).unwrap_or(false)
    }

    /// Shallow merge, returning the fields whose value changed
    pub fn merge(&mut self, other: &BookingRecord) -> Vec<BookingField> {
        let mut changed = Vec::new();
        for (field, value) in &other.fields {
            if self.get(*field) != Some(value.as_str()) {
                self.fields.insert(*field, value.clone());
                changed.push(*field);
            }
        }
        changed
    }

    /// Required fields that are not yet filled, in form order
    pub fn missing_required(&self) -> Vec<BookingField> {
        BookingField::ALL
            .iter()
            .copied()
            .filter(|f| f.is_required() && !self.is_filled(*f))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BookingField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl FromIterator<(BookingField, String)> for BookingRecord {
    fn from_iter<I: IntoIterator<Item = (BookingField, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
