//! Booking State Tracking
//!
//! Holds the partially filled booking record for one session together with a
//! change log of every slot update.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 SlotExtractor (extractor.rs)                │
//! │  - ordered regex tables per field                           │
//! │  - pure: (user text, reply) -> partial BookingRecord        │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   BookingStateTracker                       │
//! │  - shallow merge into the current record                    │
//! │  - change history, manual edits                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let extractor = SlotExtractor::with_locations(catalog.cities());
//! let mut tracker = BookingStateTracker::new(false);
//!
//! let partial = extractor.extract("Book for 20 kids in Pune", reply);
//! tracker.apply_extraction(&partial, 1);
//! tracker.set_manual(BookingField::Phone, "9876543210", 1);
//! ```

pub mod extractor;

pub use extractor::SlotExtractor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use booking_assistant_core::{BookingField, BookingRecord};

/// A single slot update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub timestamp: DateTime<Utc>,
    pub field: BookingField,
    pub old_value: Option<String>,
    pub new_value: String,
    pub source: ChangeSource,
    /// Visitor turn that produced the change
    pub turn_index: usize,
}

/// Source of a slot update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    /// Pattern match over an exchange
    Extraction,
    /// Edited directly in the booking form
    ManualEdit,
}

/// Booking State Tracker
#[derive(Debug, Clone, Default)]
pub struct BookingStateTracker {
    record: BookingRecord,
    history: Vec<FieldChange>,
    /// Fields last written by a manual edit
    manual_fields: HashSet<BookingField>,
    /// When set, extraction never overwrites a manually edited field
    protect_manual_edits: bool,
}

impl BookingStateTracker {
    pub fn new(protect_manual_edits: bool) -> Self {
        Self {
            protect_manual_edits,
            ..Default::default()
        }
    }

    pub fn record(&self) -> &BookingRecord {
        &self.record
    }

    pub fn history(&self) -> &[FieldChange] {
        &self.history
    }

    pub fn get(&self, field: BookingField) -> Option<&str> {
        self.record.get(field)
    }

    pub fn is_manually_edited(&self, field: BookingField) -> bool {
        self.manual_fields.contains(&field)
    }

    /// Merge an extracted partial record, returning the fields that changed
    pub fn apply_extraction(&mut self, partial: &BookingRecord, turn_index: usize) -> Vec<BookingField> {
        let mut changed = Vec::new();
        for (field, value) in partial.iter() {
            if self.protect_manual_edits && self.manual_fields.contains(&field) {
                tracing::debug!(slot = %field, "Keeping manually edited slot");
                continue;
            }
            if self.update_field(field, value, ChangeSource::Extraction, turn_index) {
                self.manual_fields.remove(&field);
                changed.push(field);
            }
        }
        changed
    }

    /// Apply a manual edit; the last write wins
    pub fn set_manual(&mut self, field: BookingField, value: &str, turn_index: usize) -> bool {
        self.manual_fields.insert(field);
        self.update_field(field, value, ChangeSource::ManualEdit, turn_index)
    }

    pub fn clear(&mut self) {
        self.record.clear();
        self.history.clear();
        self.manual_fields.clear();
    }

    fn update_field(
        &mut self,
        field: BookingField,
        value: &str,
        source: ChangeSource,
        turn_index: usize,
    ) -> bool {
        let old_value = self.record.get(field).map(str::to_string);

        // Skip if value unchanged
        if old_value.as_deref() == Some(value) {
            return false;
        }

        self.history.push(FieldChange {
            timestamp: Utc::now(),
            field,
            old_value: old_value.clone(),
            new_value: value.to_string(),
            source,
            turn_index,
        });
        self.record.set(field, value);

        tracing::debug!(
            slot = %field,
            old_value = ?old_value,
            new_value = value,
            source = ?source,
            turn_index,
            "Slot updated"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(pairs: &[(BookingField, &str)]) -> BookingRecord {
        pairs.iter().map(|(f, v)| (*f, v.to_string())).collect()
    }

    #[test]
    fn test_extraction_merges_shallowly() {
        let mut tracker = BookingStateTracker::new(false);
        tracker.apply_extraction(&partial(&[(BookingField::Location, "Pune")]), 1);
        let changed = tracker.apply_extraction(
            &partial(&[(BookingField::NumberOfGuests, "20"), (BookingField::Location, "Pune")]),
            2,
        );

        assert_eq!(changed, vec![BookingField::NumberOfGuests]);
        assert_eq!(tracker.get(BookingField::Location), Some("Pune"));
        assert_eq!(tracker.get(BookingField::NumberOfGuests), Some("20"));
        assert_eq!(tracker.history().len(), 2);
    }

    #[test]
    fn test_history_records_old_value_and_source() {
        let mut tracker = BookingStateTracker::new(false);
        tracker.apply_extraction(&partial(&[(BookingField::Location, "Pune")]), 1);
        tracker.set_manual(BookingField::Location, "Noida", 2);

        let last = tracker.history().last().unwrap();
        assert_eq!(last.old_value.as_deref(), Some("Pune"));
        assert_eq!(last.new_value, "Noida");
        assert_eq!(last.source, ChangeSource::ManualEdit);
        assert_eq!(last.turn_index, 2);
    }

    #[test]
    fn test_manual_edit_survives_until_new_extracted_value() {
        let mut tracker = BookingStateTracker::new(false);
        tracker.set_manual(BookingField::Location, "Noida", 0);

        tracker.apply_extraction(&partial(&[(BookingField::Phone, "9876543210")]), 1);
        assert_eq!(tracker.get(BookingField::Location), Some("Noida"));

        tracker.apply_extraction(&partial(&[(BookingField::Location, "Pune")]), 2);
        assert_eq!(tracker.get(BookingField::Location), Some("Pune"));
        assert!(!tracker.is_manually_edited(BookingField::Location));
    }

    #[test]
    fn test_protected_manual_edit() {
        let mut tracker = BookingStateTracker::new(true);
        tracker.set_manual(BookingField::Location, "Noida", 0);

        let changed = tracker.apply_extraction(&partial(&[(BookingField::Location, "Pune")]), 1);
        assert!(changed.is_empty());
        assert_eq!(tracker.get(BookingField::Location), Some("Noida"));
    }

    #[test]
    fn test_clear() {
        let mut tracker = BookingStateTracker::new(false);
        tracker.set_manual(BookingField::Name, "Rajat", 0);
        tracker.clear();
        assert!(tracker.record().is_empty());
        assert!(tracker.history().is_empty());
        assert!(!tracker.is_manually_edited(BookingField::Name));
    }
}
