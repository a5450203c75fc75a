//! Booking confirmation document

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use booking_assistant_core::{BookingField, BookingRecord};

pub const DOCUMENT_TITLE: &str = "SkyJumper Booking Confirmation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub field: BookingField,
    pub label: String,
    pub value: String,
}

/// Printable summary of a booking record
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    /// Filled fields in form order
    pub entries: Vec<SummaryEntry>,
    /// Required fields still missing
    pub missing: Vec<BookingField>,
}

impl BookingSummary {
    pub fn from_record(record: &BookingRecord) -> Self {
        let entries = BookingField::ALL
            .iter()
            .filter(|field| record.is_filled(**field))
            .filter_map(|field| {
                record.get(*field).map(|value| SummaryEntry {
                    field: *field,
                    label: field.label().to_string(),
                    value: value.trim().to_string(),
                })
            })
            .collect();

        Self {
            title: DOCUMENT_TITLE.to_string(),
            generated_at: Utc::now(),
            entries,
            missing: record.missing_required(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn value(&self, field: BookingField) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.value.as_str())
    }

    /// `BookingConfirmation_{name}.txt`, with the name made filesystem-safe
    pub fn filename(&self) -> String {
        let name: String = self
            .value(BookingField::Name)
            .unwrap_or("Guest")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("BookingConfirmation_{}.txt", name)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.title);
        out.push('\n');
        out.push_str(&"=".repeat(self.title.len()));
        out.push_str("\n\n");

        for entry in &self.entries {
            out.push_str(&format!("{}: {}\n", entry.label, entry.value));
        }

        if !self.missing.is_empty() {
            let labels: Vec<&str> = self.missing.iter().map(|f| f.label()).collect();
            out.push_str(&format!("\nStill needed: {}\n", labels.join(", ")));
        }

        out.push_str(&format!(
            "\nGenerated: {}\n",
            self.generated_at.format("%d/%m/%Y %H:%M UTC")
        ));
        out
    }

    /// Write the rendered document into `dir`, returning its path
    pub fn save(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(self.filename());
        std::fs::write(&path, self.render())?;
        tracing::info!(path = %path.display(), "Booking confirmation written");
        Ok(path)
    }
}
