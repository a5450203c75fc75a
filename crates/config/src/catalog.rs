//! Business catalog: locations, party packages, themes, pricing and offers
//!
//! The catalog is rendered into the completion service's system instruction
//! so the assistant can answer venue and pricing questions, and its city list
//! feeds location extraction.

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::Path;

use crate::ConfigError;

const BUILTIN_CATALOG: &str = include_str!("../../../config/catalog.yaml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub city: String,
    pub address: String,
    pub phone: String,
    pub capacity: u32,
    #[serde(default)]
    pub facilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub name: String,
    /// birthday, kitty, corporate, family, team-building
    pub event_type: String,
    pub price: u32,
    pub duration_minutes: u32,
    pub max_guests: u32,
    #[serde(default)]
    pub age_group: Option<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: u32,
    #[serde(default)]
    pub decoration_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlotPrice {
    pub slot: String,
    pub price: u32,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeGroupPrice {
    pub group: String,
    pub price: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTier {
    pub id: String,
    pub category: String,
    #[serde(default)]
    pub time_slots: Vec<TimeSlotPrice>,
    #[serde(default)]
    pub age_groups: Vec<AgeGroupPrice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub title: String,
    pub description: String,
    pub discount_percent: u8,
    pub valid_until: String,
    #[serde(default)]
    pub applicable: Vec<String>,
}

/// Everything the assistant knows about the business
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessCatalog {
    pub business_name: String,
    pub locations: Vec<Location>,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub themes: Vec<Theme>,
    #[serde(default)]
    pub pricing: Vec<PricingTier>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

impl BusinessCatalog {
    /// Catalog embedded at build time
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let catalog: Self = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let catalog = Self::from_yaml(&yaml)?;
        tracing::info!(
            path = %path.display(),
            locations = catalog.locations.len(),
            packages = catalog.packages.len(),
            "Loaded business catalog"
        );
        Ok(catalog)
    }

    /// Load from `path` when given, otherwise the embedded catalog
    pub fn load_or_builtin(path: Option<&str>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.locations.is_empty() {
            return Err(ConfigError::MissingField("locations".to_string()));
        }
        if let Some(offer) = self.offers.iter().find(|o| o.discount_percent > 100) {
            return Err(ConfigError::InvalidValue {
                field: format!("offers.{}.discount_percent", offer.id),
                message: format!("Must be at most 100, got {}", offer.discount_percent),
            });
        }
        Ok(())
    }

    /// Distinct city names in catalog order, lower-cased
    pub fn cities(&self) -> Vec<String> {
        let mut cities: Vec<String> = Vec::new();
        for loc in &self.locations {
            let city = loc.city.to_lowercase();
            if !cities.contains(&city) {
                cities.push(city);
            }
        }
        cities
    }

    pub fn locations_in(&self, city: &str) -> Vec<&Location> {
        self.locations
            .iter()
            .filter(|l| l.city.eq_ignore_ascii_case(city))
            .collect()
    }

    pub fn packages_for(&self, event_type: &str) -> Vec<&Package> {
        self.packages
            .iter()
            .filter(|p| p.event_type.eq_ignore_ascii_case(event_type))
            .collect()
    }

    /// Render the catalog as plain text for the system instruction
    pub fn format_for_prompt(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "{} LOCATIONS:", self.business_name.to_uppercase());
        for loc in &self.locations {
            let _ = writeln!(out, "• {} ({})", loc.name, loc.city);
            let _ = writeln!(out, "  Address: {}", loc.address);
            let _ = writeln!(out, "  Phone: {}", loc.phone);
            let _ = writeln!(out, "  Capacity: {} guests", loc.capacity);
            let _ = writeln!(out, "  Facilities: {}", loc.facilities.join(", "));
        }

        out.push_str("\nPARTY PACKAGES:\n");
        for pkg in &self.packages {
            let _ = writeln!(out, "• {} ({})", pkg.name, pkg.event_type.to_uppercase());
            let _ = writeln!(
                out,
                "  Price: ₹{} | Duration: {} minutes",
                pkg.price, pkg.duration_minutes
            );
            let _ = writeln!(out, "  Max Guests: {}", pkg.max_guests);
            let _ = writeln!(out, "  Includes: {}", pkg.includes.join(", "));
            if !pkg.themes.is_empty() {
                let _ = writeln!(out, "  Available Themes: {}", pkg.themes.join(", "));
            }
            if let Some(ref age) = pkg.age_group {
                let _ = writeln!(out, "  Age Group: {}", age);
            }
            let _ = writeln!(out, "  Description: {}", pkg.description);
        }

        out.push_str("\nTHEMES AVAILABLE:\n");
        for theme in &self.themes {
            let _ = writeln!(out, "• {} ({})", theme.name, theme.category);
            let _ = writeln!(out, "  Price: ₹{}", theme.price);
            let _ = writeln!(out, "  Includes: {}", theme.decoration_items.join(", "));
        }

        out.push_str("\nPRICING STRUCTURE:\n");
        for tier in &self.pricing {
            let _ = writeln!(out, "{}:", tier.category);
            for slot in &tier.time_slots {
                let _ = writeln!(out, "  {}: ₹{}", slot.slot, slot.price);
            }
            let ages: Vec<String> = tier
                .age_groups
                .iter()
                .map(|a| format!("{} - ₹{}", a.group, a.price))
                .collect();
            let _ = writeln!(out, "Age Groups: {}", ages.join(", "));
        }

        out.push_str("\nCURRENT OFFERS:\n");
        for offer in &self.offers {
            let _ = writeln!(out, "• {} - {}% OFF", offer.title, offer.discount_percent);
            let _ = writeln!(out, "  {}", offer.description);
            let _ = writeln!(out, "  Valid until: {}", offer.valid_until);
            let _ = writeln!(out, "  Applicable to: {} events", offer.applicable.join(", "));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = BusinessCatalog::builtin().unwrap();
        assert_eq!(catalog.business_name, "SkyJumper");
        assert_eq!(catalog.locations.len(), 20);
        assert_eq!(catalog.packages.len(), 4);
        assert_eq!(catalog.offers.len(), 2);
    }

    #[test]
    fn test_cities_are_distinct_and_ordered() {
        let catalog = BusinessCatalog::builtin().unwrap();
        let cities = catalog.cities();
        assert_eq!(cities.len(), 15);
        assert_eq!(cities.first().map(String::as_str), Some("ambernath"));
        assert_eq!(cities.last().map(String::as_str), Some("pune"));
        assert_eq!(catalog.locations_in("Noida").len(), 3);
    }

    #[test]
    fn test_prompt_rendering_mentions_every_section() {
        let text = BusinessCatalog::builtin().unwrap().format_for_prompt();
        for heading in [
            "SKYJUMPER LOCATIONS:",
            "PARTY PACKAGES:",
            "THEMES AVAILABLE:",
            "PRICING STRUCTURE:",
            "CURRENT OFFERS:",
        ] {
            assert!(text.contains(heading), "missing {}", heading);
        }
        assert!(text.contains("Birthday Blast Premium (BIRTHDAY)"));
        assert!(text.contains("Early Bird Special - 20% OFF"));
    }

    #[test]
    fn test_empty_locations_rejected() {
        let yaml = "business_name: Test\nlocations: []\n";
        assert!(matches!(
            BusinessCatalog::from_yaml(yaml),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = BusinessCatalog::load("/nonexistent/catalog.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_packages_for_event_type() {
        let catalog = BusinessCatalog::builtin().unwrap();
        assert_eq!(catalog.packages_for("birthday").len(), 2);
        assert!(catalog.packages_for("wedding").is_empty());
    }
}
