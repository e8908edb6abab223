pub mod credentials;
mod dates;

pub use dates::{DateParseError, SlotDate};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Centres a user may watch at once; the backend rejects more.
pub const MAX_SELECTED_CENTRES: usize = 3;

/// Preferred time-slot labels per watched date, keyed in wire order.
pub type Availability = BTreeMap<SlotDate, Vec<String>>;

/// A centre as chosen by the user and echoed through the profile blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedCentre {
    pub name: String,
    pub postal_code: String,
}

impl SelectedCentre {
    /// Centre identity is case- and whitespace-insensitive on both fields;
    /// listings and notifications disagree on capitalization.
    pub fn matches(&self, name: &str, postal_code: &str) -> bool {
        normalize(&self.name) == normalize(name)
            && normalize(&self.postal_code) == normalize(postal_code)
    }

    pub fn key(&self) -> String {
        normalize(&self.name)
    }
}

pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// A bookable opening published in the test-centre listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentreSlot {
    pub date: String,
    pub time: String,
}

/// One entry of the remote test-centre listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCentre {
    pub name: String,
    pub postal_code: String,
    #[serde(default)]
    pub available_dates: Vec<CentreSlot>,
    /// When the centre's listing was last refreshed upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_date: Option<String>,
}

impl TestCentre {
    pub fn matches(&self, selection: &SelectedCentre) -> bool {
        selection.matches(&self.name, &self.postal_code)
    }

    /// Openings on the given calendar day, however the listing spells it.
    pub fn slots_on(&self, date: SlotDate) -> Vec<&CentreSlot> {
        self.available_dates
            .iter()
            .filter(|slot| SlotDate::parse_flexible(&slot.date).is_ok_and(|d| d == date))
            .collect()
    }
}

/// Transient per-date outcome of the latest availability check. Rebuilt on
/// every poll cycle; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateStatus {
    /// A check is running and this date is part of it.
    Pending,
    Available { time_slots: Vec<String> },
    Unavailable,
    /// The watcher lost contact with the job before it resolved.
    Error,
}

impl DateStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DateStatus::Pending => "pending",
            DateStatus::Available { .. } => "available",
            DateStatus::Unavailable => "unavailable",
            DateStatus::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centre(name: &str, postal_code: &str) -> SelectedCentre {
        SelectedCentre {
            name: name.to_string(),
            postal_code: postal_code.to_string(),
        }
    }

    #[test]
    fn centre_matching_ignores_case_and_whitespace() {
        let selection = centre("  Wood Green ", "N22 5EY");
        assert!(selection.matches("wood green", " n22 5ey "));
        assert!(!selection.matches("Wood Green South", "N22 5EY"));
    }

    #[test]
    fn slots_on_accepts_mixed_listing_formats() {
        let centre = TestCentre {
            name: "Mill Hill".to_string(),
            postal_code: "NW7 1AB".to_string(),
            available_dates: vec![
                CentreSlot {
                    date: "Monday 3 March 2025".to_string(),
                    time: "08:10".to_string(),
                },
                CentreSlot {
                    date: "2025-03-03".to_string(),
                    time: "11:40".to_string(),
                },
                CentreSlot {
                    date: "Tuesday 4 March 2025".to_string(),
                    time: "09:00".to_string(),
                },
            ],
            test_date: None,
        };

        let date = SlotDate::parse_short("03/03/25").expect("valid date");
        let slots = centre.slots_on(date);
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|slot| slot.time != "09:00"));
    }
}
