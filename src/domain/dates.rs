use chrono::{Datelike, NaiveDate};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Calendar date as the booking backend carries it.
///
/// The wire format is the short form `DD/MM/YY` (two-digit years are taken to
/// be 20xx). Server notifications and test-centre listings instead use the
/// human form `Weekday D Month YYYY`; both render and parse here so callers
/// can reconcile the two without string munging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotDate(NaiveDate);

impl SlotDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Parse the short `DD/MM/YY` wire form.
    pub fn parse_short(raw: &str) -> Result<Self, DateParseError> {
        let raw = raw.trim();
        let mut parts = raw.split('/');
        let (day, month, year) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(day), Some(month), Some(year), None) => (day, month, year),
            _ => return Err(DateParseError::malformed(raw)),
        };

        let day: u32 = day.parse().map_err(|_| DateParseError::malformed(raw))?;
        let month: u32 = month.parse().map_err(|_| DateParseError::malformed(raw))?;
        let year: i32 = match year.len() {
            2 => 2000 + year.parse::<i32>().map_err(|_| DateParseError::malformed(raw))?,
            4 => year.parse().map_err(|_| DateParseError::malformed(raw))?,
            _ => return Err(DateParseError::malformed(raw)),
        };

        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| DateParseError::out_of_range(raw))
    }

    /// Parse the long `Weekday D Month YYYY` form used by notifications.
    /// Tolerates a comma after the weekday, surrounding whitespace, and any
    /// casing of the month name. The weekday itself is not verified; the
    /// backend has been seen emitting mismatched weekdays after rescheduling.
    pub fn parse_long(raw: &str) -> Result<Self, DateParseError> {
        let mut tokens = raw.split_whitespace();
        let (_weekday, day, month, year) =
            match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
                (Some(w), Some(d), Some(m), Some(y)) if tokens.next().is_none() => (w, d, m, y),
                _ => return Err(DateParseError::malformed(raw)),
            };

        let day: u32 = day
            .trim_end_matches(',')
            .parse()
            .map_err(|_| DateParseError::malformed(raw))?;
        let month = MONTH_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(month))
            .ok_or_else(|| DateParseError::malformed(raw))?
            as u32
            + 1;
        let year: i32 = year.parse().map_err(|_| DateParseError::malformed(raw))?;

        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| DateParseError::out_of_range(raw))
    }

    /// Accept any of the formats seen on the wire: short, long, or ISO.
    pub fn parse_flexible(raw: &str) -> Result<Self, DateParseError> {
        let trimmed = raw.trim();
        if let Ok(date) = Self::parse_short(trimmed) {
            return Ok(date);
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(Self(date));
        }
        Self::parse_long(trimmed)
    }

    /// Render the short `DD/MM/YY` wire form.
    pub fn short(&self) -> String {
        self.0.format("%d/%m/%y").to_string()
    }

    /// Render the long human form, e.g. `Monday 3 March 2025`.
    pub fn long(&self) -> String {
        format!(
            "{} {} {} {}",
            self.0.format("%A"),
            self.0.day(),
            MONTH_NAMES[self.0.month0() as usize],
            self.0.year()
        )
    }
}

impl fmt::Display for SlotDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

impl FromStr for SlotDate {
    type Err = DateParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse_short(raw)
    }
}

impl Serialize for SlotDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.short())
    }
}

impl<'de> Deserialize<'de> for SlotDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_short(&raw).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateParseError {
    #[error("'{0}' is not a recognized date")]
    Malformed(String),
    #[error("'{0}' does not name a real calendar date")]
    OutOfRange(String),
}

impl DateParseError {
    fn malformed(raw: &str) -> Self {
        Self::Malformed(raw.to_string())
    }

    fn out_of_range(raw: &str) -> Self {
        Self::OutOfRange(raw.to_string())
    }
}
