//! Sync timestamp parsing.
//!
//! Field devices export timestamps as localized strings such as
//! `15/03/2024 10:32:05 a. m.`. The meridiem marker is normalized to
//! `AM`/`PM` before trying a fixed list of layouts. Anything that still
//! fails becomes [`SyncTime::Unparseable`] rather than an error.

use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::cell::Cell;

/// Sync timestamp of a row. `Unparseable` sorts after every real time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyncTime {
    At(NaiveDateTime),
    Unparseable,
}

impl SyncTime {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::At(_))
    }
}

impl fmt::Display for SyncTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Self::Unparseable => write!(f, "unparseable"),
        }
    }
}

impl Serialize for SyncTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::At(_) => serializer.serialize_str(&self.to_string()),
            Self::Unparseable => serializer.serialize_none(),
        }
    }
}

const LAYOUTS: &[&str] = &[
    "%d/%m/%Y %I:%M:%S %p",
    "%d/%m/%Y %I:%M %p",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
];

const DATE_ONLY_LAYOUTS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"];

fn meridiem_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*([ap])\.?\s?m\.?$").expect("valid meridiem regex"))
}

/// Rewrite trailing `a. m.` / `p.m.` / `am` style markers as `AM` / `PM`.
pub fn normalize_meridiem(raw: &str) -> String {
    let cleaned = raw.replace('\u{a0}', " ");
    let trimmed = cleaned.trim();
    match meridiem_pattern().captures(trimmed) {
        Some(caps) => {
            let marker = if caps[1].eq_ignore_ascii_case("a") { "AM" } else { "PM" };
            let head = &trimmed[..caps.get(0).map_or(trimmed.len(), |m| m.start())];
            format!("{} {marker}", head.trim_end())
        }
        None => trimmed.to_string(),
    }
}

/// Parse a localized timestamp string.
pub fn parse_sync_text(raw: &str) -> SyncTime {
    let normalized = normalize_meridiem(raw);
    // Sub-second precision is dropped before matching.
    let normalized = match normalized.split_once('.') {
        Some((head, tail)) if tail.chars().all(|c| c.is_ascii_digit()) => head.to_string(),
        _ => normalized,
    };

    for layout in LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, layout) {
            return SyncTime::At(dt);
        }
    }
    for layout in DATE_ONLY_LAYOUTS {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(&normalized, layout) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return SyncTime::At(dt);
            }
        }
    }
    SyncTime::Unparseable
}

/// Parse a sync timestamp from a cell. Native date-time cells are taken as is.
pub fn parse_sync_time(cell: &Cell) -> SyncTime {
    match cell {
        Cell::DateTime(dt) => SyncTime::At(*dt),
        Cell::Text(s) => parse_sync_text(s),
        _ => SyncTime::Unparseable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> SyncTime {
        SyncTime::At(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, s)
                .unwrap(),
        )
    }

    #[test]
    fn localized_meridiem_variants() {
        assert_eq!(normalize_meridiem("15/03/2024 10:32:05 a. m."), "15/03/2024 10:32:05 AM");
        assert_eq!(normalize_meridiem("15/03/2024 10:32:05 p.m."), "15/03/2024 10:32:05 PM");
        assert_eq!(normalize_meridiem("15/03/2024 10:32:05\u{a0}p.\u{a0}m."), "15/03/2024 10:32:05 PM");
        assert_eq!(normalize_meridiem("15/03/2024 10:32:05 pm"), "15/03/2024 10:32:05 PM");
        assert_eq!(normalize_meridiem("15/03/2024 22:32:05"), "15/03/2024 22:32:05");
    }

    #[test]
    fn parses_localized_strings() {
        assert_eq!(parse_sync_text("15/03/2024 10:32:05 a. m."), at(2024, 3, 15, 10, 32, 5));
        assert_eq!(parse_sync_text("15/03/2024 02:10:00 p. m."), at(2024, 3, 15, 14, 10, 0));
        assert_eq!(parse_sync_text("2024-03-15 08:00:00"), at(2024, 3, 15, 8, 0, 0));
        assert_eq!(parse_sync_text("2024-03-15T08:00:00.250"), at(2024, 3, 15, 8, 0, 0));
        assert_eq!(parse_sync_text("15/03/2024"), at(2024, 3, 15, 0, 0, 0));
    }

    #[test]
    fn garbage_is_unparseable_not_error() {
        assert_eq!(parse_sync_text("ayer en la tarde"), SyncTime::Unparseable);
        assert_eq!(parse_sync_time(&Cell::Empty), SyncTime::Unparseable);
        assert_eq!(parse_sync_time(&Cell::Number(45000.5)), SyncTime::Unparseable);
    }

    #[test]
    fn unparseable_sorts_last() {
        assert!(at(2030, 1, 1, 0, 0, 0) < SyncTime::Unparseable);
    }
}
