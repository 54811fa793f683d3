//! Calendar month model
//!
//! Months are stored and compared as a `(year, month)` pair. The `YYYY-MM`
//! form is used in storage and on the wire; [`Month::label`] derives the
//! human-readable form for presentation only.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A calendar month
///
/// Field order matters: the derived `Ord` compares year first, then month,
/// which is chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Create a month, validating the month number (1-12)
    pub fn new(year: i32, month: u32) -> crate::Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidInput(format!(
                "month number out of range: {}",
                month
            )));
        }
        if !(1..=9999).contains(&year) {
            return Err(Error::InvalidInput(format!("year out of range: {}", year)));
        }
        Ok(Self { year, month })
    }

    /// Month containing the given date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Month containing today's local date
    pub fn current() -> Self {
        Self::from_date(chrono::Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First day of the month
    pub fn first_day(&self) -> NaiveDate {
        // year and month are validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Display label, e.g. `May 2024`
    pub fn label(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = Error;

    /// Parse `YYYY-MM` (a single-digit month is accepted)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidInput(format!("invalid month '{}', expected YYYY-MM", s));

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let all_digits = |t: &str| t.chars().all(|c| c.is_ascii_digit());
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(invalid());
        }
        // i32/u32 parsing alone would accept a leading '+'
        if !all_digits(year) || !all_digits(month) {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Month::new(year, month)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Rolling window: `start` followed by `upcoming` further months
pub fn month_window(start: Month, upcoming: u32) -> Vec<Month> {
    let mut months = Vec::with_capacity(upcoming as usize + 1);
    let mut m = start;
    months.push(m);
    for _ in 0..upcoming {
        m = m.next();
        months.push(m);
    }
    months
}

/// Selectable months: the rolling window from `today` unioned with every month
/// that has stored payment rows, deduplicated and in chronological order.
pub fn selectable_months<I>(today: Month, upcoming: u32, stored: I) -> Vec<Month>
where
    I: IntoIterator<Item = Month>,
{
    let mut set: BTreeSet<Month> = month_window(today, upcoming).into_iter().collect();
    set.extend(stored);
    set.into_iter().collect()
}

/// Pick the month to display
///
/// The requested month wins if it parses and is selectable; otherwise the
/// chronologically last selectable month. `None` only for an empty set.
pub fn select_month(requested: Option<&str>, months: &[Month]) -> Option<Month> {
    requested
        .and_then(|r| r.parse::<Month>().ok())
        .filter(|m| months.contains(m))
        .or_else(|| months.iter().max().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Month {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let month = m("2024-05");
        assert_eq!(month.year(), 2024);
        assert_eq!(month.month(), 5);
        assert_eq!(month.to_string(), "2024-05");
        assert_eq!(m("2024-5").to_string(), "2024-05");
        assert_eq!(month.label(), "May 2024");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "2024", "2024-13", "2024-00", "24-05", "May 2024", "2024-05-01", "abcd-ef"] {
            assert!(bad.parse::<Month>().is_err(), "should reject {:?}", bad);
        }
    }

    #[test]
    fn test_parse_rejects_signs() {
        for bad in ["+024-05", "-024-05", "2024-+5", "2024--5", " 2024-+5"] {
            assert!(bad.parse::<Month>().is_err(), "should reject {:?}", bad);
        }
        assert_eq!(m("2024-5").to_string(), "2024-05");
    }

    #[test]
    fn test_chronological_order_across_year_boundary() {
        let mut months = vec![m("2025-01"), m("2024-12"), m("2024-02"), m("2024-11")];
        months.sort();
        let rendered: Vec<String> = months.iter().map(|m| m.to_string()).collect();
        assert_eq!(rendered, vec!["2024-02", "2024-11", "2024-12", "2025-01"]);
    }

    #[test]
    fn test_next_wraps_december() {
        assert_eq!(m("2024-12").next(), m("2025-01"));
        assert_eq!(m("2024-06").next(), m("2024-07"));
    }

    #[test]
    fn test_window_and_stored_union() {
        let months = selectable_months(m("2024-11"), 2, vec![m("2024-05"), m("2024-12")]);
        assert_eq!(
            months,
            vec![m("2024-05"), m("2024-11"), m("2024-12"), m("2025-01")]
        );
    }

    #[test]
    fn test_select_month_prefers_requested_member() {
        let months = vec![m("2024-05"), m("2024-06"), m("2024-07")];
        assert_eq!(select_month(Some("2024-06"), &months), Some(m("2024-06")));
        // Not selectable -> last
        assert_eq!(select_month(Some("2023-01"), &months), Some(m("2024-07")));
        // Unparsable -> last
        assert_eq!(select_month(Some("junk"), &months), Some(m("2024-07")));
        assert_eq!(select_month(None, &months), Some(m("2024-07")));
        assert_eq!(select_month(None, &[]), None);
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let json = serde_json::to_string(&m("2024-05")).unwrap();
        assert_eq!(json, "\"2024-05\"");
        let back: Month = serde_json::from_str("\"2024-5\"").unwrap();
        assert_eq!(back, m("2024-05"));
    }
}
