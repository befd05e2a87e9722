//! Date parsing for sheet cells and the `MonthBucket` grouping key.

use anyhow::{bail, Context};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The format the append path writes dates in.
pub const SHEET_WRITE_FORMAT: &str = "%d/%m/%Y";

const SHORT_YEAR_FORMAT: &str = "%d/%m/%y";

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Parses a `DD/MM/YY` sheet date. `DD/MM/YYYY` is accepted as well, since that is what rows
/// appended from the entry form contain. Returns `None` for anything else.
pub fn parse_sheet_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let year_len = trimmed.rsplit('/').next().map(str::len)?;
    let format = match year_len {
        2 => SHORT_YEAR_FORMAT,
        4 => SHEET_WRITE_FORMAT,
        _ => return None,
    };
    NaiveDate::parse_from_str(trimmed, format).ok()
}

/// Formats a date the way the append path writes it, e.g. `05/01/2024`.
pub fn format_sheet_date(date: NaiveDate) -> String {
    date.format(SHEET_WRITE_FORMAT).to_string()
}

/// Identifies one calendar month. Orders chronologically and displays as `Jan/2024`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MonthBucket {
    year: i32,
    month: u32,
}

impl MonthBucket {
    /// Returns `None` when `month` is not in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The bucket immediately after this one.
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

    /// Every bucket from `self` to `end`, inclusive. Empty when `end` is before `self`.
    pub fn range_inclusive(&self, end: MonthBucket) -> Vec<MonthBucket> {
        let mut out = Vec::new();
        let mut current = *self;
        while current <= end {
            out.push(current);
            current = current.next();
        }
        out
    }
}

impl fmt::Display for MonthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // month is validated on construction
        let name = MONTHS[(self.month - 1) as usize];
        write!(f, "{name}/{}", self.year)
    }
}

impl FromStr for MonthBucket {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, year) = s
            .split_once('/')
            .with_context(|| format!("Month must be in the format 'Jan/2024', got: {s}"))?;
        let month = match MONTHS.iter().position(|m| m.eq_ignore_ascii_case(name)) {
            Some(ix) => ix as u32 + 1,
            None => bail!("Unknown month name '{name}'"),
        };
        let year = year
            .parse::<i32>()
            .with_context(|| format!("Invalid year in '{s}'"))?;
        Ok(Self { year, month })
    }
}

impl Serialize for MonthBucket {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MonthBucket {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MonthBucket::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_short_year() {
        assert_eq!(parse_sheet_date("05/01/24"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_sheet_date(" 31/12/23 "), Some(ymd(2023, 12, 31)));
    }

    #[test]
    fn test_parse_long_year() {
        assert_eq!(parse_sheet_date("10/02/2024"), Some(ymd(2024, 2, 10)));
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(parse_sheet_date(""), None);
        assert_eq!(parse_sheet_date("2024-01-05"), None);
        assert_eq!(parse_sheet_date("31/02/24"), None);
        assert_eq!(parse_sheet_date("01/13/24"), None);
        assert_eq!(parse_sheet_date("1/1/124"), None);
    }

    #[test]
    fn test_format_sheet_date_round_trips() {
        let date = ymd(2024, 3, 7);
        let s = format_sheet_date(date);
        assert_eq!(s, "07/03/2024");
        assert_eq!(parse_sheet_date(&s), Some(date));
    }

    #[test]
    fn test_month_bucket_display_and_parse() {
        let bucket = MonthBucket::of(ymd(2024, 1, 5));
        assert_eq!(bucket.to_string(), "Jan/2024");
        assert_eq!("Jan/2024".parse::<MonthBucket>().unwrap(), bucket);
        assert_eq!("dec/2023".parse::<MonthBucket>().unwrap().month(), 12);
        assert!("Foo/2024".parse::<MonthBucket>().is_err());
        assert!("Jan-2024".parse::<MonthBucket>().is_err());
    }

    #[test]
    fn test_month_bucket_orders_chronologically() {
        let dec23 = MonthBucket::new(2023, 12).unwrap();
        let jan24 = MonthBucket::new(2024, 1).unwrap();
        let feb24 = MonthBucket::new(2024, 2).unwrap();
        let mut buckets = vec![feb24, dec23, jan24];
        buckets.sort();
        assert_eq!(buckets, vec![dec23, jan24, feb24]);
    }

    #[test]
    fn test_month_bucket_range() {
        let start = MonthBucket::new(2023, 11).unwrap();
        let end = MonthBucket::new(2024, 2).unwrap();
        let labels: Vec<String> = start
            .range_inclusive(end)
            .iter()
            .map(|b| b.to_string())
            .collect();
        assert_eq!(labels, vec!["Nov/2023", "Dec/2023", "Jan/2024", "Feb/2024"]);
        assert!(end.range_inclusive(start).is_empty());
        assert_eq!(MonthBucket::new(2024, 13), None);
    }
}
