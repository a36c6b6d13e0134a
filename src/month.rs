// Calendar month value used as the index of every series.
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

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

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid year-month '{0}', expected YYYY-MM")]
pub struct ParseMonthError(pub String);

/// A calendar month. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` when `month` is outside 1..=12 or the year is outside the calendar range.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
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

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Shifts the month by `months` (negative goes back in time).
    pub fn offset(&self, months: i32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) + months as i64;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(&self, other: Self) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }

    pub fn prev(&self) -> Self {
        self.offset(-1)
    }

    /// Label in the scraped table format, e.g. "March 2018".
    pub fn label(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }

    /// Parses a "<Month name> <Year>" label by appending a synthetic day and
    /// parsing with an explicit month-name/year/day format.
    pub fn parse_label(text: &str) -> Option<Self> {
        let with_day = format!("{} 1", text.trim());
        NaiveDate::parse_from_str(&with_day, "%B %Y %d")
            .ok()
            .map(Self::from_date)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ParseMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| ParseMonthError(s.to_string()))?;
        let year: i32 = year.parse().map_err(|_| ParseMonthError(s.to_string()))?;
        let month: u32 = month.parse().map_err(|_| ParseMonthError(s.to_string()))?;
        Self::new(year, month).ok_or_else(|| ParseMonthError(s.to_string()))
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ParseMonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}
