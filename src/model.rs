// Core structs: RawRow, RawTable, MetricSeries, ReleaseEvent and the error types
use crate::month::YearMonth;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{BTreeMap, Entry};
use thiserror::Error;

pub const MONTH_COLUMN: &str = "Month";

/// Placeholder written for a month whose reading is missing.
pub const MISSING_PLACEHOLDER: &str = "-";

/// One scraped table row: column name -> raw cell text, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.cells.iter().any(|(name, _)| name == column)
    }
}

/// Headers plus rows, the unit persisted as one CSV file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    /// Zips every record with the headers. Cells beyond the header count are ignored.
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let rows = records
            .into_iter()
            .map(|record| RawRow::from_pairs(headers.iter().cloned().zip(record)))
            .collect();
        Self { headers, rows }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub month: YearMonth,
    /// `None` marks a retained reporting gap.
    pub value: Option<f64>,
}

/// Month-indexed numeric series: unique months, ascending, finite values only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricSeries {
    metric: String,
    points: Vec<SeriesPoint>,
}

impl MetricSeries {
    /// Builds a series from unordered points. The first point seen for a month
    /// wins and non-finite values become gaps.
    pub fn from_points<I>(metric: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = (YearMonth, Option<f64>)>,
    {
        let mut by_month: BTreeMap<YearMonth, Option<f64>> = BTreeMap::new();
        for (month, value) in points {
            if let Entry::Vacant(slot) = by_month.entry(month) {
                slot.insert(value.filter(|v| v.is_finite()));
            }
        }
        Self {
            metric: metric.into(),
            points: by_month
                .into_iter()
                .map(|(month, value)| SeriesPoint { month, value })
                .collect(),
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_month(&self) -> Option<YearMonth> {
        self.points.first().map(|p| p.month)
    }

    pub fn get(&self, month: YearMonth) -> Option<&SeriesPoint> {
        self.points
            .binary_search_by(|p| p.month.cmp(&month))
            .ok()
            .map(|idx| &self.points[idx])
    }

    pub fn contains(&self, month: YearMonth) -> bool {
        self.get(month).is_some()
    }

    /// Value for `month`, `None` when the month is absent or a gap.
    pub fn value_at(&self, month: YearMonth) -> Option<f64> {
        self.get(month).and_then(|p| p.value)
    }

    pub fn gap_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_none()).count()
    }

    /// Renders the series back into scraped-table rows.
    pub fn to_raw_rows(&self) -> Vec<RawRow> {
        self.points
            .iter()
            .map(|p| {
                let value = p
                    .value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| MISSING_PLACEHOLDER.to_string());
                RawRow::from_pairs([
                    (MONTH_COLUMN.to_string(), p.month.label()),
                    (self.metric.clone(), value),
                ])
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum MediaType {
    Series,
    Movie,
    Game,
    #[default]
    Other,
}

/// A named release mapped to a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseEvent {
    pub label: String,
    pub date: NaiveDate,
}

impl ReleaseEvent {
    pub fn month(&self) -> YearMonth {
        YearMonth::from_date(self.date)
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub game: String,
    pub url: String,
    pub franchise: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure that aborts one franchise run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot access '{path}': {source}")]
    Storage {
        path: String,
        #[source]
        source: StorageError,
    },
}

/// Failure of one source during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Scraper(#[from] ScraperError),
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    HttpError(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected response status {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("HTML parse error: {0}")]
    HtmlParseError(String),
    #[error("table '{0}' not found in page")]
    MissingTable(String),
    #[error("table '{0}' has no data rows")]
    EmptyTable(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("table has no rows")]
    NoRows,
    #[error("column '{0}' not found")]
    MissingMonthColumn(String),
    #[error("metric column '{0}' not found")]
    MissingMetricColumn(String),
    #[error("no valid month found after date parsing")]
    NoValidMonths,
    #[error("metric '{0}' has no numeric value after cleaning")]
    AllMetricMissing(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StatsError {
    #[error("need at least {needed} observations, got {got}")]
    InsufficientSample { needed: usize, got: usize },
    #[error("sample has zero variance")]
    ZeroVariance,
    #[error("distribution error: {0}")]
    Distribution(String),
}
