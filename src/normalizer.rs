use crate::model::{MetricSeries, NormalizeError, RawRow, MONTH_COLUMN};
use crate::month::YearMonth;
use serde::Deserialize;
use std::collections::btree_map::{BTreeMap, Entry};
use tracing::debug;

/// Month text that is not a calendar month and never reaches date parsing.
const NON_CALENDAR_SENTINEL: &str = "last 30 days";

/// What to do with a month whose metric cell is not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Drop the month entirely (continuous averages).
    #[default]
    Drop,
    /// Keep the month as a gap (count metrics with deliberate "-" placeholders).
    KeepGaps,
}

/// Per-table counters of what normalization discarded or retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipStats {
    pub sentinel_rows: usize,
    pub unparsed_months: usize,
    pub duplicate_months: usize,
    pub dropped_missing: usize,
    pub kept_gaps: usize,
}

#[derive(Debug, Clone)]
pub struct NormalizedSeries {
    pub series: MetricSeries,
    pub skipped: SkipStats,
}

/// Turns scraped rows into a clean month-indexed series for `metric`.
pub fn normalize(
    rows: &[RawRow],
    metric: &str,
    policy: MissingValuePolicy,
) -> Result<NormalizedSeries, NormalizeError> {
    if rows.is_empty() {
        return Err(NormalizeError::NoRows);
    }
    if !rows.iter().any(|r| r.has_column(MONTH_COLUMN)) {
        return Err(NormalizeError::MissingMonthColumn(MONTH_COLUMN.to_string()));
    }
    if !rows.iter().any(|r| r.has_column(metric)) {
        return Err(NormalizeError::MissingMetricColumn(metric.to_string()));
    }

    let mut skipped = SkipStats::default();
    let mut dated: Vec<(YearMonth, Option<f64>)> = Vec::with_capacity(rows.len());

    for row in rows {
        let month_text = row.get(MONTH_COLUMN).unwrap_or_default();
        if month_text.to_lowercase().contains(NON_CALENDAR_SENTINEL) {
            skipped.sentinel_rows += 1;
            continue;
        }
        let Some(month) = YearMonth::parse_label(month_text) else {
            debug!("Unparseable month '{}', row skipped", month_text);
            skipped.unparsed_months += 1;
            continue;
        };
        dated.push((month, row.get(metric).and_then(parse_value)));
    }

    if dated.is_empty() {
        return Err(NormalizeError::NoValidMonths);
    }
    if dated.iter().all(|(_, value)| value.is_none()) {
        return Err(NormalizeError::AllMetricMissing(metric.to_string()));
    }

    let mut by_month: BTreeMap<YearMonth, Option<f64>> = BTreeMap::new();
    for (month, value) in dated {
        if value.is_none() && policy == MissingValuePolicy::Drop {
            skipped.dropped_missing += 1;
            continue;
        }
        match by_month.entry(month) {
            Entry::Vacant(slot) => {
                if value.is_none() {
                    skipped.kept_gaps += 1;
                }
                slot.insert(value);
            }
            Entry::Occupied(_) => skipped.duplicate_months += 1,
        }
    }

    Ok(NormalizedSeries {
        series: MetricSeries::from_points(metric, by_month),
        skipped,
    })
}

/// Strips thousands separators and parses a finite number.
pub fn parse_value(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
