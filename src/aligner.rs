// Release-date handling: main-date selection, chart gating and pivot resolution.
use crate::model::{MediaType, MetricSeries, ReleaseEvent};
use crate::month::YearMonth;
use crate::utils::parse_date;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use tracing::{info, warn};

/// Label used when a media item has a single release date.
pub const SINGLE_RELEASE_LABEL: &str = "Release";

/// Label -> raw date pairs, kept in the order they were configured.
/// A repeated label replaces the earlier value in its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledDates(Vec<(String, String)>);

impl LabeledDates {
    pub fn insert(&mut self, label: String, raw: String) {
        match self.0.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = raw,
            None => self.0.push((label, raw)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(l, raw)| (l.as_str(), raw.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for LabeledDates {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut dates = LabeledDates::default();
        for (label, raw) in iter {
            dates.insert(label, raw);
        }
        dates
    }
}

struct LabeledDatesVisitor;

impl<'de> Visitor<'de> for LabeledDatesVisitor {
    type Value = LabeledDates;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of release labels to dates")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut dates = LabeledDates::default();
        while let Some((label, raw)) = access.next_entry::<String, String>()? {
            dates.insert(label, raw);
        }
        Ok(dates)
    }
}

impl<'de> Deserialize<'de> for LabeledDates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(LabeledDatesVisitor)
    }
}

/// Release dates as configured: one date, or several keyed by label.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ReleaseDates {
    Single(String),
    Labeled(LabeledDates),
}

impl ReleaseDates {
    /// (label, raw date) pairs in configuration order.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        match self {
            ReleaseDates::Single(raw) => vec![(SINGLE_RELEASE_LABEL, raw.as_str())],
            ReleaseDates::Labeled(dates) => dates.iter().collect(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries()
            .into_iter()
            .find(|(l, _)| *l == label)
            .map(|(_, raw)| raw)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ReleaseDates::Single(raw) => raw.trim().is_empty(),
            ReleaseDates::Labeled(dates) => dates.is_empty(),
        }
    }
}

/// How to pick the main date from a multi-label map without a first-season entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MainDateFallback {
    /// Earliest parseable date; ties resolved by configuration order.
    #[default]
    Earliest,
    /// First label as configured, whatever its date.
    FirstLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MainDatePolicy {
    pub first_season_label: String,
    pub fallback: MainDateFallback,
}

impl Default for MainDatePolicy {
    fn default() -> Self {
        Self {
            first_season_label: "S1".to_string(),
            fallback: MainDateFallback::Earliest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainDateRule {
    FirstSeason,
    Single,
    Fallback(MainDateFallback),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainDate {
    pub label: String,
    pub raw: String,
    pub rule: MainDateRule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UngatedReason {
    NoReleaseDates,
    InvalidMainDate { label: String, raw: String },
}

/// Whether a dataset is worth charting against its main release date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Data starts before the main release.
    Render { oldest: YearMonth, main: ReleaseEvent },
    /// Data starts on or after the main release: no pre/post signal.
    Skip { oldest: YearMonth, main: ReleaseEvent },
    /// No usable main date, chart unconditionally.
    Ungated(UngatedReason),
    EmptySeries,
}

impl GateDecision {
    pub fn should_render(&self) -> bool {
        matches!(self, GateDecision::Render { .. } | GateDecision::Ungated(_))
    }
}

/// Picks the main release date in priority order: first season of a series,
/// the single date, then the configured fallback.
pub fn select_main_date(
    dates: Option<&ReleaseDates>,
    media_type: MediaType,
    policy: &MainDatePolicy,
) -> Option<MainDate> {
    let dates = dates.filter(|d| !d.is_empty())?;

    if media_type == MediaType::Series {
        if let Some(raw) = dates.get(&policy.first_season_label) {
            return Some(MainDate {
                label: policy.first_season_label.clone(),
                raw: raw.to_string(),
                rule: MainDateRule::FirstSeason,
            });
        }
    }

    if let ReleaseDates::Single(raw) = dates {
        return Some(MainDate {
            label: SINGLE_RELEASE_LABEL.to_string(),
            raw: raw.clone(),
            rule: MainDateRule::Single,
        });
    }

    let entries = dates.entries();
    let chosen = match policy.fallback {
        MainDateFallback::Earliest => entries
            .iter()
            .filter_map(|(label, raw)| parse_date(raw).map(|d| (d, *label, *raw)))
            .min_by_key(|(date, _, _)| *date)
            .map(|(_, label, raw)| (label, raw))
            .or_else(|| entries.first().copied()),
        MainDateFallback::FirstLabel => entries.first().copied(),
    }?;

    warn!(
        "No '{}' entry among {} labeled dates; main date '{}' chosen by {:?} fallback, comparison may be ambiguous",
        policy.first_season_label,
        entries.len(),
        chosen.0,
        policy.fallback
    );
    Some(MainDate {
        label: chosen.0.to_string(),
        raw: chosen.1.to_string(),
        rule: MainDateRule::Fallback(policy.fallback),
    })
}

/// Decides whether `series` pre-dates the main release.
pub fn align(
    series: &MetricSeries,
    dates: Option<&ReleaseDates>,
    media_type: MediaType,
    policy: &MainDatePolicy,
) -> GateDecision {
    let Some(oldest) = series.first_month() else {
        return GateDecision::EmptySeries;
    };

    let Some(main) = select_main_date(dates, media_type, policy) else {
        info!("No main release date configured, chart generated without date filter");
        return GateDecision::Ungated(UngatedReason::NoReleaseDates);
    };

    let Some(date) = parse_date(&main.raw) else {
        warn!(
            "Main release date '{}' ('{}') is invalid, chart generated without date filter",
            main.label, main.raw
        );
        return GateDecision::Ungated(UngatedReason::InvalidMainDate {
            label: main.label,
            raw: main.raw,
        });
    };

    let event = ReleaseEvent {
        label: main.label,
        date,
    };
    match oldest.first_day() {
        Some(start) if start < date => GateDecision::Render { oldest, main: event },
        _ => GateDecision::Skip { oldest, main: event },
    }
}

/// All parseable release events, in configuration order. Invalid dates are logged and dropped.
pub fn parse_events(dates: Option<&ReleaseDates>) -> Vec<ReleaseEvent> {
    let Some(dates) = dates else {
        return Vec::new();
    };
    dates
        .entries()
        .into_iter()
        .filter_map(|(label, raw)| match parse_date(raw) {
            Some(date) => Some(ReleaseEvent {
                label: label.to_string(),
                date,
            }),
            None => {
                warn!("Release date '{}' ('{}') is invalid and is ignored", label, raw);
                None
            }
        })
        .collect()
}

/// Month of the named event, `None` when the label is unknown or its date invalid.
pub fn resolve_pivot(dates: Option<&ReleaseDates>, label: &str) -> Option<YearMonth> {
    let raw = dates?.get(label)?;
    parse_date(raw).map(YearMonth::from_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    fn labeled(pairs: &[(&str, &str)]) -> ReleaseDates {
        ReleaseDates::Labeled(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn series_from(start: YearMonth, len: i32) -> MetricSeries {
        MetricSeries::from_points("Peak", (0..len).map(|i| (start.offset(i), Some(100.0))))
    }

    #[test]
    fn test_series_prefers_first_season() {
        let dates = labeled(&[("S2", "2021-12-17"), ("S1", "2019-12-20")]);
        let main = select_main_date(Some(&dates), MediaType::Series, &MainDatePolicy::default()).unwrap();
        assert_eq!(main.label, "S1");
        assert_eq!(main.rule, MainDateRule::FirstSeason);
    }

    #[test]
    fn test_single_date_used_directly() {
        let dates = ReleaseDates::Single("2021-04-23".into());
        let main = select_main_date(Some(&dates), MediaType::Movie, &MainDatePolicy::default()).unwrap();
        assert_eq!(main.label, SINGLE_RELEASE_LABEL);
        assert_eq!(main.rule, MainDateRule::Single);
    }

    #[test]
    fn test_fallback_is_explicit() {
        let dates = labeled(&[("A-Sequel", "2024-04-10"), ("B-Original", "1997-09-30")]);
        let earliest = select_main_date(Some(&dates), MediaType::Game, &MainDatePolicy::default()).unwrap();
        assert_eq!(earliest.label, "B-Original");
        assert_eq!(earliest.rule, MainDateRule::Fallback(MainDateFallback::Earliest));

        let policy = MainDatePolicy {
            fallback: MainDateFallback::FirstLabel,
            ..MainDatePolicy::default()
        };
        let first = select_main_date(Some(&dates), MediaType::Game, &policy).unwrap();
        assert_eq!(first.label, "A-Sequel");
    }

    #[test]
    fn test_first_label_follows_configuration_order() {
        let dates: ReleaseDates =
            serde_json::from_str(r#"{ "Zmovie": "2024-01-05", "Anime": "2020-03-01" }"#).unwrap();
        assert_eq!(dates.entries()[0].0, "Zmovie");

        let policy = MainDatePolicy {
            fallback: MainDateFallback::FirstLabel,
            ..MainDatePolicy::default()
        };
        let first = select_main_date(Some(&dates), MediaType::Game, &policy).unwrap();
        assert_eq!(first.label, "Zmovie");
        let earliest = select_main_date(Some(&dates), MediaType::Game, &MainDatePolicy::default()).unwrap();
        assert_eq!(earliest.label, "Anime");
    }

    #[test]
    fn test_repeated_label_keeps_position_and_last_value() {
        let dates: LabeledDates = [("S1", "a"), ("S2", "b"), ("S1", "c")]
            .into_iter()
            .map(|(l, r)| (l.to_string(), r.to_string()))
            .collect();
        assert_eq!(dates.iter().collect::<Vec<_>>(), vec![("S1", "c"), ("S2", "b")]);
    }

    #[test]
    fn test_no_dates_selects_nothing() {
        assert!(select_main_date(None, MediaType::Series, &MainDatePolicy::default()).is_none());
        let empty = ReleaseDates::Labeled(LabeledDates::default());
        assert!(select_main_date(Some(&empty), MediaType::Series, &MainDatePolicy::default()).is_none());
    }

    #[test]
    fn test_gate_render_and_skip() {
        let dates = labeled(&[("S1", "2019-12-20")]);
        let policy = MainDatePolicy::default();

        let early = series_from(ym(2018, 1), 36);
        assert!(matches!(
            align(&early, Some(&dates), MediaType::Series, &policy),
            GateDecision::Render { .. }
        ));

        // First day of the release month still precedes a mid-month release.
        let same_month = series_from(ym(2019, 12), 6);
        assert!(align(&same_month, Some(&dates), MediaType::Series, &policy).should_render());

        let late = series_from(ym(2020, 1), 12);
        let decision = align(&late, Some(&dates), MediaType::Series, &policy);
        assert!(matches!(decision, GateDecision::Skip { oldest, .. } if oldest == ym(2020, 1)));
        assert!(!decision.should_render());
    }

    #[test]
    fn test_invalid_main_date_is_ungated() {
        let dates = labeled(&[("S1", "sometime soon")]);
        let decision = align(
            &series_from(ym(2020, 1), 3),
            Some(&dates),
            MediaType::Series,
            &MainDatePolicy::default(),
        );
        assert!(matches!(
            decision,
            GateDecision::Ungated(UngatedReason::InvalidMainDate { ref label, .. }) if label == "S1"
        ));
        assert!(decision.should_render());
    }

    #[test]
    fn test_empty_series_never_renders() {
        let decision = align(&MetricSeries::default(), None, MediaType::Game, &MainDatePolicy::default());
        assert_eq!(decision, GateDecision::EmptySeries);
        assert!(!decision.should_render());
    }

    #[test]
    fn test_parse_events_drops_invalid() {
        let dates = labeled(&[("S1", "2019-12-20"), ("S2", "not a date")]);
        let events = parse_events(Some(&dates));
        assert_eq!(
            events,
            vec![ReleaseEvent {
                label: "S1".into(),
                date: NaiveDate::from_ymd_opt(2019, 12, 20).unwrap()
            }]
        );
    }

    #[test]
    fn test_resolve_pivot() {
        let dates = labeled(&[("S1", "2019-12-20"), ("S2", "bad")]);
        assert_eq!(resolve_pivot(Some(&dates), "S1"), Some(ym(2019, 12)));
        assert_eq!(resolve_pivot(Some(&dates), "S2"), None);
        assert_eq!(resolve_pivot(Some(&dates), "S3"), None);
        assert_eq!(resolve_pivot(None, "S1"), None);
    }
}
