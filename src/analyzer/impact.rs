use crate::analyzer::descriptive::{describe, Summary};
use crate::analyzer::mann_whitney::{mann_whitney_greater, PValueMethod};
use crate::analyzer::normality::NormalityCheck;
use crate::analyzer::selection::{select_test, TestChoice, TestPolicy, TestSelection};
use crate::analyzer::t_test::student_t_greater;
use crate::config::DEFAULT_WINDOW_MONTHS;
use crate::model::{MetricSeries, StatsError};
use crate::month::YearMonth;
use std::fmt;
use tracing::{debug, info};

/// Fixed significance level of the before/after comparison.
pub const SIGNIFICANCE_ALPHA: f64 = 0.05;

/// Trait defining the interface for a release-impact analyzer.
pub trait Analyzer {
    fn analyze_impact(&self, media_label: &str, series: &MetricSeries, pivot: YearMonth) -> ImpactReport;
}

/// The pivot month plus the N months strictly before and after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonWindow {
    pub pivot: YearMonth,
    pub size: usize,
}

impl ComparisonWindow {
    pub fn around(pivot: YearMonth, size: usize) -> Self {
        Self { pivot, size }
    }

    fn span(&self) -> i32 {
        i32::try_from(self.size).unwrap_or(i32::MAX)
    }

    fn distance(&self, month: YearMonth) -> Option<u64> {
        let months = self.pivot.months_until(month).unsigned_abs();
        (months <= self.size as u64).then_some(months)
    }

    /// First and last month of the before range.
    pub fn before_range(&self) -> (YearMonth, YearMonth) {
        (self.pivot.offset(-self.span()), self.pivot.prev())
    }

    /// First and last month of the after range.
    pub fn after_range(&self) -> (YearMonth, YearMonth) {
        (self.pivot.offset(1), self.pivot.offset(self.span()))
    }

    pub fn in_before(&self, month: YearMonth) -> bool {
        month < self.pivot && self.distance(month).is_some()
    }

    pub fn in_after(&self, month: YearMonth) -> bool {
        month > self.pivot && self.distance(month).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImmediateGap {
    PreviousMonthMissing(YearMonth),
    PivotValueMissing,
    PreviousValueZero(YearMonth),
}

impl fmt::Display for ImmediateGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImmediateGap::PreviousMonthMissing(m) => write!(f, "previous month ('{}') not found", m),
            ImmediateGap::PivotValueMissing => write!(f, "release month has no reading"),
            ImmediateGap::PreviousValueZero(m) => write!(f, "previous month ('{}') value is zero", m),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImmediateImpact {
    Computed {
        previous_month: YearMonth,
        previous_value: f64,
        pivot_value: f64,
        change_pct: f64,
    },
    Unavailable(ImmediateGap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alternative {
    /// After-window values stochastically greater than before-window values.
    Greater,
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alternative::Greater => write!(f, "greater (increase after release)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Significance {
    Significant,
    NotSignificant,
}

impl fmt::Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Significance::Significant => write!(f, "significant"),
            Significance::NotSignificant => write!(f, "not significant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub choice: TestChoice,
    pub statistic_name: &'static str,
    pub statistic: f64,
    pub p_value: f64,
    /// Exact or asymptotic, rank test only.
    pub method: Option<PValueMethod>,
    pub alternative: Alternative,
    pub alpha: f64,
    pub verdict: Significance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowComparison {
    pub window: ComparisonWindow,
    pub before: Vec<f64>,
    pub after: Vec<f64>,
    pub before_summary: Summary,
    pub after_summary: Summary,
    pub before_normality: NormalityCheck,
    pub after_normality: NormalityCheck,
    pub selection: TestSelection,
    pub result: Result<TestResult, StatsError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowedImpact {
    Computed(Box<WindowComparison>),
    InsufficientData {
        window: ComparisonWindow,
        before_present: usize,
        after_present: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImpactOutcome {
    EventNotFound,
    Analyzed {
        immediate: ImmediateImpact,
        windowed: WindowedImpact,
    },
}

/// Result of one release-impact analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactReport {
    pub media_label: String,
    pub metric: String,
    pub pivot: YearMonth,
    pub outcome: ImpactOutcome,
}

impl ImpactReport {
    pub fn comparison(&self) -> Option<&WindowComparison> {
        match &self.outcome {
            ImpactOutcome::Analyzed {
                windowed: WindowedImpact::Computed(cmp),
                ..
            } => Some(cmp),
            _ => None,
        }
    }

    pub fn verdict(&self) -> Option<Significance> {
        self.comparison()
            .and_then(|c| c.result.as_ref().ok())
            .map(|r| r.verdict)
    }
}

/// Implementation of the release-impact analyzer.
#[derive(Debug, Clone)]
pub struct ImpactAnalyzer {
    pub window_months: usize,
    pub policy: TestPolicy,
}

impl Default for ImpactAnalyzer {
    fn default() -> Self {
        Self {
            window_months: DEFAULT_WINDOW_MONTHS,
            policy: TestPolicy::default(),
        }
    }
}

impl ImpactAnalyzer {
    pub fn new(window_months: usize, policy: TestPolicy) -> Self {
        Self { window_months, policy }
    }

    fn immediate(series: &MetricSeries, pivot: YearMonth) -> ImmediateImpact {
        let previous_month = pivot.prev();
        if series.value_at(previous_month).is_none() {
            return ImmediateImpact::Unavailable(ImmediateGap::PreviousMonthMissing(previous_month));
        }
        let (Some(previous_value), Some(pivot_value)) =
            (series.value_at(previous_month), series.value_at(pivot))
        else {
            return ImmediateImpact::Unavailable(ImmediateGap::PivotValueMissing);
        };
        if previous_value == 0.0 {
            return ImmediateImpact::Unavailable(ImmediateGap::PreviousValueZero(previous_month));
        }
        ImmediateImpact::Computed {
            previous_month,
            previous_value,
            pivot_value,
            change_pct: (pivot_value - previous_value) / previous_value * 100.0,
        }
    }

    fn windowed(&self, series: &MetricSeries, pivot: YearMonth) -> WindowedImpact {
        let window = ComparisonWindow::around(pivot, self.window_months);
        let present = |in_range: fn(&ComparisonWindow, YearMonth) -> bool| -> Vec<f64> {
            series
                .points()
                .iter()
                .filter(|p| in_range(&window, p.month))
                .filter_map(|p| p.value)
                .collect()
        };
        let before = present(ComparisonWindow::in_before);
        let after = present(ComparisonWindow::in_after);

        let (Some(before_summary), Some(after_summary)) = (describe(&before), describe(&after)) else {
            return WindowedImpact::InsufficientData {
                window,
                before_present: before.len(),
                after_present: after.len(),
            };
        };
        if before.len() != window.size || after.len() != window.size {
            return WindowedImpact::InsufficientData {
                window,
                before_present: before.len(),
                after_present: after.len(),
            };
        }

        let before_normality = NormalityCheck::run(&before);
        let after_normality = NormalityCheck::run(&after);
        let selection = select_test(
            &before_normality,
            &after_normality,
            before.len(),
            after.len(),
            &self.policy,
        );
        debug!("Test selection for {}: {} ({})", pivot, selection.choice, selection.reason);

        let result = run_test(selection.choice, &after, &before);
        WindowedImpact::Computed(Box::new(WindowComparison {
            window,
            before,
            after,
            before_summary,
            after_summary,
            before_normality,
            after_normality,
            selection,
            result,
        }))
    }
}

fn run_test(choice: TestChoice, after: &[f64], before: &[f64]) -> Result<TestResult, StatsError> {
    let (statistic_name, statistic, p_value, method) = match choice {
        TestChoice::MannWhitneyU => {
            let r = mann_whitney_greater(after, before)?;
            ("U", r.u, r.p_value, Some(r.method))
        }
        TestChoice::StudentT => {
            let r = student_t_greater(after, before)?;
            ("t", r.t, r.p_value, None)
        }
    };
    let verdict = if p_value < SIGNIFICANCE_ALPHA {
        Significance::Significant
    } else {
        Significance::NotSignificant
    };
    Ok(TestResult {
        choice,
        statistic_name,
        statistic,
        p_value,
        method,
        alternative: Alternative::Greater,
        alpha: SIGNIFICANCE_ALPHA,
        verdict,
    })
}

impl Analyzer for ImpactAnalyzer {
    fn analyze_impact(&self, media_label: &str, series: &MetricSeries, pivot: YearMonth) -> ImpactReport {
        let outcome = if series.contains(pivot) {
            ImpactOutcome::Analyzed {
                immediate: Self::immediate(series, pivot),
                windowed: self.windowed(series, pivot),
            }
        } else {
            info!("Pivot month {} not found in series for '{}'", pivot, media_label);
            ImpactOutcome::EventNotFound
        };
        ImpactReport {
            media_label: media_label.to_string(),
            metric: series.metric().to_string(),
            pivot,
            outcome,
        }
    }
}

/// Analyzes `series` around `pivot` with the default six-month window.
pub fn analyze_impact(series: &MetricSeries, pivot: YearMonth) -> ImpactReport {
    ImpactAnalyzer::default().analyze_impact("", series, pivot)
}
