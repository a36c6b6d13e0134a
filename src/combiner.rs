use crate::model::MetricSeries;
use crate::month::YearMonth;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedPoint {
    pub month: YearMonth,
    pub value: Option<f64>,
    pub source: String,
}

/// Points of several sources for one metric, ordered by month then source label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombinedSeries {
    pub metric: String,
    pub points: Vec<CombinedPoint>,
}

impl CombinedSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Source labels in sorted order, each once.
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.points.iter().map(|p| p.source.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        sources
    }

    /// Points of one source, still in month order.
    pub fn source_points<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a CombinedPoint> + 'a {
        self.points.iter().filter(move |p| p.source == source)
    }
}

/// Merges labeled series without deduplicating months across sources.
pub fn combine(series: &[(String, MetricSeries)]) -> CombinedSeries {
    let metric = series
        .first()
        .map(|(_, s)| s.metric().to_string())
        .unwrap_or_default();

    let mut points: Vec<CombinedPoint> = series
        .iter()
        .flat_map(|(label, s)| {
            s.points().iter().map(move |p| CombinedPoint {
                month: p.month,
                value: p.value,
                source: label.clone(),
            })
        })
        .collect();
    points.sort_by(|a, b| a.month.cmp(&b.month).then_with(|| a.source.cmp(&b.source)));

    CombinedSeries { metric, points }
}
