// Chart requests, exported as JSON for an external renderer.
use crate::analyzer::descriptive::Summary;
use crate::analyzer::impact::WindowComparison;
use crate::combiner::CombinedSeries;
use crate::model::{MetricSeries, ReleaseEvent, SeriesPoint, StorageError};
use crate::utils::slugify;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLine {
    pub label: String,
    pub points: Vec<SeriesPoint>,
}

/// Vertical marker at a release date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseMarker {
    pub label: String,
    pub date: String,
}

impl From<&ReleaseEvent> for ReleaseMarker {
    fn from(event: &ReleaseEvent) -> Self {
        Self {
            label: format!("{} Release ({})", event.label, event.date.format("%Y-%m-%d")),
            date: event.date.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub lines: Vec<ChartLine>,
    pub markers: Vec<ReleaseMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPlotGroup {
    pub label: String,
    pub values: Vec<f64>,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPlot {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub groups: Vec<BoxPlotGroup>,
}

/// Destination for chart requests.
pub trait ChartSink {
    fn line_chart(&self, name: &str, chart: &LineChart) -> Result<PathBuf, StorageError>;
    fn box_plot(&self, name: &str, chart: &BoxPlot) -> Result<PathBuf, StorageError>;
}

/// Writes each chart request as pretty JSON under one directory.
pub struct JsonChartWriter {
    dir: PathBuf,
}

impl JsonChartWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        info!("Chart saved to {}", path.display());
        Ok(path)
    }
}

impl ChartSink for JsonChartWriter {
    fn line_chart(&self, name: &str, chart: &LineChart) -> Result<PathBuf, StorageError> {
        self.write_json(name, chart)
    }

    fn box_plot(&self, name: &str, chart: &BoxPlot) -> Result<PathBuf, StorageError> {
        self.write_json(name, chart)
    }
}

pub fn single_chart_name(source: &str, metric: &str) -> String {
    format!("{}_{}_analysis.json", source, slugify(metric))
}

pub fn combined_chart_name(franchise: &str, metric: &str) -> String {
    format!("combined_{}_{}_analysis.json", franchise, slugify(metric))
}

pub fn box_plot_name(source: &str, event_label: &str) -> String {
    format!("{}_{}_boxplot.json", source, slugify(event_label))
}

fn markers(events: &[ReleaseEvent]) -> Vec<ReleaseMarker> {
    events.iter().map(ReleaseMarker::from).collect()
}

pub fn single_chart(source: &str, series: &MetricSeries, events: &[ReleaseEvent]) -> LineChart {
    let metric = series.metric();
    LineChart {
        title: format!("Monthly {} players: {}", metric, source),
        x_label: "Month".into(),
        y_label: format!("{} players", metric),
        lines: vec![ChartLine {
            label: series.metric().to_string(),
            points: series.points().to_vec(),
        }],
        markers: markers(events),
    }
}

/// One line per source of the combined series, sources in label order.
pub fn combined_chart(franchise: &str, combined: &CombinedSeries, events: &[ReleaseEvent]) -> LineChart {
    let metric = &combined.metric;
    let lines = combined
        .sources()
        .into_iter()
        .map(|source| ChartLine {
            label: source.to_string(),
            points: combined
                .source_points(source)
                .map(|p| SeriesPoint {
                    month: p.month,
                    value: p.value,
                })
                .collect(),
        })
        .collect();
    LineChart {
        title: format!("Combined monthly {} players: {}", metric, franchise),
        x_label: "Month".into(),
        y_label: format!("{} players", metric),
        lines,
        markers: markers(events),
    }
}

pub fn window_box_plot(metric: &str, comparison: &WindowComparison) -> BoxPlot {
    let size = comparison.window.size;
    BoxPlot {
        title: format!("Monthly {} before and after {}", metric, comparison.window.pivot),
        x_label: "Period".into(),
        y_label: format!("{} per month", metric),
        groups: vec![
            BoxPlotGroup {
                label: format!("{} months before", size),
                values: comparison.before.clone(),
                summary: comparison.before_summary,
            },
            BoxPlotGroup {
                label: format!("{} months after", size),
                values: comparison.after.clone(),
                summary: comparison.after_summary,
            },
        ],
    }
}
