// Batch orchestration: fetch pages into CSV tables, then chart and analyze every franchise.
use crate::aligner::{align, parse_events, resolve_pivot, GateDecision};
use crate::analyzer::{Analyzer, ImpactAnalyzer};
use crate::chart::{
    box_plot_name, combined_chart, combined_chart_name, single_chart, single_chart_name,
    window_box_plot, ChartSink,
};
use crate::combiner::combine;
use crate::config::{AnalysisConfig, AppConfig, FranchiseConfig};
use crate::model::{
    ConfigError, FetchError, FetchRequest, MetricSeries, PipelineError, RawTable, ReleaseEvent, StorageError,
};
use crate::normalizer::normalize;
use crate::parser::{page_title, Parser};
use crate::report::{report_file_name, write_report_file};
use crate::scraper::PageFetcher;
use crate::storage::{list_tables, read_table, source_label, write_table};
use crate::utils::sanitize_file_stem;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

const TABLE_FILE_SUFFIX: &str = "_chart_month_data.csv";
const FALLBACK_FILE_STEM: &str = "steamdb_data";

/// Counters of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub franchises: usize,
    pub franchises_failed: usize,
    pub files_seen: usize,
    pub files_skipped: usize,
    pub charts_written: usize,
    pub reports_written: usize,
    pub analyses_skipped: usize,
}

impl RunSummary {
    fn merge(&mut self, other: &RunSummary) {
        self.franchises += other.franchises;
        self.franchises_failed += other.franchises_failed;
        self.files_seen += other.files_seen;
        self.files_skipped += other.files_skipped;
        self.charts_written += other.charts_written;
        self.reports_written += other.reports_written;
        self.analyses_skipped += other.analyses_skipped;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub requested: usize,
    pub saved: Vec<PathBuf>,
    pub failed: usize,
}

fn storage_error(path: &Path, source: StorageError) -> PipelineError {
    PipelineError::Storage {
        path: path.display().to_string(),
        source,
    }
}

/// Charts and analyses for the CSV tables of one franchise.
pub struct FranchisePipeline<'a, C: ChartSink> {
    config: &'a AppConfig,
    franchise: &'a FranchiseConfig,
    charts: &'a C,
}

impl<'a, C: ChartSink> FranchisePipeline<'a, C> {
    pub fn new(config: &'a AppConfig, franchise: &'a FranchiseConfig, charts: &'a C) -> Self {
        Self {
            config,
            franchise,
            charts,
        }
    }

    fn report_dir(&self) -> PathBuf {
        self.config.report_dir.join(&self.franchise.franchise)
    }

    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let franchise = self.franchise;
        if franchise.media_name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "media name of franchise '{}' is empty",
                franchise.franchise
            ))
            .into());
        }
        if franchise.franchise.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "franchise identifier of '{}' is empty",
                franchise.media_name
            ))
            .into());
        }

        let data_dir = self.config.data_dir.join(&franchise.franchise);
        let files = list_tables(&data_dir).map_err(|e| storage_error(&data_dir, e))?;
        info!(
            "Analyzing '{}': {} tables in {}",
            franchise.media_name,
            files.len(),
            data_dir.display()
        );

        let events = parse_events(franchise.release_dates.as_ref());
        let mut summary = RunSummary {
            franchises: 1,
            ..RunSummary::default()
        };
        let mut to_combine: Vec<(String, MetricSeries)> = Vec::new();

        for path in &files {
            summary.files_seen += 1;
            let source = source_label(path);
            let table = match read_table(path) {
                Ok(t) => t,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    summary.files_skipped += 1;
                    continue;
                }
            };

            match normalize(&table.rows, &franchise.metric, franchise.missing_values) {
                Ok(normalized) => {
                    if franchise.combine {
                        to_combine.push((source.clone(), normalized.series));
                    } else {
                        self.chart_source(&source, &normalized.series, &events, &mut summary);
                    }
                }
                Err(e) => {
                    warn!("Skipping {} for metric '{}': {}", path.display(), franchise.metric, e);
                    summary.files_skipped += 1;
                }
            }

            for analysis in &franchise.analyses {
                self.run_analysis(&source, &table, analysis, &mut summary);
            }
        }

        if franchise.combine {
            if to_combine.is_empty() {
                info!("Combine mode is on but no table of '{}' had usable data", franchise.media_name);
            } else {
                let combined = combine(&to_combine);
                let chart = combined_chart(&franchise.franchise, &combined, &events);
                let name = combined_chart_name(&franchise.franchise, &franchise.metric);
                match self.charts.line_chart(&name, &chart) {
                    Ok(_) => summary.charts_written += 1,
                    Err(e) => warn!("Combined chart {} not written: {}", name, e),
                }
            }
        }

        Ok(summary)
    }

    fn chart_source(
        &self,
        source: &str,
        series: &MetricSeries,
        events: &[ReleaseEvent],
        summary: &mut RunSummary,
    ) {
        let franchise = self.franchise;
        let decision = align(
            series,
            franchise.release_dates.as_ref(),
            franchise.media_type,
            &franchise.main_date,
        );
        if let GateDecision::Skip { oldest, main } = &decision {
            info!(
                "{}: data starts {} which is not before '{}' ({}), no chart generated",
                source, oldest, main.label, main.date
            );
        }
        if !decision.should_render() {
            return;
        }

        let name = single_chart_name(source, series.metric());
        match self.charts.line_chart(&name, &single_chart(source, series, events)) {
            Ok(_) => summary.charts_written += 1,
            Err(e) => warn!("Chart {} not written: {}", name, e),
        }
    }

    fn run_analysis(&self, source: &str, table: &RawTable, analysis: &AnalysisConfig, summary: &mut RunSummary) {
        let franchise = self.franchise;
        let metric = analysis.metric.as_deref().unwrap_or(&franchise.metric);
        let missing = analysis.missing_values.unwrap_or(franchise.missing_values);

        let pivot = analysis.pivot_month.or_else(|| {
            analysis
                .event
                .as_deref()
                .and_then(|event| resolve_pivot(franchise.release_dates.as_ref(), event))
        });
        let Some(pivot) = pivot else {
            warn!(
                "Analysis '{}' of '{}': release event {:?} has no valid date, skipped",
                analysis.label, franchise.media_name, analysis.event
            );
            summary.analyses_skipped += 1;
            return;
        };

        let series = match normalize(&table.rows, metric, missing) {
            Ok(n) => n.series,
            Err(e) => {
                warn!("Analysis '{}' of {}: {}", analysis.label, source, e);
                summary.analyses_skipped += 1;
                return;
            }
        };

        let analyzer = ImpactAnalyzer::new(analysis.window_months, analysis.test_policy);
        let report = analyzer.analyze_impact(&analysis.label, &series, pivot);

        let path = self.report_dir().join(report_file_name(source, &analysis.label));
        match write_report_file(&path, &report) {
            Ok(()) => {
                info!("Report saved to {}", path.display());
                summary.reports_written += 1;
            }
            Err(e) => warn!("Report {} not written: {}", path.display(), e),
        }

        if let Some(comparison) = report.comparison() {
            let event_label = analysis.event.as_deref().unwrap_or(&analysis.label);
            let name = box_plot_name(source, event_label);
            match self.charts.box_plot(&name, &window_box_plot(metric, comparison)) {
                Ok(_) => summary.charts_written += 1,
                Err(e) => warn!("Box plot {} not written: {}", name, e),
            }
        }
    }
}

/// Creates the output directories every franchise writes into.
pub fn prepare_output_dirs(config: &AppConfig) -> Result<(), PipelineError> {
    for dir in [&config.chart_dir, &config.report_dir] {
        fs::create_dir_all(dir).map_err(|e| storage_error(dir, e.into()))?;
    }
    Ok(())
}

/// Runs every configured franchise. A failing franchise is logged and counted;
/// only unusable output directories abort the batch.
pub fn run_all<C: ChartSink>(config: &AppConfig, charts: &C) -> Result<RunSummary, PipelineError> {
    prepare_output_dirs(config)?;

    let mut total = RunSummary::default();
    for franchise in &config.franchises {
        match FranchisePipeline::new(config, franchise, charts).run() {
            Ok(summary) => total.merge(&summary),
            Err(e) => {
                error!("Franchise '{}' aborted: {}", franchise.media_name, e);
                total.franchises += 1;
                total.franchises_failed += 1;
            }
        }
    }
    Ok(total)
}

/// Output path of a fetched table: `<data_dir>/<franchise>/<game>_chart_month_data.csv`.
pub fn table_path(data_dir: &Path, franchise: &str, game_name: &str) -> PathBuf {
    let mut stem = sanitize_file_stem(game_name);
    if stem.is_empty() {
        stem = FALLBACK_FILE_STEM.to_string();
    }
    data_dir.join(franchise).join(format!("{}{}", stem, TABLE_FILE_SUFFIX))
}

async fn fetch_one<F, P>(
    config: &AppConfig,
    fetcher: &F,
    parser: &P,
    request: &FetchRequest,
) -> Result<PathBuf, FetchError>
where
    F: PageFetcher,
    P: Parser,
{
    let html = fetcher.fetch(request).await?;
    let table = parser.parse(&html)?;
    let name = page_title(&html).unwrap_or_else(|| request.game.clone());
    let path = table_path(&config.data_dir, &request.franchise, &name);
    write_table(&path, &table)?;
    info!("Saved {} rows of '{}' to {}", table.rows.len(), name, path.display());
    Ok(path)
}

/// Fetches every configured source in order, pausing between requests.
/// Failures are logged and counted; the remaining sources still run.
pub async fn fetch_all<F, P>(config: &AppConfig, fetcher: &F, parser: &P) -> FetchSummary
where
    F: PageFetcher,
    P: Parser,
{
    let mut summary = FetchSummary::default();
    let delay = Duration::from_secs(config.request_delay_seconds);

    for (i, source) in config.sources.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            sleep(delay).await;
        }
        summary.requested += 1;
        let request = FetchRequest::from(source);
        info!("Fetching '{}' ({})", request.game, request.url);
        match fetch_one(config, fetcher, parser, &request).await {
            Ok(path) => summary.saved.push(path),
            Err(e) => {
                warn!("Fetch of '{}' failed: {}", request.game, e);
                summary.failed += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_table_path() {
        let path = table_path(Path::new("csv_data"), "TheWitcher", "The Witcher 3: Wild Hunt");
        assert_eq!(
            path,
            Path::new("csv_data/TheWitcher/The_Witcher_3_Wild_Hunt_chart_month_data.csv")
        );
        assert!(table_path(Path::new("d"), "f", "???").ends_with("steamdb_data_chart_month_data.csv"));
    }

    struct StaticFetcher;

    #[async_trait::async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, req: &FetchRequest) -> Result<String, crate::model::ScraperError> {
            if req.url.contains("broken") {
                return Err(crate::model::ScraperError::InvalidResponse("404 Not Found".into()));
            }
            Ok(r#"<html><head><title>Fallout 4 Steam Charts · SteamDB</title></head><body>
                <table id="chart-month-table">
                  <thead><tr><th>Month</th><th>Peak</th></tr></thead>
                  <tbody><tr><td>April 2024</td><td>83,000</td></tr></tbody>
                </table></body></html>"#
                .to_string())
        }
    }

    #[tokio::test]
    async fn test_fetch_all_saves_tables_and_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().display().to_string().replace('\\', "/");
        let config = parse_config(&format!(
            r#"{{
                "data_dir": "{root}/data",
                "chart_dir": "{root}/charts",
                "report_dir": "{root}/reports",
                "request_delay_seconds": 0,
                "sources": [
                    {{ "game": "Fallout 4", "url": "https://steamdb.info/app/377160/", "franchise": "Fallout" }},
                    {{ "game": "Gone", "url": "https://broken.example/", "franchise": "Fallout" }}
                ]
            }}"#
        ))
        .unwrap();

        let summary = fetch_all(&config, &StaticFetcher, &crate::parser::MonthTableParser::new()).await;
        assert_eq!(summary.requested, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.saved,
            vec![config.data_dir.join("Fallout").join("Fallout_4_chart_month_data.csv")]
        );
        let table = read_table(&summary.saved[0]).unwrap();
        assert_eq!(table.rows[0].get("Peak"), Some("83,000"));
    }

    #[test]
    fn test_empty_franchise_identifier_aborts_only_that_franchise() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().display().to_string().replace('\\', "/");
        let config = parse_config(&format!(
            r#"{{
                "data_dir": "{root}/data",
                "chart_dir": "{root}/charts",
                "report_dir": "{root}/reports",
                "franchises": [
                    {{ "media_name": "Broken", "franchise": "" }},
                    {{ "media_name": " ", "franchise": "Unnamed" }},
                    {{ "media_name": "Missing", "franchise": "Nowhere" }}
                ]
            }}"#
        ))
        .unwrap();
        let charts = crate::chart::JsonChartWriter::new(&config.chart_dir);
        let summary = run_all(&config, &charts).unwrap();
        assert_eq!(summary.franchises, 3);
        assert_eq!(summary.franchises_failed, 3);
        assert!(config.report_dir.is_dir());
    }

    #[test]
    fn test_empty_media_name_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().display().to_string().replace('\\', "/");
        let config = parse_config(&format!(
            r#"{{
                "data_dir": "{root}/data",
                "chart_dir": "{root}/charts",
                "report_dir": "{root}/reports",
                "franchises": [{{ "media_name": "", "franchise": "TheWitcher" }}]
            }}"#
        ))
        .unwrap();
        let charts = crate::chart::JsonChartWriter::new(&config.chart_dir);
        let err = FranchisePipeline::new(&config, &config.franchises[0], &charts)
            .run()
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::Invalid(msg)) if msg.contains("media name")));
    }
}
