use crate::aligner::{MainDatePolicy, ReleaseDates};
use crate::analyzer::selection::TestPolicy;
use crate::model::{ConfigError, FetchRequest, MediaType};
use crate::month::YearMonth;
use crate::normalizer::MissingValuePolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_WINDOW_MONTHS: usize = 6;

/// Ten years either side of the release month.
pub const MAX_WINDOW_MONTHS: usize = 120;

fn default_metric() -> String {
    "Average".to_string()
}

fn default_window_months() -> usize {
    DEFAULT_WINDOW_MONTHS
}

fn default_request_delay() -> u64 {
    10
}

fn default_timeout() -> u64 {
    30
}

/// One before/after comparison to run against every source of a franchise.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Audiovisual label used in the report header and file name.
    pub label: String,
    /// Release event whose month becomes the pivot.
    #[serde(default)]
    pub event: Option<String>,
    /// Explicit pivot, takes precedence over `event`.
    #[serde(default)]
    pub pivot_month: Option<YearMonth>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub missing_values: Option<MissingValuePolicy>,
    #[serde(default = "default_window_months")]
    pub window_months: usize,
    #[serde(default)]
    pub test_policy: TestPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FranchiseConfig {
    pub media_name: String,
    /// Directory name under `data_dir` holding this franchise's CSV files.
    pub franchise: String,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub release_dates: Option<ReleaseDates>,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default)]
    pub combine: bool,
    #[serde(default)]
    pub missing_values: MissingValuePolicy,
    #[serde(default)]
    pub main_date: MainDatePolicy,
    #[serde(default)]
    pub analyses: Vec<AnalysisConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub game: String,
    pub url: String,
    pub franchise: String,
}

impl From<&SourceConfig> for FetchRequest {
    fn from(source: &SourceConfig) -> Self {
        FetchRequest {
            game: source.game.clone(),
            url: source.url.clone(),
            franchise: source.franchise.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub chart_dir: PathBuf,
    pub report_dir: PathBuf,
    #[serde(default)]
    pub franchises: Vec<FranchiseConfig>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default = "default_request_delay")]
    pub request_delay_seconds: u64,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

impl AppConfig {
    /// Checks the fields every run depends on. Franchise identifiers are
    /// checked later, per franchise, so one bad entry does not stop the batch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, dir) in [
            ("data_dir", &self.data_dir),
            ("chart_dir", &self.chart_dir),
            ("report_dir", &self.report_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("'{}' must not be empty", name)));
            }
        }

        for franchise in &self.franchises {
            if franchise.metric.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "franchise '{}' has an empty metric",
                    franchise.media_name
                )));
            }
            for analysis in &franchise.analyses {
                if analysis.event.is_none() && analysis.pivot_month.is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "analysis '{}' of '{}' needs either 'event' or 'pivot_month'",
                        analysis.label, franchise.media_name
                    )));
                }
                if analysis.window_months == 0 || analysis.window_months > MAX_WINDOW_MONTHS {
                    return Err(ConfigError::Invalid(format!(
                        "analysis '{}' of '{}' has window_months = {}, expected 1..={}",
                        analysis.label, franchise.media_name, analysis.window_months, MAX_WINDOW_MONTHS
                    )));
                }
            }
        }

        for source in &self.sources {
            if source.url.trim().is_empty() || source.franchise.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source '{}' needs a url and a franchise",
                    source.game
                )));
            }
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "data_dir": "csv_data",
        "chart_dir": "graphs",
        "report_dir": "reports",
        "franchises": [
            {
                "media_name": "The Witcher",
                "franchise": "TheWitcher",
                "media_type": "Series",
                "release_dates": { "S1": "2019-12-20", "S2": "2021-12-17" },
                "metric": "Peak",
                "combine": true,
                "missing_values": "keep_gaps",
                "analyses": [
                    { "label": "S1", "event": "S1" },
                    { "label": "S2", "pivot_month": "2021-12", "window_months": 4 }
                ]
            },
            {
                "media_name": "Mortal Kombat",
                "franchise": "MortalKombat",
                "media_type": "Movie",
                "release_dates": "2021-04-23"
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample_config() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.franchises.len(), 2);
        assert_eq!(config.request_delay_seconds, 10);

        let witcher = &config.franchises[0];
        assert_eq!(witcher.media_type, MediaType::Series);
        assert_eq!(witcher.missing_values, MissingValuePolicy::KeepGaps);
        assert!(witcher.combine);
        assert_eq!(witcher.analyses[0].window_months, DEFAULT_WINDOW_MONTHS);
        assert_eq!(witcher.analyses[1].pivot_month, YearMonth::new(2021, 12));

        let mk = &config.franchises[1];
        assert_eq!(mk.metric, "Average");
        assert_eq!(mk.missing_values, MissingValuePolicy::Drop);
        assert!(matches!(mk.release_dates, Some(ReleaseDates::Single(_))));
    }

    #[test]
    fn test_analysis_without_pivot_is_rejected() {
        let content = r#"{
            "data_dir": "d", "chart_dir": "c", "report_dir": "r",
            "franchises": [{ "media_name": "X", "franchise": "X",
                             "analyses": [{ "label": "nothing" }] }]
        }"#;
        let err = parse_config(content).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("pivot_month")));
    }

    #[test]
    fn test_window_months_out_of_range_is_rejected() {
        for window in [0, MAX_WINDOW_MONTHS + 1, 1 << 31] {
            let content = format!(
                r#"{{
                    "data_dir": "d", "chart_dir": "c", "report_dir": "r",
                    "franchises": [{{ "media_name": "X", "franchise": "X",
                        "analyses": [{{ "label": "S1", "pivot_month": "2019-12", "window_months": {} }}] }}]
                }}"#,
                window
            );
            let err = parse_config(&content).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("window_months")));
        }
    }

    #[test]
    fn test_empty_output_dir_is_rejected() {
        let content = r#"{ "data_dir": "d", "chart_dir": "", "report_dir": "r" }"#;
        assert!(matches!(parse_config(content), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = parse_config(include_str!("../config.example.json")).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.franchises[1].analyses[0].test_policy.min_parametric_n, 8);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_config(Path::new("/definitely/not/here/config.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here/config.json"));
    }
}
