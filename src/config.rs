//! Configuration management and validation.
//!
//! Provides the typed run configuration, loaded from an optional TOML file
//! and CLI overrides, validated once at the boundary before any network
//! activity starts.

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_MAX_TRANSPORT_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SERVER_ERROR_COOLDOWN_SECS,
};
use crate::error::{Result, ScraperError};
use crate::models::DateRange;
use chrono::{Datelike, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Host capabilities relevant to sizing the worker pool
#[derive(Debug, Clone)]
pub struct SystemProfile {
    /// Number of logical CPUs available
    pub cpu_cores: usize,
}

impl SystemProfile {
    pub fn detect() -> Self {
        Self {
            cpu_cores: num_cpus::get().max(1),
        }
    }
}

/// Run configuration for the scraper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// First day of the report window; `None` together with `end_date` selects the default month
    pub start_date: Option<NaiveDate>,

    /// Last day of the report window (inclusive)
    pub end_date: Option<NaiveDate>,

    /// Only download the smoke-test slice of each category
    pub test_run: bool,

    /// Write the sensor status report after downloading
    pub generate_report: bool,

    /// Root directory under which run directories are created
    pub output_path: PathBuf,

    /// Remove the run directory once reporting and upload have finished
    pub rm_dir: bool,

    /// Mirror the finished run directory below this path
    pub upload_path: Option<PathBuf>,

    /// Base URL of the WebTRIS API
    pub api_base_url: String,

    /// Worker pool size; defaults to the host CPU count
    pub workers: Option<usize>,

    pub request_timeout_secs: u64,

    /// Transport-level retries per request before a `Transport` error is surfaced
    pub max_transport_retries: u32,

    /// Pause applied by a worker after a 5xx response
    pub server_error_cooldown_secs: u64,

    /// Render an indicatif progress bar during each phase
    pub show_progress: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            test_run: true,
            generate_report: true,
            output_path: default_output_path(),
            rm_dir: false,
            upload_path: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            workers: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_transport_retries: DEFAULT_MAX_TRANSPORT_RETRIES,
            server_error_cooldown_secs: DEFAULT_SERVER_ERROR_COOLDOWN_SECS,
            show_progress: true,
        }
    }
}

fn default_output_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("road-data-scraper"))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl ScraperConfig {
    /// Load configuration from a TOML file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ScraperConfig = toml::from_str(&contents).map_err(|e| {
            ScraperError::configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Serialise the effective configuration for the run's metadata directory
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ScraperError::configuration(format!("failed to serialise config: {}", e)))
    }

    /// Check cross-field rules once, before the run starts
    pub fn validate(&self) -> Result<()> {
        if self.output_path.as_os_str().is_empty() {
            return Err(ScraperError::configuration(
                "please provide a valid output directory",
            ));
        }

        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => {
                DateRange::new(start, end)?;
            }
            (None, None) => {}
            _ => {
                return Err(ScraperError::configuration(
                    "start_date and end_date must be given together or not at all",
                ));
            }
        }

        if self.workers == Some(0) {
            return Err(ScraperError::configuration("workers must be at least 1"));
        }

        if self.api_base_url.trim().is_empty() {
            return Err(ScraperError::configuration("api_base_url must not be empty"));
        }

        Ok(())
    }

    /// Resolve the report window, falling back to the default month relative to `today`
    pub fn date_range(&self, today: NaiveDate) -> Result<DateRange> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => DateRange::new(start, end),
            (None, None) => default_date_range(today),
            _ => Err(ScraperError::configuration(
                "start_date and end_date must be given together or not at all",
            )),
        }
    }

    /// Resolve the report window relative to the local calendar date
    pub fn resolved_date_range(&self) -> Result<DateRange> {
        self.date_range(Local::now().date_naive())
    }

    pub fn worker_count(&self, profile: &SystemProfile) -> usize {
        self.workers.unwrap_or(profile.cpu_cores).max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn server_error_cooldown(&self) -> Duration {
        Duration::from_secs(self.server_error_cooldown_secs)
    }

    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn with_test_run(mut self, test_run: bool) -> Self {
        self.test_run = test_run;
        self
    }

    pub fn with_output_path(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = output_path.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_report(mut self, generate_report: bool) -> Self {
        self.generate_report = generate_report;
        self
    }

    pub fn with_upload_path(mut self, upload_path: impl Into<PathBuf>) -> Self {
        self.upload_path = Some(upload_path.into());
        self
    }

    pub fn with_rm_dir(mut self, rm_dir: bool) -> Self {
        self.rm_dir = rm_dir;
        self
    }

    pub fn with_server_error_cooldown_secs(mut self, secs: u64) -> Self {
        self.server_error_cooldown_secs = secs;
        self
    }

    /// Disable interactive progress bars (tests and non-tty runs)
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }
}

/// The upstream API lags about two months, so default to the full calendar
/// month two months before `today`.
pub fn default_date_range(today: NaiveDate) -> Result<DateRange> {
    let lagged = today
        .checked_sub_months(Months::new(2))
        .ok_or_else(|| ScraperError::configuration("date out of range"))?;
    let start = lagged
        .with_day(1)
        .ok_or_else(|| ScraperError::configuration("date out of range"))?;
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next_month| next_month.pred_opt())
        .ok_or_else(|| ScraperError::configuration("date out of range"))?;
    DateRange::new(start, end)
}

/// Parse a `YYYY-MM-DD` date supplied on the command line
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|source| {
        ScraperError::DateParsing {
            value: value.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ScraperConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.test_run);
        assert_eq!(config.max_transport_retries, 3);
        assert_eq!(config.server_error_cooldown(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_date_range_is_full_month_two_months_back() {
        let range = default_date_range(date(2023, 3, 15)).unwrap();
        assert_eq!(range.start, date(2023, 1, 1));
        assert_eq!(range.end, date(2023, 1, 31));

        // Crosses a year boundary and lands on a leap February
        let range = default_date_range(date(2024, 4, 30)).unwrap();
        assert_eq!(range.start, date(2024, 2, 1));
        assert_eq!(range.end, date(2024, 2, 29));
    }

    #[test]
    fn test_half_specified_dates_rejected() {
        let config = ScraperConfig {
            start_date: Some(date(2021, 1, 1)),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScraperError::Configuration { .. })
        ));
    }

    #[test]
    fn test_empty_output_path_rejected() {
        let config = ScraperConfig::default().with_output_path("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = ScraperConfig::default().with_workers(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_dates_used() {
        let config = ScraperConfig::default().with_dates(date(2021, 1, 1), date(2021, 1, 31));
        let range = config.date_range(date(2030, 6, 1)).unwrap();
        assert_eq!(range.start, date(2021, 1, 1));
        assert_eq!(range.end, date(2021, 1, 31));
    }

    #[test]
    fn test_worker_count_defaults_to_cpu_cores() {
        let profile = SystemProfile { cpu_cores: 6 };
        assert_eq!(ScraperConfig::default().worker_count(&profile), 6);
        assert_eq!(
            ScraperConfig::default().with_workers(2).worker_count(&profile),
            2
        );
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2021-01-31").unwrap(), date(2021, 1, 31));
        assert!(matches!(
            parse_date("31/01/2021"),
            Err(ScraperError::DateParsing { .. })
        ));
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
start_date = "2021-01-01"
end_date = "2021-01-31"
test_run = false
output_path = "/tmp/road-data"
workers = 3
"#,
        )
        .unwrap();

        let config = ScraperConfig::from_file(&path).unwrap();
        assert_eq!(config.start_date, Some(date(2021, 1, 1)));
        assert_eq!(config.end_date, Some(date(2021, 1, 31)));
        assert!(!config.test_run);
        assert_eq!(config.workers, Some(3));
        // Unspecified keys keep their defaults
        assert!(config.generate_report);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_config_dump_round_trips() {
        let config = ScraperConfig::default()
            .with_dates(date(2021, 1, 1), date(2021, 1, 31))
            .with_output_path("/tmp/out");
        let dumped = config.to_toml().unwrap();
        let parsed: ScraperConfig = toml::from_str(&dumped).unwrap();
        assert_eq!(parsed.start_date, config.start_date);
        assert_eq!(parsed.output_path, config.output_path);
    }
}
