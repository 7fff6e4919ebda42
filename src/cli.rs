//! Command-line interface components.

use crate::acquisition::AcquisitionPipeline;
use crate::config::{ScraperConfig, parse_date};
use crate::error::Result;
use crate::models::RunSummary;
use crate::run_log::RunLog;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "road-data-scraper")]
#[command(about = "Download WebTRIS road traffic sensor reports into per-category CSV files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// TOML configuration file; command-line flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// First day of the report window (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg, requires = "end_date")]
    pub start_date: Option<NaiveDate>,

    /// Last day of the report window, inclusive (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg, requires = "start_date")]
    pub end_date: Option<NaiveDate>,

    /// Download every site instead of the smoke-test slice
    #[arg(long, conflicts_with = "test_run")]
    pub full_run: bool,

    /// Only download the smoke-test slice of each category
    #[arg(long)]
    pub test_run: bool,

    /// Skip the sensor status report
    #[arg(long)]
    pub no_report: bool,

    /// Remove the run directory once the run has finished
    #[arg(long)]
    pub rm_dir: bool,

    /// Mirror the finished run directory below this path
    #[arg(long, value_name = "DIR")]
    pub upload_path: Option<PathBuf>,

    /// Root directory for run output
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Number of concurrent download workers (defaults to the CPU count)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Override the WebTRIS API base URL
    #[arg(long, value_name = "URL")]
    pub api_base_url: Option<String>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: debug, -vv: trace)"
    )]
    pub verbose: u8,

    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

fn parse_date_arg(value: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(value).map_err(|e| e.to_string())
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    /// Progress bars only make sense when logs are visible
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }

    /// Build the run configuration: file values first, then flag overrides
    pub fn load_config(&self) -> Result<ScraperConfig> {
        let config = match &self.config {
            Some(path) => {
                info!("Using config file: {}", path.display());
                ScraperConfig::from_file(path)?
            }
            None => ScraperConfig::default(),
        };
        let config = self.apply_overrides(config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&self, mut config: ScraperConfig) -> ScraperConfig {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            config = config.with_dates(start, end);
        }
        if self.full_run {
            config.test_run = false;
        }
        if self.test_run {
            config.test_run = true;
        }
        if self.no_report {
            config.generate_report = false;
        }
        if self.rm_dir {
            config.rm_dir = true;
        }
        if let Some(path) = &self.upload_path {
            config.upload_path = Some(path.clone());
        }
        if let Some(path) = &self.output {
            config.output_path = path.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(url) = &self.api_base_url {
            config.api_base_url = url.clone();
        }
        if !self.show_progress() {
            config.show_progress = false;
        }
        config
    }
}

/// Set up structured logging on stderr, mirrored into `run_log` while a run is attached
pub fn setup_logging(args: &Args, run_log: &RunLog) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("road_data_scraper={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .with(run_log.layer())
        .init();

    debug!("Logging initialized at level: {}", log_level);
}

/// Load the configuration and run one acquisition
pub async fn run(args: &Args, run_log: RunLog) -> anyhow::Result<RunSummary> {
    let config = args
        .load_config()
        .context("Failed to load configuration")?;
    let pipeline = AcquisitionPipeline::new(config)
        .context("Invalid configuration")?
        .with_run_log(run_log);
    let summary = pipeline.run().await.context("Acquisition run failed")?;
    Ok(summary)
}

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "Road data acquisition complete".bright_green().bold());
    println!(
        "  {} {}",
        "Date range:".bright_white(),
        summary.date_range.to_string().bright_cyan()
    );
    println!(
        "  {} {}",
        "Sites catalogued:".bright_white(),
        summary.sites_total
    );

    for phase in &summary.phases {
        let failed = phase.failed_requests();
        let failures = if failed > 0 {
            format!("{} failed", failed).bright_red()
        } else {
            "0 failed".bright_black()
        };
        println!(
            "  {:<6} {} rows from {}/{} requests ({}, {} server errors) in {:.1}s",
            phase.category.to_string().bright_yellow().bold(),
            phase.rows_written,
            phase.completed,
            phase.requests_total,
            failures,
            phase.server_errors,
            phase.elapsed.as_secs_f64()
        );
    }

    println!(
        "  {} {}",
        "Total rows:".bright_white(),
        summary.total_rows().to_string().bright_green()
    );
    if summary.run_dir_removed {
        println!(
            "  {} {} (removed)",
            "Run directory:".bright_white(),
            summary.run_dir.display().to_string().bright_black()
        );
    } else {
        println!(
            "  {} {}",
            "Run directory:".bright_white(),
            summary.run_dir.display()
        );
    }
    if let Some(uploaded) = &summary.uploaded_to {
        println!("  {} {}", "Uploaded to:".bright_white(), uploaded.display());
    }
    println!(
        "  {} {:.2} minutes",
        "Run time:".bright_white(),
        summary.elapsed.as_secs_f64() / 60.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_overrides_apply_on_top_of_defaults() {
        let args = Args::parse_from([
            "road-data-scraper",
            "--start-date",
            "2021-01-01",
            "--end-date",
            "2021-01-31",
            "--full-run",
            "--no-report",
            "--workers",
            "8",
            "--output",
            "/tmp/road",
        ]);
        let config = args.load_config().unwrap();

        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(config.end_date, NaiveDate::from_ymd_opt(2021, 1, 31));
        assert!(!config.test_run);
        assert!(!config.generate_report);
        assert_eq!(config.workers, Some(8));
        assert_eq!(config.output_path, PathBuf::from("/tmp/road"));
    }

    #[test]
    fn test_defaults_keep_test_run() {
        let args = Args::parse_from(["road-data-scraper"]);
        let config = args.load_config().unwrap();
        assert!(config.test_run);
        assert!(config.generate_report);
        assert_eq!(args.get_log_level(), "info");
    }

    #[test]
    fn test_start_date_requires_end_date() {
        let result = Args::try_parse_from(["road-data-scraper", "--start-date", "2021-01-01"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_date_rejected() {
        let result = Args::try_parse_from([
            "road-data-scraper",
            "--start-date",
            "01/01/2021",
            "--end-date",
            "2021-01-31",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_disables_progress() {
        let args = Args::parse_from(["road-data-scraper", "-q"]);
        assert_eq!(args.get_log_level(), "error");
        let config = args.apply_overrides(ScraperConfig::default());
        assert!(!config.show_progress);
    }
}
