//! Road Data Scraper Library
//!
//! Concurrent acquisition of Highways England WebTRIS road traffic sensor
//! reports.
//!
//! This library provides tools for:
//! - Resolving the WebTRIS site directory into midas, tmu and tame sensor catalogs
//! - Generating one daily report request per site for a date range
//! - Downloading reports with a bounded worker pool, one category at a time
//! - Appending enriched rows to one CSV file per category
//! - Writing the run's lookup table, config dump, log file and sensor status report

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod report;
pub mod run_dirs;
pub mod run_log;

pub use acquisition::AcquisitionPipeline;
pub use config::ScraperConfig;
pub use error::{Result, ScraperError};
pub use models::{Category, DateRange, DownloadSummary, RunSummary, SiteRecord};
