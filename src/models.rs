//! Core data structures for road sensor acquisition.
//!
//! Defines sensor categories, the normalised site records produced by the
//! catalog resolver, the per-site requests handed to the worker pool, the
//! enriched rows written to CSV, and the summaries reported back.

use crate::constants::API_DATE_FORMAT;
use crate::error::{Result, ScraperError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Road sensor technology bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Midas,
    Tmu,
    Tame,
    /// Residual bucket, never downloaded
    Other,
}

impl Category {
    /// Categories with downloadable reports, in phase order
    pub const DOWNLOADABLE: [Category; 3] = [Category::Midas, Category::Tmu, Category::Tame];

    pub const ALL: [Category; 4] = [
        Category::Midas,
        Category::Tmu,
        Category::Tame,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Midas => "midas",
            Category::Tmu => "tmu",
            Category::Tame => "tame",
            Category::Other => "other",
        }
    }

    pub fn is_downloadable(&self) -> bool {
        !matches!(self, Category::Other)
    }

    /// Reject the residual bucket where a downloadable category is required
    pub fn ensure_downloadable(self) -> Result<Self> {
        if self.is_downloadable() {
            Ok(self)
        } else {
            Err(ScraperError::InvalidCategory {
                category: self.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "midas" => Ok(Category::Midas),
            "tmu" => Ok(Category::Tmu),
            "tame" => Ok(Category::Tame),
            "other" => Ok(Category::Other),
            other => Err(ScraperError::InvalidCategory {
                category: other.to_string(),
            }),
        }
    }
}

/// Sensor type parsed out of a site's free-text name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteKind {
    Midas,
    Tmu,
    Tame,
    LegacySite,
    /// No known marker; carries the original name unchanged
    Passthrough(String),
}

impl SiteKind {
    /// Label written to the lookup table's `name` column
    pub fn label(&self) -> &str {
        match self {
            SiteKind::Midas => "midas",
            SiteKind::Tmu => "tmu",
            SiteKind::Tame => "tame",
            SiteKind::LegacySite => "Legacy Site",
            SiteKind::Passthrough(original) => original,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            SiteKind::Midas => Category::Midas,
            SiteKind::Tmu => Category::Tmu,
            SiteKind::Tame => Category::Tame,
            SiteKind::LegacySite | SiteKind::Passthrough(_) => Category::Other,
        }
    }
}

/// Operational status reported by the site directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    Active,
    Inactive,
    Unknown,
}

impl SiteStatus {
    pub fn from_api(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "active" => SiteStatus::Active,
            "inactive" => SiteStatus::Inactive,
            _ => SiteStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Active => "active",
            SiteStatus::Inactive => "inactive",
            SiteStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical carriageway direction of a site
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    Eastbound,
    Northbound,
    Southbound,
    Westbound,
    /// Clockwise and anti-clockwise ring-road carriageways
    Clockwise,
    LegacySite,
    CarriagewayConnector,
    /// Lower-cased text that matched no known direction
    Raw(String),
}

impl Direction {
    /// Canonicalise a direction segment; idempotent over its own output
    pub fn canonicalize(raw: &str) -> Self {
        // Ordered substring table; first match wins
        let table = [
            ("eastbound", Direction::Eastbound),
            ("northbound", Direction::Northbound),
            ("southbound", Direction::Southbound),
            ("westbound", Direction::Westbound),
            ("clockwise", Direction::Clockwise),
            ("legacy site", Direction::LegacySite),
            ("on connector", Direction::CarriagewayConnector),
            ("carriageway connector", Direction::CarriagewayConnector),
        ];

        let lowered = raw.to_lowercase();
        table
            .into_iter()
            .find(|(needle, _)| lowered.contains(needle))
            .map(|(_, direction)| direction)
            .unwrap_or(Direction::Raw(lowered))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Direction::Eastbound => "eastbound",
            Direction::Northbound => "northbound",
            Direction::Southbound => "southbound",
            Direction::Westbound => "westbound",
            Direction::Clockwise => "clockwise",
            Direction::LegacySite => "legacy site",
            Direction::CarriagewayConnector => "carriageway connector",
            Direction::Raw(raw) => raw,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical sensor site, normalised from the remote directory
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub id: u64,
    /// Original free-text name as returned by the directory
    pub name: String,
    pub description: String,
    pub kind: SiteKind,
    pub category: Category,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub status: SiteStatus,
    pub direction: Direction,
    pub easting: Option<String>,
    pub northing: Option<String>,
}

impl SiteRecord {
    /// Row for the lookup dump, in `LOOKUP_HEADER` order
    pub fn to_lookup_record(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.kind.label().to_string(),
            self.description.clone(),
            format_optional(self.longitude),
            format_optional(self.latitude),
            self.status.as_str().to_string(),
            self.direction.as_str().to_string(),
            self.easting.clone().unwrap_or_default(),
            self.northing.clone().unwrap_or_default(),
            self.category.as_str().to_string(),
        ]
    }
}

/// Immutable per-site columns appended to every reading row
#[derive(Debug, Clone, PartialEq)]
pub struct SiteMetadata {
    pub site_id: u64,
    pub category: Category,
    pub direction: Direction,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub status: SiteStatus,
    pub easting: Option<String>,
    pub northing: Option<String>,
}

impl From<&SiteRecord> for SiteMetadata {
    fn from(site: &SiteRecord) -> Self {
        Self {
            site_id: site.id,
            category: site.category,
            direction: site.direction.clone(),
            longitude: site.longitude,
            latitude: site.latitude,
            status: site.status,
            easting: site.easting.clone(),
            northing: site.northing.clone(),
        }
    }
}

/// A report URL paired with the metadata of the site it covers
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRequest {
    pub url: String,
    pub metadata: Arc<SiteMetadata>,
}

/// One time-bucketed reading enriched with its site's metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRow {
    /// Values of `REPORT_ROW_FIELDS`, in that order
    pub readings: Vec<String>,
    pub metadata: Arc<SiteMetadata>,
}

impl ReadingRow {
    /// Flatten into `CSV_HEADER` column order
    pub fn to_record(&self) -> Vec<String> {
        let meta = &self.metadata;
        let mut record = Vec::with_capacity(self.readings.len() + 8);
        record.push(meta.site_id.to_string());
        record.extend(self.readings.iter().cloned());
        record.push(format_optional(meta.longitude));
        record.push(format_optional(meta.latitude));
        record.push(meta.status.as_str().to_string());
        record.push(meta.category.as_str().to_string());
        record.push(meta.direction.as_str().to_string());
        record.push(meta.easting.clone().unwrap_or_default());
        record.push(meta.northing.clone().unwrap_or_default());
        record
    }
}

/// Inclusive calendar date range of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ScraperError::configuration(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Start and end in the API's compact `DDMMYYYY` form
    pub fn api_dates(&self) -> (String, String) {
        (
            self.start.format(API_DATE_FORMAT).to_string(),
            self.end.format(API_DATE_FORMAT).to_string(),
        )
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Outcome of one category's download phase
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub category: Category,
    pub output_path: PathBuf,
    /// Requests handed to `download`, before any smoke-test slicing
    pub requests_total: usize,
    pub requests_dispatched: usize,
    pub completed: usize,
    pub non_success_responses: usize,
    pub server_errors: usize,
    pub malformed_payloads: usize,
    pub transport_failures: usize,
    pub rows_written: usize,
    pub elapsed: Duration,
}

impl DownloadSummary {
    pub fn failed_requests(&self) -> usize {
        self.malformed_payloads + self.transport_failures
    }
}

/// Outcome of a whole acquisition run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub date_range: DateRange,
    pub sites_total: usize,
    pub phases: Vec<DownloadSummary>,
    pub report_written: bool,
    pub uploaded_to: Option<PathBuf>,
    pub run_dir_removed: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn total_rows(&self) -> usize {
        self.phases.iter().map(|p| p.rows_written).sum()
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
