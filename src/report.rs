//! Post-download collaborators: status reporting and run upload.

use crate::constants::{INACTIVE_SITES_FILE_NAME, OUTPUT_DATA_DIR_NAME, STATUS_REPORT_FILE_NAME};
use crate::error::{Result, ScraperError};
use crate::models::{Category, DateRange, SiteRecord, SiteStatus};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Produces report artefacts once every category has been downloaded
pub trait Reporter: Send + Sync {
    /// Write the report for `sites` into `report_dir`, returning the files created
    fn generate(&self, sites: &[SiteRecord], range: &DateRange, report_dir: &Path)
    -> Result<Vec<PathBuf>>;
}

/// Ships a finished run directory somewhere durable
pub trait Uploader: Send + Sync {
    /// Upload `run_dir`, returning where it ended up
    fn upload(&self, run_dir: &Path) -> Result<PathBuf>;
}

/// Active/inactive site counts per downloadable category
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusReporter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub active: usize,
    pub inactive: usize,
    pub unknown: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.active + self.inactive + self.unknown
    }
}

impl StatusReporter {
    pub fn counts(sites: &[SiteRecord], category: Category) -> StatusCounts {
        sites
            .iter()
            .filter(|site| site.category == category)
            .fold(StatusCounts::default(), |mut counts, site| {
                match site.status {
                    SiteStatus::Active => counts.active += 1,
                    SiteStatus::Inactive => counts.inactive += 1,
                    SiteStatus::Unknown => counts.unknown += 1,
                }
                counts
            })
    }
}

impl Reporter for StatusReporter {
    fn generate(
        &self,
        sites: &[SiteRecord],
        range: &DateRange,
        report_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let summary_path = report_dir.join(STATUS_REPORT_FILE_NAME);
        let mut summary = csv::Writer::from_path(&summary_path)?;
        summary.write_record([
            "category",
            "active",
            "inactive",
            "unknown",
            "total",
            "start_date",
            "end_date",
        ])?;
        for category in Category::DOWNLOADABLE {
            let counts = Self::counts(sites, category);
            summary.write_record([
                category.to_string(),
                counts.active.to_string(),
                counts.inactive.to_string(),
                counts.unknown.to_string(),
                counts.total().to_string(),
                range.start.to_string(),
                range.end.to_string(),
            ])?;
        }
        summary.flush()?;

        let inactive_path = report_dir.join(INACTIVE_SITES_FILE_NAME);
        let mut inactive = csv::Writer::from_path(&inactive_path)?;
        inactive.write_record(["category", "id", "description", "direction"])?;
        for site in sites
            .iter()
            .filter(|s| s.category.is_downloadable() && s.status == SiteStatus::Inactive)
        {
            inactive.write_record([
                site.category.to_string(),
                site.id.to_string(),
                site.description.clone(),
                site.direction.to_string(),
            ])?;
        }
        inactive.flush()?;

        info!("Sensor status report written to {}", report_dir.display());
        Ok(vec![summary_path, inactive_path])
    }
}

/// Mirrors run directories below a destination root, keeping the
/// `output_data/<run>/...` layout
#[derive(Debug, Clone)]
pub struct DirectoryMirrorUploader {
    destination_root: PathBuf,
}

impl DirectoryMirrorUploader {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            destination_root: destination_root.into(),
        }
    }
}

impl Uploader for DirectoryMirrorUploader {
    fn upload(&self, run_dir: &Path) -> Result<PathBuf> {
        let upload_error = |reason: String| ScraperError::Upload {
            path: run_dir.to_path_buf(),
            reason,
        };

        let run_name = run_dir
            .file_name()
            .ok_or_else(|| upload_error("run directory has no name".to_string()))?;
        let destination = self
            .destination_root
            .join(OUTPUT_DATA_DIR_NAME)
            .join(run_name);

        for entry in WalkDir::new(run_dir) {
            let entry = entry.map_err(|e| upload_error(e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(run_dir)
                .map_err(|e| upload_error(e.to_string()))?;
            let target = destination.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|e| upload_error(e.to_string()))?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| upload_error(e.to_string()))?;
                }
                fs::copy(entry.path(), &target).map_err(|e| upload_error(e.to_string()))?;
                debug!("Uploaded {} to {}", entry.path().display(), target.display());
            }
        }

        info!(
            "Uploaded {} to {}",
            run_dir.display(),
            destination.display()
        );
        Ok(destination)
    }
}
