//! Run directory provisioning
//!
//! Every run writes below its own directory
//! `<output>/output_data/<run_id>_<Month-DD-YYYY>_to_<Month-DD-YYYY>/`
//! with `data/`, `metadata/` and `report/` subdirectories.

use crate::constants::{DATA_DIR_NAME, METADATA_DIR_NAME, OUTPUT_DATA_DIR_NAME, REPORT_DIR_NAME};
use crate::error::{Result, ScraperError};
use crate::models::DateRange;

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const RUN_ID_FORMAT: &str = "%Y-%m-%d-%H-%M-%S.%f";
const RUN_DATE_FORMAT: &str = "%B-%d-%Y";

/// The writable directories of a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectories {
    pub root: PathBuf,
    pub data: PathBuf,
    pub metadata: PathBuf,
    pub report: PathBuf,
}

impl RunDirectories {
    /// Directory name for a run, e.g. `2021-03-01-10-00-00.000000_January-01-2021_to_January-31-2021`
    pub fn run_dir_name(run_id: &str, range: &DateRange) -> String {
        format!(
            "{}_{}_to_{}",
            run_id,
            range.start.format(RUN_DATE_FORMAT),
            range.end.format(RUN_DATE_FORMAT)
        )
    }

    /// Create a fresh run directory tree stamped with the current local time
    pub fn provision(output_root: &Path, range: &DateRange) -> Result<Self> {
        let run_id = Local::now().format(RUN_ID_FORMAT).to_string();
        Self::provision_with_id(output_root, &run_id, range)
    }

    pub fn provision_with_id(output_root: &Path, run_id: &str, range: &DateRange) -> Result<Self> {
        if output_root.as_os_str().is_empty() {
            return Err(ScraperError::configuration(
                "please provide a valid output directory",
            ));
        }

        let root = output_root
            .join(OUTPUT_DATA_DIR_NAME)
            .join(Self::run_dir_name(run_id, range));
        let dirs = Self {
            data: root.join(DATA_DIR_NAME),
            metadata: root.join(METADATA_DIR_NAME),
            report: root.join(REPORT_DIR_NAME),
            root,
        };

        for (label, path) in [
            ("Data", &dirs.data),
            ("Metadata", &dirs.metadata),
            ("Report", &dirs.report),
        ] {
            info!("Making {} Directory at: {}", label, path.display());
            fs::create_dir_all(path).map_err(|e| ScraperError::RunDirectory {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(dirs)
    }

    /// Name of the run directory itself
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Delete the whole run directory tree
    pub fn remove(&self) -> Result<()> {
        info!("Removing {} folder", self.name());
        fs::remove_dir_all(&self.root).map_err(|e| ScraperError::RunDirectory {
            path: self.root.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn january_2021() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_run_dir_name() {
        assert_eq!(
            RunDirectories::run_dir_name("2021-03-01-10-00-00.000000", &january_2021()),
            "2021-03-01-10-00-00.000000_January-01-2021_to_January-31-2021"
        );
    }

    #[test]
    fn test_provision_creates_tree() {
        let temp_dir = TempDir::new().unwrap();
        let dirs =
            RunDirectories::provision_with_id(temp_dir.path(), "run-1", &january_2021()).unwrap();

        assert!(dirs.data.is_dir());
        assert!(dirs.metadata.is_dir());
        assert!(dirs.report.is_dir());
        assert_eq!(
            dirs.root,
            temp_dir
                .path()
                .join("output_data")
                .join("run-1_January-01-2021_to_January-31-2021")
        );
        assert_eq!(dirs.name(), "run-1_January-01-2021_to_January-31-2021");
    }

    #[test]
    fn test_provision_rejects_empty_root() {
        let result = RunDirectories::provision_with_id(Path::new(""), "run-1", &january_2021());
        assert!(matches!(result, Err(ScraperError::Configuration { .. })));
    }

    #[test]
    fn test_remove_deletes_tree() {
        let temp_dir = TempDir::new().unwrap();
        let dirs = RunDirectories::provision(temp_dir.path(), &january_2021()).unwrap();
        std::fs::write(dirs.data.join("midas.csv"), "site_id\n").unwrap();

        dirs.remove().unwrap();
        assert!(!dirs.root.exists());
        assert!(temp_dir.path().join("output_data").exists());
    }
}
