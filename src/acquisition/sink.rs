//! CSV output for downloaded readings
//!
//! Each downloadable category gets one file. The header is written once
//! when the sink is opened; afterwards any number of producers may append
//! row batches. A batch is written under a single lock, so rows from two
//! batches never interleave.

use crate::constants::{LOOKUP_HEADER, TEST_RUN_SUFFIX};
use crate::error::Result;
use crate::models::{Category, DateRange, ReadingRow, SiteRecord};

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// `<category>_<start>-<end>[_TEST_RUN].csv`
pub fn output_file_name(category: Category, range: &DateRange, test_run: bool) -> String {
    format!(
        "{}_{}-{}{}.csv",
        category,
        range.start,
        range.end,
        if test_run { TEST_RUN_SUFFIX } else { "" }
    )
}

/// Thread-safe append-only CSV file
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
    rows_written: AtomicUsize,
}

impl CsvSink {
    /// Create or truncate `path` and write `header` as its first row
    pub fn open(path: impl AsRef<Path>, header: &[&str]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = csv::WriterBuilder::new()
            .flexible(false)
            .from_writer(File::create(&path)?);
        writer.write_record(header)?;
        writer.flush()?;

        debug!("Opened CSV sink at {}", path.display());

        Ok(Self {
            path,
            writer: Mutex::new(writer),
            rows_written: AtomicUsize::new(0),
        })
    }

    /// Append a batch of rows contiguously; returns the number written
    pub fn append(&self, rows: &[ReadingRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for row in rows {
            writer.write_record(row.to_record())?;
        }
        writer.flush()?;

        self.rows_written.fetch_add(rows.len(), Ordering::AcqRel);
        Ok(rows.len())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Dump the classified site table to `path`
pub fn write_site_lookup(path: &Path, sites: &[SiteRecord]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(LOOKUP_HEADER)?;
    for site in sites {
        writer.write_record(site.to_lookup_record())?;
    }
    writer.flush()?;
    Ok(sites.len())
}
