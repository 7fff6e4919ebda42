//! Concurrent sensor data acquisition.
//!
//! Orchestrates a complete run: resolve the site catalog, generate report
//! requests, download midas, tmu and tame strictly one after another, then
//! hand the run over to reporting, upload and cleanup.

pub mod catalog;
pub mod client;
pub mod download;
pub mod progress;
pub mod requests;
pub mod sink;

#[cfg(test)]
pub mod tests;

use self::{
    catalog::CatalogResolver,
    client::WebTrisClient,
    download::Downloader,
    requests::RequestGenerator,
    sink::{CsvSink, output_file_name, write_site_lookup},
};

use crate::config::{ScraperConfig, SystemProfile};
use crate::constants::{CONFIG_DUMP_FILE_NAME, CSV_HEADER, LOOKUP_FILE_NAME, RUN_LOG_FILE_NAME};
use crate::error::{Result, ScraperError};
use crate::models::{Category, DateRange, RunSummary};
use crate::report::{DirectoryMirrorUploader, Reporter, StatusReporter, Uploader};
use crate::run_dirs::RunDirectories;
use crate::run_log::RunLog;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// End-to-end acquisition run driven by a validated configuration
pub struct AcquisitionPipeline {
    config: ScraperConfig,
    system_profile: SystemProfile,
    reporter: Box<dyn Reporter>,
    uploader: Option<Box<dyn Uploader>>,
    run_log: Option<RunLog>,
}

impl AcquisitionPipeline {
    /// Validate `config` and wire up the default collaborators
    pub fn new(config: ScraperConfig) -> Result<Self> {
        config.validate()?;

        let uploader = config
            .upload_path
            .clone()
            .map(|path| Box::new(DirectoryMirrorUploader::new(path)) as Box<dyn Uploader>);

        Ok(Self {
            config,
            system_profile: SystemProfile::detect(),
            reporter: Box::new(StatusReporter),
            uploader,
            run_log: None,
        })
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_uploader(mut self, uploader: Box<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Capture this pipeline's log events into each run's metadata directory
    pub fn with_run_log(mut self, run_log: RunLog) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn with_system_profile(mut self, profile: SystemProfile) -> Self {
        self.system_profile = profile;
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Run with the configured or default date range
    pub async fn run(&self) -> Result<RunSummary> {
        let range = self.config.resolved_date_range()?;
        self.run_for(range).await
    }

    /// Run for an explicit date range
    pub async fn run_for(&self, range: DateRange) -> Result<RunSummary> {
        let started = Instant::now();
        info!("Starting road data acquisition for {}", range);

        let dirs = RunDirectories::provision(&self.config.output_path, &range)?;
        let log_guard = self
            .run_log
            .as_ref()
            .map(|log| log.attach(&dirs.metadata.join(RUN_LOG_FILE_NAME)))
            .transpose()?;

        let pool_size = self.config.worker_count(&self.system_profile);
        let client = WebTrisClient::new(&self.config, pool_size)?;

        let catalog = CatalogResolver::new(client.clone()).resolve().await?;
        write_site_lookup(&dirs.metadata.join(LOOKUP_FILE_NAME), catalog.all())?;

        let mut requests = RequestGenerator::new(client.base_url()).generate(&catalog, &range)?;

        let downloader = Downloader::new(client, pool_size, self.config.server_error_cooldown())
            .with_progress_bar(self.config.show_progress);
        info!("Using {} workers", downloader.pool_size());

        if self.config.test_run {
            info!("Test Run");
        }

        let mut phases = Vec::with_capacity(Category::DOWNLOADABLE.len());
        for category in Category::DOWNLOADABLE {
            let path = dirs
                .data
                .join(output_file_name(category, &range, self.config.test_run));
            let sink = Arc::new(CsvSink::open(&path, CSV_HEADER)?);
            let category_requests = requests.remove(&category).unwrap_or_default();

            let summary = downloader
                .download(category, category_requests, sink, self.config.test_run)
                .await?;
            phases.push(summary);
        }

        let report_written = if self.config.generate_report {
            self.reporter
                .generate(catalog.all(), &range, &dirs.report)
                .map_err(|e| ScraperError::Report {
                    reason: e.to_string(),
                })?;
            true
        } else {
            false
        };

        self.dump_config(&dirs.metadata)?;

        info!(
            "Script Run Time: {:.2} minutes",
            started.elapsed().as_secs_f64() / 60.0
        );
        if let Some(guard) = log_guard {
            guard.finish();
        }

        let uploaded_to = match &self.uploader {
            Some(uploader) => Some(uploader.upload(&dirs.root)?),
            None => None,
        };

        let run_dir_removed = if self.config.rm_dir {
            dirs.remove()?;
            true
        } else {
            false
        };

        Ok(RunSummary {
            run_dir: dirs.root,
            date_range: range,
            sites_total: catalog.len(),
            phases,
            report_written,
            uploaded_to,
            run_dir_removed,
            elapsed: started.elapsed(),
        })
    }

    fn dump_config(&self, metadata_dir: &Path) -> Result<()> {
        let path = metadata_dir.join(CONFIG_DUMP_FILE_NAME);
        info!("Dumping config for run at {}", path.display());
        std::fs::write(path, self.config.to_toml()?)?;
        Ok(())
    }
}
