//! Fetch-transform-append worker pool
//!
//! Downloads every report of one category with a fixed number of
//! concurrent workers. Each worker fetches a report, enriches its rows with
//! the site's metadata and hands the batch to a single writer thread that
//! owns the append side of the CSV sink. Failures are confined to the
//! request that caused them; the phase always runs to completion.

use super::client::{FetchedResponse, WebTrisClient};
use super::progress::ProgressCounter;
use super::sink::CsvSink;
use crate::constants::REPORT_ROW_FIELDS;
use crate::error::{Result, ScraperError};
use crate::models::{Category, DownloadSummary, ReadingRow, SiteMetadata, SiteRequest};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, error, info, warn};

/// Report payload returned by the daily reports endpoint
#[derive(Debug, Deserialize)]
struct ReportPayload {
    #[serde(rename = "Rows")]
    rows: Vec<Map<String, Value>>,
}

/// Turn a report body into enriched rows, preserving the API's row order
pub fn transform_report(
    url: &str,
    body: &[u8],
    metadata: &Arc<SiteMetadata>,
) -> Result<Vec<ReadingRow>> {
    let payload: ReportPayload = serde_json::from_slice(body)
        .map_err(|e| ScraperError::malformed_payload(url, e.to_string()))?;

    Ok(payload
        .rows
        .into_iter()
        .map(|row| ReadingRow {
            readings: REPORT_ROW_FIELDS
                .iter()
                .map(|field| field_to_string(row.get(*field)))
                .collect(),
            metadata: Arc::clone(metadata),
        })
        .collect())
}

fn field_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// What happened to a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestOutcome {
    Appended { rows: usize, status: u16 },
    Malformed { status: u16 },
    TransportFailed,
}

#[derive(Debug, Default)]
struct PhaseTally {
    completed: usize,
    non_success: usize,
    server_errors: usize,
    malformed: usize,
    transport_failures: usize,
}

impl PhaseTally {
    fn add(mut self, outcome: RequestOutcome) -> Self {
        self.completed += 1;
        let status = match outcome {
            RequestOutcome::Appended { status, .. } => Some(status),
            RequestOutcome::Malformed { status } => {
                self.malformed += 1;
                Some(status)
            }
            RequestOutcome::TransportFailed => {
                self.transport_failures += 1;
                None
            }
        };
        if let Some(status) = status {
            if !(200..300).contains(&status) {
                self.non_success += 1;
            }
            if (500..600).contains(&status) {
                self.server_errors += 1;
            }
        }
        self
    }
}

/// State shared by all workers of one phase
struct PhaseContext {
    client: WebTrisClient,
    counter: ProgressCounter,
    rows_tx: mpsc::Sender<Vec<ReadingRow>>,
    cooldown: Duration,
    progress_bar: ProgressBar,
}

impl PhaseContext {
    async fn process(self: Arc<Self>, request: SiteRequest) -> RequestOutcome {
        let site_id = request.metadata.site_id;
        let started = Instant::now();

        let response = match self.client.get(&request.url).await {
            Ok(response) => response,
            Err(e) => {
                error!(site_id, "Request failed: {}", e);
                self.record_progress(started.elapsed(), &request.url);
                return RequestOutcome::TransportFailed;
            }
        };

        let outcome = self.append_response(&request, &response).await;

        if !response.is_success() {
            error!(
                site_id,
                "request failed, error code {} [{}]", response.status, response.url
            );
        }

        self.record_progress(response.elapsed, &response.url);

        if response.is_server_error() {
            // Upstream is struggling; this worker backs off, the others carry on
            debug!(site_id, "Cooling down for {:?} after {}", self.cooldown, response.status);
            tokio::time::sleep(self.cooldown).await;
        }

        outcome
    }

    async fn append_response(
        &self,
        request: &SiteRequest,
        response: &FetchedResponse,
    ) -> RequestOutcome {
        let status = response.status.as_u16();
        match transform_report(&request.url, &response.body, &request.metadata) {
            Ok(rows) => {
                let count = rows.len();
                if count > 0 && self.rows_tx.send(rows).await.is_err() {
                    error!(
                        site_id = request.metadata.site_id,
                        "CSV writer stopped; dropping {} rows", count
                    );
                }
                RequestOutcome::Appended { rows: count, status }
            }
            Err(e) => {
                warn!(site_id = request.metadata.site_id, "{}", e);
                RequestOutcome::Malformed { status }
            }
        }
    }

    fn record_progress(&self, latency: Duration, url: &str) {
        self.progress_bar.inc(1);
        if let Some(mark) = self.counter.record() {
            info!(
                "Processed {} URLs. Remaining: {}. Last request was completed in {:.3} seconds. [{}]",
                mark.processed,
                mark.remaining,
                latency.as_secs_f64(),
                url
            );
        }
    }
}

/// Bounded worker pool for one category at a time
#[derive(Debug, Clone)]
pub struct Downloader {
    client: WebTrisClient,
    pool_size: usize,
    cooldown: Duration,
    show_progress: bool,
}

impl Downloader {
    pub fn new(client: WebTrisClient, pool_size: usize, cooldown: Duration) -> Self {
        Self {
            client,
            pool_size: pool_size.max(1),
            cooldown,
            show_progress: false,
        }
    }

    pub fn with_progress_bar(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Download all `requests` of `category` into `sink`.
    ///
    /// With `test_run` only the second request is processed. Returns once
    /// every dispatched request has finished and its rows are on disk.
    pub async fn download(
        &self,
        category: Category,
        requests: Vec<SiteRequest>,
        sink: Arc<CsvSink>,
        test_run: bool,
    ) -> Result<DownloadSummary> {
        let category = category.ensure_downloadable()?;
        let started = Instant::now();
        let requests_total = requests.len();

        let selected: Vec<SiteRequest> = if test_run {
            requests.into_iter().skip(1).take(1).collect()
        } else {
            requests
        };
        let dispatched = selected.len();

        info!("Downloading {} URLs.", category);
        if test_run {
            info!(
                "Test run: processing {} of {} {} requests",
                dispatched, requests_total, category
            );
        }

        let (rows_tx, mut rows_rx) = mpsc::channel::<Vec<ReadingRow>>(self.pool_size * 2);
        let writer_sink = Arc::clone(&sink);
        let writer = task::spawn_blocking(move || {
            let mut write_failures = 0usize;
            while let Some(batch) = rows_rx.blocking_recv() {
                if let Err(e) = writer_sink.append(&batch) {
                    write_failures += 1;
                    error!("Failed to append {} rows: {}", batch.len(), e);
                }
            }
            write_failures
        });

        let context = Arc::new(PhaseContext {
            client: self.client.clone(),
            counter: ProgressCounter::new(dispatched),
            rows_tx,
            cooldown: self.cooldown,
            progress_bar: self.progress_bar(category, dispatched),
        });
        debug!(
            "Logging {} progress every {} URLs",
            category,
            context.counter.interval()
        );

        let tally = stream::iter(selected)
            .map(|request| tokio::spawn(Arc::clone(&context).process(request)))
            .buffer_unordered(self.pool_size)
            .fold(PhaseTally::default(), |tally, joined| async move {
                match joined {
                    Ok(outcome) => tally.add(outcome),
                    Err(e) => {
                        error!("Worker task failed: {}", e);
                        tally.add(RequestOutcome::TransportFailed)
                    }
                }
            })
            .await;

        context.progress_bar.finish_and_clear();
        if context.counter.completed() != context.counter.total() {
            warn!(
                "{} progress counted {} of {} dispatched requests",
                category,
                context.counter.completed(),
                context.counter.total()
            );
        }
        // Last sender goes away with the context, which lets the writer drain and exit
        drop(context);

        let write_failures = writer
            .await
            .map_err(|e| ScraperError::Io(std::io::Error::other(e.to_string())))?;
        if write_failures > 0 {
            warn!("{} row batches could not be written for {}", write_failures, category);
        }

        let summary = DownloadSummary {
            category,
            output_path: sink.path().to_path_buf(),
            requests_total,
            requests_dispatched: dispatched,
            completed: tally.completed,
            non_success_responses: tally.non_success,
            server_errors: tally.server_errors,
            malformed_payloads: tally.malformed,
            transport_failures: tally.transport_failures,
            rows_written: sink.rows_written(),
            elapsed: started.elapsed(),
        };

        info!(
            "Finish Downloading {} URLs: {} rows from {} requests ({} failed)",
            category,
            summary.rows_written,
            summary.completed,
            summary.failed_requests()
        );

        Ok(summary)
    }

    fn progress_bar(&self, category: Category, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("Downloading {}", category));
        pb
    }
}
