//! Per-run log file
//!
//! A `tracing_subscriber` fmt layer whose writer can be pointed at a file
//! while a run is in progress. The pipeline attaches it to
//! `metadata/road_data_pipeline.log` once the run directory exists and
//! detaches it before upload, so the mirrored run carries its own log.
//! Events emitted while nothing is attached are discarded.

use crate::error::{Result, ScraperError};

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Default)]
struct Target {
    path: Option<PathBuf>,
    file: Option<File>,
}

/// Shared handle to the current run's log file
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    target: Arc<Mutex<Target>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain-text fmt layer writing into whatever file is attached
    pub fn layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_level(true)
            .with_timer(fmt::time::uptime())
            .with_writer(self.clone())
            .boxed()
    }

    /// Start writing to `path`, truncating it; returns a guard that detaches on drop
    pub fn attach(&self, path: &Path) -> Result<RunLogGuard> {
        let file = File::create(path).map_err(|e| ScraperError::RunDirectory {
            path: path.to_path_buf(),
            reason: format!("cannot create run log: {}", e),
        })?;

        let mut target = self.lock();
        target.path = Some(path.to_path_buf());
        target.file = Some(file);

        Ok(RunLogGuard { log: self.clone() })
    }

    /// Flush and close the attached file, if any
    pub fn detach(&self) {
        let mut target = self.lock();
        if let Some(mut file) = target.file.take() {
            let _ = file.flush();
        }
        target.path = None;
    }

    /// Path currently being written to
    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Target> {
        self.target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Detaches the run log when dropped, so early returns never leave it open
#[must_use = "the run log detaches as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RunLogGuard {
    log: RunLog,
}

impl RunLogGuard {
    pub fn finish(self) {}
}

impl Drop for RunLogGuard {
    fn drop(&mut self) {
        self.log.detach();
    }
}

/// One formatted event's worth of output
pub struct RunLogWriter {
    target: Arc<Mutex<Target>>,
}

impl Write for RunLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut target = self
            .target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(file) = target.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut target = self
            .target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match target.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RunLog {
    type Writer = RunLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogWriter {
            target: Arc::clone(&self.target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_events_only_land_while_attached() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.log");
        let run_log = RunLog::new();
        let subscriber = tracing_subscriber::registry().with(run_log.layer());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("before attach");
            let guard = run_log.attach(&path).unwrap();
            assert_eq!(run_log.path(), Some(path.clone()));
            tracing::info!("while attached");
            guard.finish();
            tracing::info!("after detach");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("while attached"));
        assert!(contents.contains("INFO"));
        assert!(!contents.contains("before attach"));
        assert!(!contents.contains("after detach"));
        assert_eq!(run_log.path(), None);
    }

    #[test]
    fn test_attach_fails_for_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = RunLog::new().attach(&temp_dir.path().join("missing").join("run.log"));
        assert!(matches!(result, Err(ScraperError::RunDirectory { .. })));
    }
}
