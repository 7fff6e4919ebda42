//! Error handling for road data acquisition.
//!
//! Fatal errors (`UpstreamUnavailable`, `InvalidCategory`, configuration and
//! filesystem failures) abort a run. Per-request errors (`MalformedPayload`,
//! `Transport`) are logged and counted by the worker pool instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Site directory unavailable at {url}: {reason}")]
    UpstreamUnavailable { url: String, reason: String },

    #[error("Invalid sensor category '{category}': available categories are midas, tmu, tame")]
    InvalidCategory { category: String },

    #[error("Malformed report payload from {url}: {reason}")]
    MalformedPayload { url: String, reason: String },

    #[error("Transport error for {url} after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid date '{value}': {source}")]
    DateParsing {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Failed to provision run directory {path}: {reason}")]
    RunDirectory { path: PathBuf, reason: String },

    #[error("Report generation failed: {reason}")]
    Report { reason: String },

    #[error("Upload of {path} failed: {reason}")]
    Upload { path: PathBuf, reason: String },
}

impl ScraperError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn malformed_payload(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn upstream_unavailable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
