//! Integration tests for the acquisition module
//!
//! Runs the worker pool and the full pipeline against an in-process mock
//! of the WebTRIS API.


use crate::config::ScraperConfig;
use crate::models::{DateRange, Direction, SiteKind, SiteRecord, SiteStatus};
use chrono::NaiveDate;
use std::path::Path;

pub fn january_2021() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2021, 1, 31).unwrap(),
    )
    .unwrap()
}

/// Fast, quiet configuration pointed at a mock API
pub fn test_config(base_url: &str, output: &Path) -> ScraperConfig {
    let range = january_2021();
    ScraperConfig {
        max_transport_retries: 1,
        request_timeout_secs: 10,
        ..ScraperConfig::default()
    }
    .with_api_base_url(base_url)
    .with_output_path(output)
    .with_dates(range.start, range.end)
    .with_workers(4)
    .with_server_error_cooldown_secs(0)
    .without_progress()
}

pub fn midas_site(id: u64) -> SiteRecord {
    SiteRecord {
        id,
        name: format!("MIDAS site {}; GPS Ref: 514029;294356; Southbound", id),
        description: format!("DESC/{}", id),
        kind: SiteKind::Midas,
        category: SiteKind::Midas.category(),
        longitude: Some(-0.320275),
        latitude: Some(52.535158),
        status: SiteStatus::Active,
        direction: Direction::Southbound,
        easting: Some("514029".to_string()),
        northing: Some("294356".to_string()),
    }
}
