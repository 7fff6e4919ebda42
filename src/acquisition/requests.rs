//! Report URL and metadata generation
//!
//! Pairs every site of a downloadable category with the daily report URL
//! covering the run's date range.

use super::catalog::SiteCatalog;
use crate::constants::REPORT_PAGE_SIZE;
use crate::error::Result;
use crate::models::{Category, DateRange, SiteMetadata, SiteRecord, SiteRequest};

use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds report requests against a fixed API base URL
#[derive(Debug, Clone)]
pub struct RequestGenerator {
    base_url: String,
}

impl RequestGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Daily report URL for one site
    pub fn report_url(&self, site_id: u64, range: &DateRange) -> String {
        let (start, end) = range.api_dates();
        format!(
            "{}/reports/{}/to/{}/daily?sites={}&page=1&page_size={}",
            self.base_url, start, end, site_id, REPORT_PAGE_SIZE
        )
    }

    /// One request per site, in the given order
    pub fn requests_for(
        &self,
        category: Category,
        sites: &[SiteRecord],
        range: &DateRange,
    ) -> Result<Vec<SiteRequest>> {
        category.ensure_downloadable()?;

        Ok(sites
            .iter()
            .map(|site| SiteRequest {
                url: self.report_url(site.id, range),
                metadata: Arc::new(SiteMetadata::from(site)),
            })
            .collect())
    }

    /// Requests for each downloadable category of the catalog
    pub fn generate(
        &self,
        catalog: &SiteCatalog,
        range: &DateRange,
    ) -> Result<BTreeMap<Category, Vec<SiteRequest>>> {
        Category::DOWNLOADABLE
            .iter()
            .map(|category| {
                let requests = self.requests_for(*category, catalog.sites(*category), range)?;
                Ok((*category, requests))
            })
            .collect()
    }
}
