//! Sensor catalog resolution
//!
//! Fetches the WebTRIS site directory once per run and normalises each
//! record: the sensor type, carriageway direction and OS grid reference are
//! all parsed out of the free-text `Name` field, which looks like
//! `"MIDAS site at A1M/2259B priority 1 on link 199034501; GPS Ref: 514029;294356; Southbound"`.

use super::client::WebTrisClient;
use crate::error::{Result, ScraperError};
use crate::models::{Category, Direction, SiteKind, SiteRecord, SiteStatus};

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static GRID_REFERENCE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(\d+);(\d+)").expect("grid reference pattern is valid")
});

/// Separator before the trailing direction segment of a site name
const DIRECTION_SEPARATOR: &str = "; ";

/// Classify the sensor type of a site name.
///
/// Case-sensitive substring match in priority order MIDAS, TMU, TAME,
/// "Legacy Site"; anything else passes through unchanged.
pub fn classify_site(name: &str) -> SiteKind {
    if name.contains("MIDAS") {
        SiteKind::Midas
    } else if name.contains("TMU") {
        SiteKind::Tmu
    } else if name.contains("TAME") {
        SiteKind::Tame
    } else if name.contains("Legacy Site") {
        SiteKind::LegacySite
    } else {
        SiteKind::Passthrough(name.to_string())
    }
}

/// Canonical direction taken from the segment after the last `"; "`
pub fn extract_direction(name: &str) -> Direction {
    let segment = name
        .rsplit_once(DIRECTION_SEPARATOR)
        .map(|(_, tail)| tail)
        .unwrap_or(name);
    Direction::canonicalize(segment)
}

/// First `"<digits>;<digits>"` pair in the name, as (easting, northing)
pub fn extract_grid_reference(name: &str) -> Option<(String, String)> {
    GRID_REFERENCE
        .captures(name)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}

/// Site directory as returned by `GET /sites`
#[derive(Debug, Deserialize)]
struct SiteDirectory {
    #[serde(alias = "Sites")]
    sites: Vec<RawSite>,
}

#[derive(Debug, Deserialize)]
struct RawSite {
    #[serde(rename = "Id", alias = "id")]
    id: Scalar,
    #[serde(rename = "Name", alias = "name", default)]
    name: Option<String>,
    #[serde(rename = "Description", alias = "description", default)]
    description: Option<String>,
    #[serde(rename = "Longitude", alias = "longitude", default)]
    longitude: Option<Scalar>,
    #[serde(rename = "Latitude", alias = "latitude", default)]
    latitude: Option<Scalar>,
    #[serde(rename = "Status", alias = "status", default)]
    status: Option<String>,
}

/// The directory serves some numeric fields as strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Integer(u64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_id(&self) -> Option<u64> {
        match self {
            Scalar::Integer(value) => Some(*value),
            Scalar::Float(value) if value.fract() == 0.0 && *value >= 0.0 => Some(*value as u64),
            Scalar::Float(_) => None,
            Scalar::Text(text) => text.trim().parse().ok(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            Scalar::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl RawSite {
    fn normalise(self) -> std::result::Result<SiteRecord, String> {
        let id = self
            .id
            .as_id()
            .ok_or_else(|| format!("site id {:?} is not an integer", self.id))?;
        let name = self.name.unwrap_or_default();
        let kind = classify_site(&name);
        let (easting, northing) = match extract_grid_reference(&name) {
            Some((easting, northing)) => (Some(easting), Some(northing)),
            None => (None, None),
        };

        Ok(SiteRecord {
            id,
            category: kind.category(),
            direction: extract_direction(&name),
            kind,
            description: self.description.unwrap_or_default(),
            longitude: self.longitude.as_ref().and_then(Scalar::as_f64),
            latitude: self.latitude.as_ref().and_then(Scalar::as_f64),
            status: SiteStatus::from_api(self.status.as_deref().unwrap_or_default()),
            easting,
            northing,
            name,
        })
    }
}

/// Classified snapshot of the site directory
#[derive(Debug, Clone, Default)]
pub struct SiteCatalog {
    categorized: BTreeMap<Category, Vec<SiteRecord>>,
    all: Vec<SiteRecord>,
}

impl SiteCatalog {
    /// Stable partition of `sites` into the four category buckets
    pub fn from_sites(sites: Vec<SiteRecord>) -> Self {
        let mut categorized: BTreeMap<Category, Vec<SiteRecord>> =
            Category::ALL.iter().map(|c| (*c, Vec::new())).collect();

        for site in &sites {
            categorized
                .entry(site.category)
                .or_default()
                .push(site.clone());
        }

        Self {
            categorized,
            all: sites,
        }
    }

    pub fn sites(&self, category: Category) -> &[SiteRecord] {
        self.categorized
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn categorized(&self) -> &BTreeMap<Category, Vec<SiteRecord>> {
        &self.categorized
    }

    pub fn all(&self) -> &[SiteRecord] {
        &self.all
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Parse a raw directory payload into a catalog
pub fn parse_directory(url: &str, body: &[u8]) -> Result<SiteCatalog> {
    let directory: SiteDirectory = serde_json::from_slice(body).map_err(|e| {
        ScraperError::upstream_unavailable(url, format!("unexpected directory payload: {}", e))
    })?;

    let mut seen = HashSet::with_capacity(directory.sites.len());
    let mut sites = Vec::with_capacity(directory.sites.len());
    for raw in directory.sites {
        let site = raw
            .normalise()
            .map_err(|reason| ScraperError::upstream_unavailable(url, reason))?;
        if !seen.insert(site.id) {
            warn!("Duplicate site id {} in directory; keeping first entry", site.id);
            continue;
        }
        sites.push(site);
    }

    Ok(SiteCatalog::from_sites(sites))
}

/// Resolves the site directory into classified site records
#[derive(Debug, Clone)]
pub struct CatalogResolver {
    client: WebTrisClient,
}

impl CatalogResolver {
    pub fn new(client: WebTrisClient) -> Self {
        Self { client }
    }

    /// Fetch and classify the full site directory
    pub async fn resolve(&self) -> Result<SiteCatalog> {
        let url = self.client.sites_url();
        info!("Getting road sensor lookup table from {}", url);

        let response = self
            .client
            .get(&url)
            .await
            .map_err(|e| ScraperError::upstream_unavailable(&url, e.to_string()))?;

        if !response.is_success() {
            warn!("Site directory returned status {} [{}]", response.status, url);
        }

        let catalog = parse_directory(&url, &response.body).map_err(|e| match e {
            ScraperError::UpstreamUnavailable { url, reason } if !response.is_success() => {
                ScraperError::upstream_unavailable(
                    url,
                    format!("status {}: {}", response.status, reason),
                )
            }
            other => other,
        })?;

        for (category, sites) in catalog.categorized() {
            debug!("{}: {} sites", category, sites.len());
        }
        info!("Processed road sensor lookup table: {} sites", catalog.len());

        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY: &str = r#"{
        "row_count": 5,
        "sites": [
            {"Id": "2", "Name": "MIDAS site at A1M/2259B priority 1 on link 199034501; GPS Ref: 514029;294356; Southbound", "Description": "A1M/2259B", "Longitude": -0.320275, "Latitude": 52.535158, "Status": "Active"},
            {"Id": "6304", "Name": "TAME site at 30360220; GPS Ref: 473059;121266; Southbound", "Description": "30360220", "Longitude": -0.960508, "Latitude": 50.986164, "Status": "Active"},
            {"Id": 7236, "Name": "TMU Site 5607/1 on link A3 northbound; GPS Ref: 446387;133654; Northbound", "Description": "5607/1", "Longitude": "-1.338882", "Latitude": "51.100315", "Status": "Inactive"},
            {"Id": "9", "Name": "Legacy Site at M4 J12", "Description": "legacy", "Longitude": null, "Latitude": null, "Status": "Inactive"},
            {"Id": "1", "Name": "MIDAS site at M4/2295A2 priority 1 on link 105009001; GPS Ref: 502816;178156; Westbound", "Description": "M4/2295A2", "Longitude": -0.520380, "Latitude": 51.493012, "Status": "Inactive"}
        ]
    }"#;

    #[test]
    fn test_classify_site_priority() {
        assert_eq!(classify_site("MIDAS site at M4"), SiteKind::Midas);
        assert_eq!(classify_site("TMU Site 5607/1"), SiteKind::Tmu);
        assert_eq!(classify_site("TAME site at 30360220"), SiteKind::Tame);
        assert_eq!(classify_site("Legacy Site at M25"), SiteKind::LegacySite);
        // MIDAS outranks TMU when both appear
        assert_eq!(classify_site("TMU replaced by MIDAS"), SiteKind::Midas);
    }

    #[test]
    fn test_classify_site_is_case_sensitive() {
        assert_eq!(
            classify_site("midas lower case"),
            SiteKind::Passthrough("midas lower case".to_string())
        );
        assert_eq!(
            classify_site("legacy site"),
            SiteKind::Passthrough("legacy site".to_string())
        );
    }

    #[test]
    fn test_classify_site_markers_anywhere() {
        for (prefix, suffix) in [("", ""), ("xx ", " yy"), ("12;34 ", "; Northbound")] {
            for (marker, expected) in [
                ("MIDAS", SiteKind::Midas),
                ("TMU", SiteKind::Tmu),
                ("TAME", SiteKind::Tame),
                ("Legacy Site", SiteKind::LegacySite),
            ] {
                let name = format!("{}{}{}", prefix, marker, suffix);
                assert_eq!(classify_site(&name), expected, "name: {:?}", name);
            }
        }
    }

    #[test]
    fn test_extract_direction_uses_last_segment() {
        assert_eq!(
            extract_direction("MIDAS site; GPS Ref: 514029;294356; Southbound"),
            Direction::Southbound
        );
        assert_eq!(
            extract_direction("TMU; GPS Ref: 1;2; Anti-Clockwise"),
            Direction::Clockwise
        );
        assert_eq!(
            extract_direction("Legacy Site at M4 J12"),
            Direction::LegacySite
        );
        assert_eq!(
            extract_direction("TAME; GPS Ref: 1;2; Exit Slip"),
            Direction::Raw("exit slip".to_string())
        );
    }

    #[test]
    fn test_extract_grid_reference() {
        assert_eq!(
            extract_grid_reference("MIDAS; GPS Ref: 514029;294356; Southbound"),
            Some(("514029".to_string(), "294356".to_string()))
        );
        assert_eq!(extract_grid_reference("Legacy Site at M4 J12"), None);
        assert_eq!(extract_grid_reference("only 514029; 294356"), None);
    }

    #[test]
    fn test_parse_directory_scenario_site() {
        let catalog = parse_directory("http://test/sites", DIRECTORY.as_bytes()).unwrap();
        let midas = catalog.sites(Category::Midas);
        let site = midas.iter().find(|s| s.id == 2).unwrap();

        assert_eq!(site.category, Category::Midas);
        assert_eq!(site.kind, SiteKind::Midas);
        assert_eq!(site.direction, Direction::Southbound);
        assert_eq!(site.easting.as_deref(), Some("514029"));
        assert_eq!(site.northing.as_deref(), Some("294356"));
        assert_eq!(site.status, SiteStatus::Active);
        assert_eq!(site.description, "A1M/2259B");
        assert_eq!(site.longitude, Some(-0.320275));
    }

    #[test]
    fn test_parse_directory_partitions_stably() {
        let catalog = parse_directory("http://test/sites", DIRECTORY.as_bytes()).unwrap();

        assert_eq!(catalog.len(), 5);
        let midas_ids: Vec<u64> = catalog.sites(Category::Midas).iter().map(|s| s.id).collect();
        assert_eq!(midas_ids, vec![2, 1]);
        assert_eq!(catalog.sites(Category::Tame)[0].id, 6304);
        assert_eq!(catalog.sites(Category::Tmu)[0].id, 7236);

        let other = catalog.sites(Category::Other);
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].kind, SiteKind::LegacySite);
        assert_eq!(other[0].easting, None);
        assert_eq!(other[0].longitude, None);

        let all_ids: Vec<u64> = catalog.all().iter().map(|s| s.id).collect();
        assert_eq!(all_ids, vec![2, 6304, 7236, 9, 1]);
    }

    #[test]
    fn test_parse_directory_coerces_string_coordinates() {
        let catalog = parse_directory("http://test/sites", DIRECTORY.as_bytes()).unwrap();
        let tmu = &catalog.sites(Category::Tmu)[0];
        assert_eq!(tmu.longitude, Some(-1.338882));
        assert_eq!(tmu.status, SiteStatus::Inactive);
    }

    #[test]
    fn test_parse_directory_rejects_unexpected_shape() {
        let result = parse_directory("http://test/sites", br#"{"Rows": []}"#);
        assert!(matches!(
            result,
            Err(ScraperError::UpstreamUnavailable { .. })
        ));

        let result = parse_directory("http://test/sites", b"<html>down</html>");
        assert!(matches!(
            result,
            Err(ScraperError::UpstreamUnavailable { .. })
        ));
    }

    #[test]
    fn test_parse_directory_rejects_non_integer_id() {
        let body = br#"{"sites": [{"Id": "abc", "Name": "MIDAS", "Status": "Active"}]}"#;
        assert!(matches!(
            parse_directory("http://test/sites", body),
            Err(ScraperError::UpstreamUnavailable { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let body = br#"{"sites": [
            {"Id": "5", "Name": "MIDAS first", "Status": "Active"},
            {"Id": 5, "Name": "TMU second", "Status": "Active"}
        ]}"#;
        let catalog = parse_directory("http://test/sites", body).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.all()[0].kind, SiteKind::Midas);
        assert!(catalog.sites(Category::Tmu).is_empty());
    }
}
