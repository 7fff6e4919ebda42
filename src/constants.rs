//! Application constants for the road data scraper
//!
//! Upstream endpoints, request tuning defaults, and the fixed output
//! CSV layout shared by the sink and the report transform.

// =============================================================================
// Upstream API
// =============================================================================

/// Base URL of the Highways England WebTRIS v1 API
pub const DEFAULT_API_BASE_URL: &str = "https://webtris.highwaysengland.co.uk/api/v1";

/// Header attached to every upstream request so the operators can identify us
pub const IDENTIFYING_HEADER_NAME: &str = "message";
pub const IDENTIFYING_HEADER_VALUE: &str = "Parallel request of data for use in ONS. Emerging Platforms Team. @GitHub: dombean/road_data_scraper";

/// Page size requested for each daily report; large enough for a month of 15 minute intervals
pub const REPORT_PAGE_SIZE: u32 = 40_000;

/// Date format expected inside report URLs
pub const API_DATE_FORMAT: &str = "%d%m%Y";

// =============================================================================
// Request Defaults
// =============================================================================

/// Transport-level retries on the shared client
pub const DEFAULT_MAX_TRANSPORT_RETRIES: u32 = 3;

/// Pause a worker takes after a 5xx response
pub const DEFAULT_SERVER_ERROR_COOLDOWN_SECS: u64 = 5;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Number of progress log lines emitted per phase (roughly every 10%)
pub const PROGRESS_LOG_STEPS: usize = 10;

// =============================================================================
// Output Layout
// =============================================================================

pub const OUTPUT_DATA_DIR_NAME: &str = "output_data";
pub const DATA_DIR_NAME: &str = "data";
pub const METADATA_DIR_NAME: &str = "metadata";
pub const REPORT_DIR_NAME: &str = "report";

pub const LOOKUP_FILE_NAME: &str = "road_data_sensor_lookup.csv";
pub const CONFIG_DUMP_FILE_NAME: &str = "config_metadata.toml";
pub const RUN_LOG_FILE_NAME: &str = "road_data_pipeline.log";
pub const STATUS_REPORT_FILE_NAME: &str = "sensor_status_report.csv";
pub const INACTIVE_SITES_FILE_NAME: &str = "inactive_sites.csv";

/// Suffix added to data file names when only the smoke-test slice is downloaded
pub const TEST_RUN_SUFFIX: &str = "_TEST_RUN";

/// Keys of each report row as returned by the API, in output order
pub const REPORT_ROW_FIELDS: &[&str] = &[
    "Site Name",
    "Report Date",
    "Time Period Ending",
    "Time Interval",
    "0 - 520 cm",
    "521 - 660 cm",
    "661 - 1160 cm",
    "1160+ cm",
    "0 - 10 mph",
    "11 - 15 mph",
    "16 - 20 mph",
    "21 - 25 mph",
    "26 - 30 mph",
    "31 - 35 mph",
    "36 - 40 mph",
    "41 - 45 mph",
    "46 - 50 mph",
    "51 - 55 mph",
    "56 - 60 mph",
    "61 - 70 mph",
    "71 - 80 mph",
    "80+ mph",
    "Avg mph",
    "Total Volume",
];

/// Header of every per-category data CSV
pub const CSV_HEADER: &[&str] = &[
    "site_id",
    "site_name",
    "report_date",
    "time_period_end",
    "interval",
    "len_0_520_cm",
    "len_521_660_cm",
    "len_661_1160_cm",
    "len_1160_plus_cm",
    "speed_0_10_mph",
    "speed_11_15_mph",
    "speed_16_20_mph",
    "speed_21_25_mph",
    "speed_26_30_mph",
    "speed_31_35_mph",
    "speed_36_40_mph",
    "speed_41_45_mph",
    "speed_46_50_mph",
    "speed_51_55_mph",
    "speed_56_60_mph",
    "speed_61_70_mph",
    "speed_71_80_mph",
    "speed_80_plus_mph",
    "speed_avg_mph",
    "total_vol",
    "longitude",
    "latitude",
    "sites_status",
    "type",
    "direction",
    "easting",
    "northing",
];

/// Header of the site lookup dump
pub const LOOKUP_HEADER: &[&str] = &[
    "id",
    "name",
    "description",
    "longitude",
    "latitude",
    "status",
    "direction",
    "easting",
    "northing",
    "category",
];
