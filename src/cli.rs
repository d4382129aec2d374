//! Command-line interface for the chitram harvester.
//!
//! All options can be provided via command-line flags; the base URL can also
//! come from the environment, which is mainly how tests and staging point
//! the harvester at a mock site.

use clap::Parser;
use std::io;
use tokio::fs;

/// The built-in roster of cities to harvest when none are given.
pub const DEFAULT_CITIES: &[&str] = &[
    "mumbai",
    "delhi",
    "bengaluru",
    "hyderabad",
    "chennai",
    "kolkata",
    "pune",
    "ahmedabad",
    "jaipur",
    "lucknow",
    "chandigarh",
    "kochi",
    "bhopal",
    "indore",
    "nagpur",
    "coimbatore",
    "guwahati",
    "bhubaneswar",
    "patna",
    "surat",
    "vadodara",
    "dehradun",
    "visakhapatnam",
    "thiruvananthapuram",
];

/// Command-line arguments for the chitram harvester.
///
/// # Examples
///
/// ```sh
/// # One harvesting pass over the default cities, then exit
/// chitram --once
///
/// # Recurring harvest of two cities every 30 minutes
/// chitram --cities mumbai,pune --interval-secs 1800
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory for persisted per-city listings documents
    #[arg(short = 'd', long, default_value = "data")]
    pub data_dir: String,

    /// Directory for the TTL cache of raw scrape results
    #[arg(short = 'c', long, default_value = "cache")]
    pub cache_dir: String,

    /// Comma-separated cities to harvest (defaults to the built-in roster)
    #[arg(long, value_delimiter = ',')]
    pub cities: Vec<String>,

    /// File with one city per line; takes precedence over --cities
    #[arg(long)]
    pub cities_file: Option<String>,

    /// Base URL for now-playing pages; the city slug is appended
    #[arg(long, env = "CHITRAM_BASE_URL", default_value = "https://paytm.com/movies")]
    pub base_url: String,

    /// Seconds between scheduler ticks
    #[arg(long, default_value_t = 3600)]
    pub interval_secs: u64,

    /// Run a single harvesting pass and exit
    #[arg(long)]
    pub once: bool,

    /// Maximum cities harvested concurrently
    #[arg(long, default_value_t = 4)]
    pub fan_out: usize,

    /// Minimum milliseconds between outbound requests
    #[arg(long, default_value_t = 1000)]
    pub request_gap_ms: u64,

    /// HTTP attempts per fetch before giving up
    #[arg(long, default_value_t = crate::fetch::DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,
}

impl Cli {
    /// Resolve the city roster: file, then flag, then the built-in default.
    pub async fn resolve_cities(&self) -> Result<Vec<String>, io::Error> {
        if let Some(path) = &self.cities_file {
            let contents = fs::read_to_string(path).await?;
            let cities: Vec<String> = contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect();
            return Ok(cities);
        }
        if !self.cities.is_empty() {
            return Ok(self.cities.clone());
        }
        Ok(DEFAULT_CITIES.iter().map(|c| c.to_string()).collect())
    }
}
