//! Data models for city movie listings.
//!
//! This module defines the records persisted and exchanged by the harvesting
//! pipeline:
//! - [`Movie`]: one now-playing movie within a city's listings
//! - [`CityListings`]: everything known about one city, active and historical
//! - [`CachedListings`]: the raw scrape payload held by the TTL cache
//!
//! `Movie` serializes with camelCase field names (`isActive`, `lastUpdated`)
//! to match the wire shape consumed by downstream readers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single movie as scraped from a city's now-playing page.
///
/// Identity is `name`, scoped to one city: within a persisted
/// [`CityListings`] no two movies share a name. `is_active` records whether
/// the movie appeared in the most recent successful scrape for its city;
/// movies that drop off the page are kept with `is_active = false` rather
/// than deleted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    /// Movie title; the identity key within one city.
    pub name: String,
    /// Poster image URL.
    pub poster: String,
    /// Aggregate rating, when the listing carries one.
    pub rating: Option<f64>,
    /// Languages the movie is showing in, in listing order.
    pub languages: Vec<String>,
    /// Whether the movie was present in the latest successful scrape.
    pub is_active: bool,
    /// When this record was last touched by a scrape cycle.
    pub last_updated: DateTime<Utc>,
}

/// The persisted listings document for one city.
///
/// Created on the first successful scrape of a city, rewritten in full on
/// every subsequent one. The `movies` set only grows: entries toggle between
/// active and inactive but are never removed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CityListings {
    /// The lower-cased city slug this document belongs to.
    pub city: String,
    /// All movies ever seen for this city, active and inactive.
    pub movies: Vec<Movie>,
    /// When this document was last reconciled.
    pub timestamp: DateTime<Utc>,
}

impl CityListings {
    /// Count of movies currently showing.
    pub fn active_count(&self) -> usize {
        self.movies.iter().filter(|m| m.is_active).count()
    }
}

/// One TTL cache record: the raw batch from a scrape plus its fetch time.
///
/// The fetch time decides freshness; the batch is otherwise opaque to the
/// cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CachedListings {
    /// When the batch was fetched (RFC 3339 on disk).
    pub timestamp: DateTime<Utc>,
    /// The movies scraped in that cycle.
    pub movies: Vec<Movie>,
}
