//! Site-specific extractors turning fetched pages into movie batches.
//!
//! Each extractor owns the markup knowledge for one listings site and
//! nothing else: raw HTML in, normalized [`Movie`] batch out. The pipeline
//! treats extractors through the [`Extractor`] trait so the harvesting and
//! reconciliation logic never touches a selector.
//!
//! # Supported sources
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | Paytm Movies | [`paytm`] | JSON-LD blocks inside the now-playing grid |

pub mod paytm;

pub use paytm::PaytmExtractor;

use crate::error::ExtractError;
use crate::models::Movie;
use chrono::{DateTime, Utc};

/// Boundary between the pipeline and site-specific markup parsing.
///
/// Implementations must return every movie with `is_active = true` and
/// `last_updated = now`. An `Ok` empty batch means the page parsed cleanly
/// but listed nothing; the pipeline treats that as "no update", which is
/// different from an `Err` (markup the extractor no longer understands).
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, now: DateTime<Utc>) -> Result<Vec<Movie>, ExtractError>;
}
