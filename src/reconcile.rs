//! Merging a fresh scrape against previously persisted listings.
//!
//! This is the heart of the harvester. A fresh batch for a city is combined
//! with the prior persisted group so that:
//!
//! - every movie in the batch lands in the result as-is (active),
//! - every previously known movie missing from the batch is retained,
//!   flagged inactive and re-stamped,
//! - nothing is ever deleted: a name that ever appeared in a successful
//!   batch stays in the document forever, toggling active/inactive,
//! - an empty batch produces no result at all, so a listings page that
//!   transiently renders nothing cannot wipe known-good state.
//!
//! The merge is a pure function of its inputs and does no I/O, which keeps
//! the whole contract unit-testable without a store or a network.

use crate::models::{CityListings, Movie};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Merge `batch` with the prior persisted group for `city`.
///
/// Returns `None` when the batch is empty; the caller must then skip the
/// store write entirely for this cycle. Names colliding within one batch
/// resolve last-in-scan-order-wins; this mirrors the upstream page's
/// behavior and is deliberately left uncorrected.
pub fn reconcile(
    city: &str,
    batch: Vec<Movie>,
    prior: Option<&CityListings>,
    now: DateTime<Utc>,
) -> Option<CityListings> {
    if batch.is_empty() {
        return None;
    }

    // Dedup the batch by name. Later occurrences replace earlier ones in
    // place, so batch order is otherwise preserved.
    let mut movies: Vec<Movie> = Vec::with_capacity(batch.len());
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(batch.len());
    for movie in batch {
        match seen.get(&movie.name) {
            Some(&i) => movies[i] = movie,
            None => {
                seen.insert(movie.name.clone(), movies.len());
                movies.push(movie);
            }
        }
    }

    // Whatever was known before but absent now is kept, marked inactive.
    if let Some(prior) = prior {
        for known in &prior.movies {
            if !seen.contains_key(&known.name) {
                let mut retained = known.clone();
                retained.is_active = false;
                retained.last_updated = now;
                movies.push(retained);
            }
        }
    }

    Some(CityListings {
        city: city.to_string(),
        movies,
        timestamp: now,
    })
}
