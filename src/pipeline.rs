//! The per-city harvest pipeline.
//!
//! One run for one city is strictly ordered: cache check → fetch → extract →
//! reconcile → persist. Different cities are independent and can run
//! concurrently; two runs for the *same* city are serialized through a
//! per-key lock, because reconciliation is a read-modify-write over the
//! persisted group.
//!
//! Failure policy per cycle:
//! - fetch or extract failure: the cycle fails, stored state is untouched
//! - empty extraction: not a failure; the cycle is a no-op and the prior
//!   group is served unchanged
//! - store write failure: the cycle fails (the merge result is lost, but the
//!   write is all-or-nothing so nothing is corrupted)
//! - cache write failure: logged and ignored; the scrape still succeeded

use crate::cache::ListingsCache;
use crate::error::PipelineError;
use crate::fetch::Fetcher;
use crate::models::{CityListings, Movie};
use crate::reconcile::reconcile;
use crate::scrapers::Extractor;
use crate::store::ListingsStore;
use crate::utils::truncate_for_log;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Derive the cache/store key for a city. Stable and collision-free as long
/// as callers pass real city names.
pub fn cache_key(city: &str) -> String {
    city.trim().to_lowercase()
}

/// All collaborators for harvesting one city, injected at construction.
pub struct Pipeline<E> {
    fetcher: Fetcher,
    cache: ListingsCache,
    store: ListingsStore,
    extractor: E,
    base_url: Url,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<E> Pipeline<E>
where
    E: Extractor,
{
    pub fn new(
        fetcher: Fetcher,
        cache: ListingsCache,
        store: ListingsStore,
        extractor: E,
        base_url: Url,
    ) -> Self {
        Self {
            fetcher,
            cache,
            store,
            extractor,
            base_url,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn listing_url(&self, key: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(key);
        }
        url
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Harvest one city: serve fresh cached state if any, otherwise fetch,
    /// extract, reconcile against the persisted group, and persist.
    #[instrument(level = "info", skip(self))]
    pub async fn run(&self, city: &str) -> Result<CityListings, PipelineError> {
        let key = cache_key(city);
        let lock = self.lock_for(&key).await;
        let _guard = lock.lock().await;

        if let Some(entry) = self.cache.get(&key).await {
            // Fresh cache: serve the last reconciled state without touching
            // the remote site.
            if let Some(group) = self.store.load_group(&key).await? {
                info!(city = %key, total = group.movies.len(), "serving cached listings");
                return Ok(group);
            }
            // Cached but never persisted (an earlier save failed): fall back
            // to the raw cached batch.
            debug!(city = %key, "cache hit without persisted group");
            return Ok(CityListings {
                city: key,
                movies: entry.movies,
                timestamp: entry.timestamp,
            });
        }

        let now = Utc::now();
        let url = self.listing_url(&key);
        let html = self.fetcher.get(url.as_str()).await?;
        debug!(city = %key, preview = %truncate_for_log(&html, 120), "page fetched");

        let batch = self.extractor.extract(&html, now)?;
        let prior = self.store.load_group(&key).await?;

        let Some(merged) = reconcile(&key, batch, prior.as_ref(), now) else {
            // An empty scrape is "no update", never a wipe.
            warn!(city = %key, "scrape returned no movies; keeping prior state");
            return Ok(prior.unwrap_or(CityListings {
                city: key,
                movies: Vec::new(),
                timestamp: now,
            }));
        };

        // A failed group write is fatal for this cycle; errors propagate.
        self.store.save_group(&merged).await?;

        // The cache holds the fresh batch only, which after reconciliation
        // is exactly the active subset of the merged group.
        let fresh: Vec<Movie> = merged
            .movies
            .iter()
            .filter(|m| m.is_active)
            .cloned()
            .collect();
        if let Err(e) = self.cache.put(&key, &fresh).await {
            warn!(city = %key, error = %e, "cache write failed; continuing without it");
        }

        info!(
            city = %key,
            total = merged.movies.len(),
            active = merged.active_count(),
            "listings reconciled"
        );
        Ok(merged)
    }
}
