//! Durable keyed store for reconciled city listings.
//!
//! One pretty-printed JSON document per city slug under the data directory.
//! The store is the single writer of [`CityListings`] state: the reconciler
//! computes a full replacement document and `save_group` lands it
//! all-or-nothing (temp file + rename), so readers never observe a partial
//! group. Unlike the cache, storage failures here propagate: a lost merge
//! result is the caller's problem to surface, not to swallow.

use crate::error::StoreError;
use crate::models::CityListings;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, instrument};

/// File-backed document store, keyed by city slug.
#[derive(Debug, Clone)]
pub struct ListingsStore {
    dir: PathBuf,
}

impl ListingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load the persisted group for `key`, or `None` if it was never saved.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_group(&self, key: &str) -> Result<Option<CityListings>, StoreError> {
        let path = self.path_for(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key, "no persisted listings");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let group: CityListings = serde_json::from_slice(&raw)?;
        debug!(key, count = group.movies.len(), "loaded persisted listings");
        Ok(Some(group))
    }

    /// Persist `group` as the full replacement document for its city.
    #[instrument(level = "debug", skip_all, fields(city = %group.city, count = group.movies.len()))]
    pub async fn save_group(&self, group: &CityListings) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;

        let json = serde_json::to_vec_pretty(group)?;
        let path = self.path_for(&group.city);
        let tmp = self.dir.join(format!("{}.json.tmp", group.city));
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &path).await?;
        info!(city = %group.city, path = %path.display(), "listings persisted");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn document_path(&self, key: &str) -> PathBuf {
        self.path_for(key)
    }

    #[cfg(test)]
    pub(crate) fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}
