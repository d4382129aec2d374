//! Durable per-city TTL cache for raw scrape results.
//!
//! One JSON file per city slug under the cache directory, each holding a
//! [`CachedListings`] record (`{timestamp, movies}`). An entry is served only
//! while younger than [`CACHE_TTL_HOURS`]; stale entries are ignored in
//! place, never purged, and simply get overwritten by the next `put`.
//!
//! The cache owns the freshness decision and nothing else. It is also
//! allowed to fail quietly: an unreadable cache degrades to a miss (forcing
//! a re-fetch), and a failed write is the caller's to log and shrug off: a
//! successful scrape that fails to cache is not itself an error.

use crate::error::StoreError;
use crate::models::{CachedListings, Movie};
use chrono::{TimeDelta, Utc};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Maximum age at which a cached batch is still served without re-fetching.
pub const CACHE_TTL_HOURS: i64 = 24;

/// File-backed TTL cache, keyed by city slug.
#[derive(Debug, Clone)]
pub struct ListingsCache {
    dir: PathBuf,
}

impl ListingsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Return the entry for `key` only if it is younger than the TTL.
    ///
    /// Any storage trouble (missing file, unreadable JSON, I/O error) is
    /// reported as a miss.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, key: &str) -> Option<CachedListings> {
        let path = self.path_for(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key, "cache miss: no entry");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed; treating as miss");
                return None;
            }
        };

        let entry: CachedListings = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "cache entry unreadable; treating as miss");
                return None;
            }
        };

        let age = Utc::now() - entry.timestamp;
        if age < TimeDelta::hours(CACHE_TTL_HOURS) {
            debug!(
                key,
                age_secs = age.num_seconds(),
                count = entry.movies.len(),
                "cache hit"
            );
            Some(entry)
        } else {
            // Stale entries stay on disk; they are merely no longer served.
            debug!(key, age_secs = age.num_seconds(), "cache entry stale");
            None
        }
    }

    /// Overwrite the entry for `key` with a fresh batch, stamped now.
    ///
    /// The write goes through a temp file and a rename, so a concurrent
    /// `get` sees either the previous entry or the new one, never a partial
    /// write.
    #[instrument(level = "debug", skip(self, movies), fields(count = movies.len()))]
    pub async fn put(&self, key: &str, movies: &[Movie]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;

        let entry = CachedListings {
            timestamp: Utc::now(),
            movies: movies.to_vec(),
        };
        let json = serde_json::to_vec(&entry)?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &path).await?;
        debug!(key, path = %path.display(), "cache entry written");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn entry_path(&self, key: &str) -> PathBuf {
        self.path_for(key)
    }

    #[cfg(test)]
    pub(crate) fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn movie(name: &str) -> Movie {
        Movie {
            name: name.to_string(),
            poster: format!("https://example.com/{name}.jpg"),
            rating: Some(7.0),
            languages: vec!["Hindi".to_string()],
            is_active: true,
            last_updated: Utc::now(),
        }
    }

    async fn write_entry_with_age(cache: &ListingsCache, key: &str, age: Duration) {
        let entry = CachedListings {
            timestamp: Utc::now() - age,
            movies: vec![movie("Pushpa 2")],
        };
        fs::create_dir_all(cache.dir()).await.unwrap();
        fs::write(
            cache.entry_path(key),
            serde_json::to_vec(&entry).unwrap(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_get_right_after_put_hits() {
        let dir = TempDir::new().unwrap();
        let cache = ListingsCache::new(dir.path());

        cache.put("mumbai", &[movie("Jawan")]).await.unwrap();
        let entry = cache.get("mumbai").await.expect("fresh entry");
        assert_eq!(entry.movies.len(), 1);
        assert_eq!(entry.movies[0].name, "Jawan");
    }

    #[tokio::test]
    async fn test_entry_just_inside_ttl_hits() {
        let dir = TempDir::new().unwrap();
        let cache = ListingsCache::new(dir.path());

        write_entry_with_age(
            &cache,
            "delhi",
            Duration::hours(CACHE_TTL_HOURS) - Duration::minutes(1),
        )
        .await;
        assert!(cache.get("delhi").await.is_some());
    }

    #[tokio::test]
    async fn test_entry_just_past_ttl_misses() {
        let dir = TempDir::new().unwrap();
        let cache = ListingsCache::new(dir.path());

        write_entry_with_age(
            &cache,
            "delhi",
            Duration::hours(CACHE_TTL_HOURS) + Duration::minutes(1),
        )
        .await;
        assert!(cache.get("delhi").await.is_none());
    }

    #[tokio::test]
    async fn test_stale_entry_is_not_deleted() {
        let dir = TempDir::new().unwrap();
        let cache = ListingsCache::new(dir.path());

        write_entry_with_age(&cache, "pune", Duration::hours(48)).await;
        assert!(cache.get("pune").await.is_none());
        assert!(cache.entry_path("pune").exists());
    }

    #[tokio::test]
    async fn test_missing_directory_degrades_to_miss() {
        let cache = ListingsCache::new("/nonexistent/chitram-cache");
        assert!(cache.get("mumbai").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_degrades_to_miss() {
        let dir = TempDir::new().unwrap();
        let cache = ListingsCache::new(dir.path());

        fs::write(cache.entry_path("jaipur"), b"{not json")
            .await
            .unwrap();
        assert!(cache.get("jaipur").await.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_in_place() {
        let dir = TempDir::new().unwrap();
        let cache = ListingsCache::new(dir.path());

        cache.put("kochi", &[movie("Old")]).await.unwrap();
        cache.put("kochi", &[movie("New"), movie("Newer")]).await.unwrap();

        let entry = cache.get("kochi").await.unwrap();
        let names: Vec<_> = entry.movies.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["New", "Newer"]);
    }
}
