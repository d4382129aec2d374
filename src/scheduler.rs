//! Recurring harvest driver.
//!
//! Runs the per-city pipeline over the whole roster on a fixed interval,
//! in-process: there is no subprocess layer, so a city's failure is a
//! logged error, not an exit code to inspect. Cities fan out concurrently
//! up to a limit, and a shared rate gate keeps a minimum gap between
//! outbound requests so the harvester never hammers the listings site.

use crate::pipeline::Pipeline;
use crate::scrapers::Extractor;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{error, info, instrument};

/// Scheduling knobs, resolved from the CLI.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Time between the start of one pass and the next.
    pub interval: Duration,
    /// Maximum cities harvested concurrently.
    pub fan_out: usize,
    /// Minimum gap between outbound requests across the whole fan-out.
    pub request_gap: Duration,
}

/// Shared minimum-gap gate: each caller waits for the next free slot.
struct RateGate {
    next_slot: Mutex<Instant>,
    gap: Duration,
}

impl RateGate {
    fn new(gap: Duration) -> Self {
        Self {
            next_slot: Mutex::new(Instant::now()),
            gap,
        }
    }

    async fn wait(&self) {
        let deadline = {
            let mut slot = self.next_slot.lock().await;
            let deadline = (*slot).max(Instant::now());
            *slot = deadline + self.gap;
            deadline
        };
        sleep_until(deadline).await;
    }
}

/// One pass over every city in the roster.
///
/// Per-city failures are logged and skipped; they never abort the pass.
/// Returns the number of cities harvested successfully.
#[instrument(level = "info", skip_all, fields(cities = cities.len()))]
pub async fn run_tick<E>(
    pipeline: &Pipeline<E>,
    cities: &[String],
    fan_out: usize,
    request_gap: Duration,
) -> usize
where
    E: Extractor,
{
    let gate = Arc::new(RateGate::new(request_gap));

    let results: Vec<bool> = stream::iter(cities)
        .map(|city| {
            let gate = Arc::clone(&gate);
            async move {
                gate.wait().await;
                match pipeline.run(city).await {
                    Ok(group) => {
                        info!(
                            %city,
                            total = group.movies.len(),
                            active = group.active_count(),
                            "city harvested"
                        );
                        true
                    }
                    Err(e) => {
                        error!(%city, error = %e, "city harvest failed; skipping this cycle");
                        false
                    }
                }
            }
        })
        .buffer_unordered(fan_out.max(1))
        .collect()
        .await;

    let succeeded = results.iter().filter(|ok| **ok).count();
    info!(
        succeeded,
        failed = results.len() - succeeded,
        "harvest pass complete"
    );
    succeeded
}

/// Run a pass immediately, then once per interval, until the process stops.
///
/// A pass that overruns the interval delays the next one rather than
/// stacking up behind it.
pub async fn run_forever<E>(pipeline: &Pipeline<E>, cities: &[String], config: &ScheduleConfig)
where
    E: Extractor,
{
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let started = std::time::Instant::now();
        run_tick(pipeline, cities, config.fan_out, config.request_gap).await;
        info!(
            elapsed_secs = started.elapsed().as_secs(),
            next_in_secs = config.interval.as_secs(),
            "scheduler pass finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ListingsCache;
    use crate::fetch::{HttpFetcher, RetryFetch};
    use crate::scrapers::PaytmExtractor;
    use crate::store::ListingsStore;
    use tempfile::TempDir;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTINGS_PAGE: &str = r#"
        <span class="RunningMovies_moviesList__t">
          <div class="DesktopRunningMovie_movieCard__a">
            <script type="application/ld+json">
              {"name":"Jawan","image":"https://img.example.com/j.jpg","inLanguage":"Hindi"}
            </script>
          </div>
        </span>
    "#;

    #[tokio::test(start_paused = true)]
    async fn test_rate_gate_spaces_out_callers() {
        let gate = RateGate::new(Duration::from_secs(1));
        let t0 = Instant::now();
        gate.wait().await;
        gate.wait().await;
        gate.wait().await;
        // Three waits reserve slots at 0s, 1s and 2s.
        assert!(t0.elapsed() >= Duration::from_secs(2));
        assert!(t0.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_tick_isolates_per_city_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movies/mumbai"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTINGS_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/movies/atlantis"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let cache_dir = TempDir::new().unwrap();
        let data_dir = TempDir::new().unwrap();
        let store = ListingsStore::new(data_dir.path());
        let pipeline = Pipeline::new(
            RetryFetch::new(
                HttpFetcher::new(Duration::from_secs(5)).unwrap(),
                1,
                Duration::from_millis(5),
            ),
            ListingsCache::new(cache_dir.path()),
            store.clone(),
            PaytmExtractor,
            Url::parse(&format!("{}/movies", server.uri())).unwrap(),
        );

        let cities = vec!["mumbai".to_string(), "atlantis".to_string()];
        let succeeded = run_tick(&pipeline, &cities, 2, Duration::from_millis(1)).await;

        assert_eq!(succeeded, 1);
        // The healthy city still landed despite the other one failing.
        assert!(store.load_group("mumbai").await.unwrap().is_some());
        assert!(store.load_group("atlantis").await.unwrap().is_none());
    }
}
