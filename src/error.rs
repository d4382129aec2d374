//! Error taxonomy for the harvesting pipeline.
//!
//! Each stage has its own failure type so callers can tell a dead remote
//! site apart from unrecognizable markup or a broken durable store, and the
//! scheduler can decide per city what to skip. [`PipelineError`] is the
//! umbrella returned by one city's cycle; a failure for one city never
//! affects another.

use reqwest::StatusCode;
use thiserror::Error;

/// Why a single fetch attempt failed.
#[derive(Debug, Error)]
pub enum FetchCause {
    /// Connection, TLS, timeout, or body-read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered, but not with a 2xx.
    #[error("unexpected status {0}")]
    Status(StatusCode),
}

/// A URL could not be fetched after exhausting every retry attempt.
///
/// Carries the final attempt's cause; earlier attempts are only visible in
/// the logs.
#[derive(Debug, Error)]
#[error("fetching {url} failed after {attempts} attempts: {last_cause}")]
pub struct FetchError {
    pub url: String,
    pub attempts: usize,
    #[source]
    pub last_cause: FetchCause,
}

/// The fetched page could not be turned into a movie batch.
///
/// Distinct from a page that parses fine but lists zero movies; that case is
/// an `Ok` empty batch, not an error.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The listings container is missing entirely; the page shape has
    /// probably changed upstream.
    #[error("listings markup not recognized")]
    UnrecognizedMarkup,
    /// A movie card carried metadata that is not valid JSON-LD.
    #[error("movie metadata is not valid JSON-LD: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Durable storage failure, shared by the TTL cache and the listings store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored document is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Failure of one city's harvest cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
