//! Paytm Movies now-playing extractor.
//!
//! City pages at `paytm.com/movies/{city}` render the now-playing grid as
//! spans whose class starts with `RunningMovies_moviesList`, containing one
//! card div per movie (class prefix `DesktopRunningMovie_movieCard`). Each
//! card embeds a schema.org `<script type="application/ld+json">` blob with
//! the movie's name, poster image, aggregate rating, and languages. The
//! useful data comes from the JSON-LD, not from the visual markup.
//!
//! The class names are build artifacts of the site's CSS modules; only their
//! prefixes are stable, hence the `^=` attribute selectors.

use crate::error::ExtractError;
use crate::models::Movie;
use crate::scrapers::Extractor;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

static LISTINGS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"span[class^="RunningMovies_moviesList"]"#).unwrap());
static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[class^="DesktopRunningMovie_movieCard"]"#).unwrap());
static METADATA_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// Extractor for Paytm's now-playing city pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaytmExtractor;

impl Extractor for PaytmExtractor {
    fn extract(&self, html: &str, now: DateTime<Utc>) -> Result<Vec<Movie>, ExtractError> {
        let document = Html::parse_document(html);

        let mut containers = document.select(&LISTINGS_SELECTOR).peekable();
        if containers.peek().is_none() {
            return Err(ExtractError::UnrecognizedMarkup);
        }

        let mut movies = Vec::new();
        for container in containers {
            for card in container.select(&CARD_SELECTOR) {
                // Cards without metadata (ads, placeholders) are skipped.
                let Some(script) = card.select(&METADATA_SELECTOR).next() else {
                    continue;
                };
                let raw = script.text().collect::<String>();
                let metadata: Value = serde_json::from_str(raw.trim())?;
                movies.push(movie_from_metadata(&metadata, now));
            }
        }

        debug!(count = movies.len(), "extracted now-playing listings");
        Ok(movies)
    }
}

fn movie_from_metadata(metadata: &Value, now: DateTime<Utc>) -> Movie {
    let name = metadata
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    let poster = metadata
        .get("image")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    let rating = metadata
        .pointer("/aggregateRating/ratingValue")
        .and_then(rating_value);
    let languages = metadata
        .get("inLanguage")
        .map(normalize_languages)
        .unwrap_or_else(|| vec!["Unknown".to_string()]);

    Movie {
        name,
        poster,
        rating,
        languages,
        is_active: true,
        last_updated: now,
    }
}

/// JSON-LD emits `ratingValue` as a number on some cards and a string on
/// others.
fn rating_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `inLanguage` shows up either as a comma-separated string or as an array.
fn normalize_languages(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty())
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}
