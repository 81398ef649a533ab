//! Fetch-through cache of species summaries.
//!
//! A cached entry younger than the TTL is served as is. Otherwise the
//! upstream source is asked; a non-empty answer is stored, anything else
//! yields a placeholder that is never cached, so the next request retries.

pub mod wikipedia;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::{Database, EncyclopediaEntry};
use crate::error::AppError;

pub use wikipedia::WikipediaSource;

pub const NO_INFO_PLACEHOLDER: &str = "No information found for this species.";

/// External source of species summaries.
pub trait SummarySource: Send + Sync {
    /// `Ok(None)` when the source has no article for `species`.
    fn fetch_summary(&self, species: &str) -> Result<Option<String>, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOrigin {
    Cache,
    Upstream,
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub species: String,
    pub text: String,
    pub origin: SummaryOrigin,
    pub cached_at: Option<DateTime<Utc>>,
}

pub struct EncyclopediaCache {
    source: Arc<dyn SummarySource>,
    ttl: Duration,
}

impl EncyclopediaCache {
    pub fn new(source: Arc<dyn SummarySource>, ttl: Duration) -> Self {
        Self { source, ttl }
    }

    /// Cached summary for `species`, refreshed from upstream when missing
    /// or older than the TTL. Upstream failures degrade to the placeholder;
    /// only store errors are returned.
    pub fn get_summary(
        &self,
        db: &Database,
        species: &str,
        now: DateTime<Utc>,
    ) -> Result<Summary, AppError> {
        let species = species.trim();
        let key = species_key(species);
        if key.is_empty() {
            return Ok(placeholder(species));
        }

        if let Some(entry) = db.get_encyclopedia_entry(&key)? {
            if now - entry.cached_at < self.ttl {
                debug!(species = %key, "Encyclopedia cache hit");
                return Ok(Summary {
                    species: entry.species,
                    text: entry.summary,
                    origin: SummaryOrigin::Cache,
                    cached_at: Some(entry.cached_at),
                });
            }
            debug!(species = %key, "Encyclopedia entry stale, refetching");
        }

        let text = match self.source.fetch_summary(species) {
            Ok(Some(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                debug!(species = %key, "No encyclopedia article");
                return Ok(placeholder(species));
            }
            Err(e) => {
                warn!(species = %key, "Encyclopedia lookup failed: {e}");
                return Ok(placeholder(species));
            }
        };

        let entry = EncyclopediaEntry {
            species: species.to_string(),
            summary: text,
            cached_at: now,
        };
        db.upsert_encyclopedia_entry(&key, &entry)?;

        Ok(Summary {
            species: entry.species,
            text: entry.summary,
            origin: SummaryOrigin::Upstream,
            cached_at: Some(now),
        })
    }
}

/// Cache key: lower-cased with whitespace collapsed, so "Red  Fox" and
/// "red fox" share an entry.
pub fn species_key(species: &str) -> String {
    species
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn placeholder(species: &str) -> Summary {
    Summary {
        species: species.to_string(),
        text: NO_INFO_PLACEHOLDER.to_string(),
        origin: SummaryOrigin::Placeholder,
        cached_at: None,
    }
}
