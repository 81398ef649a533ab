//! Read side: personal lists, substring search and the map feed.

pub mod geojson;

use serde::Deserialize;

use crate::db::{Database, Observation};
use crate::error::AppError;

pub use geojson::{Feature, FeatureCollection};

/// Optional map filters; blank values do not constrain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedFilter {
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

pub fn list_my_observations(db: &Database, user_id: i64) -> Result<Vec<Observation>, AppError> {
    Ok(db.observations_by_uploader(user_id)?)
}

pub fn recent_observations(db: &Database, limit: usize) -> Result<Vec<Observation>, AppError> {
    Ok(db.recent_observations(limit)?)
}

/// Observations whose species or uploader contains `query`, ignoring case.
/// A blank query matches nothing.
pub fn search_observations(db: &Database, query: &str) -> Result<Vec<Observation>, AppError> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    Ok(db
        .all_observations()?
        .into_iter()
        .filter(|obs| {
            contains_lowercase(&obs.species, &query)
                || contains_lowercase(&obs.uploader_username, &query)
        })
        .collect())
}

pub fn geo_feed(db: &Database, filter: &FeedFilter) -> Result<FeatureCollection, AppError> {
    let species = normalized(&filter.species);
    let username = normalized(&filter.username);

    Ok(db
        .all_observations()?
        .iter()
        .filter(|obs| {
            species
                .as_deref()
                .map_or(true, |s| contains_lowercase(&obs.species, s))
                && username
                    .as_deref()
                    .map_or(true, |u| contains_lowercase(&obs.uploader_username, u))
        })
        .map(Feature::from)
        .collect())
}

fn normalized(filter: &Option<String>) -> Option<String> {
    filter
        .as_deref()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

fn contains_lowercase(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}
