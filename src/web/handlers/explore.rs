use axum::{
    extract::{Path, Query, State},
    response::{Html, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Rejection;
use crate::feed::{self, FeatureCollection, FeedFilter};
use crate::web::{blocking, pages, AppState, CurrentUser};

use super::render;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn feed_page(CurrentUser(user): CurrentUser, jar: CookieJar) -> Response {
    render(jar, |flashes| pages::feed(&user, flashes))
}

pub async fn observations_geojson(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<FeedFilter>,
) -> Result<Json<FeatureCollection>, Rejection> {
    let db = state.db.clone();
    let collection = blocking(move || feed::geo_feed(&db, &filter)).await?;
    Ok(Json(collection))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<SearchQuery>,
    jar: CookieJar,
) -> Result<Response, Rejection> {
    let db = state.db.clone();
    let q = query.q.clone();
    let results = blocking(move || feed::search_observations(&db, &q)).await?;

    Ok(render(jar, |flashes| {
        pages::search(&user, flashes, &query.q, &results)
    }))
}

pub async fn encyclopedia(
    State(state): State<Arc<AppState>>,
    Path(species): Path<String>,
) -> Result<Html<String>, Rejection> {
    let db = state.db.clone();
    let cache = state.encyclopedia.clone();
    let summary = blocking(move || cache.get_summary(&db, &species, Utc::now())).await?;
    Ok(Html(pages::encyclopedia(&summary)))
}
