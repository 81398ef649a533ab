//! GeoJSON (RFC 7946) output for the observation map.

use serde::Serialize;

use crate::db::Observation;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: i64,
    pub geometry: Point,
    pub properties: FeatureProperties,
}

/// Coordinates are `[longitude, latitude]`, the order GeoJSON mandates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureProperties {
    pub id: i64,
    pub species: String,
    pub uploader: String,
    pub image_url: String,
    pub created_at: String,
}

impl From<&Observation> for Feature {
    fn from(obs: &Observation) -> Self {
        Feature {
            kind: "Feature",
            id: obs.id,
            geometry: Point {
                kind: "Point",
                coordinates: [obs.longitude, obs.latitude],
            },
            properties: FeatureProperties {
                id: obs.id,
                species: obs.species.clone(),
                uploader: obs.uploader_username.clone(),
                image_url: format!("/image/{}", obs.image_id),
                created_at: obs.created_at.clone(),
            },
        }
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        FeatureCollection {
            kind: "FeatureCollection",
            features: iter.into_iter().collect(),
        }
    }
}
