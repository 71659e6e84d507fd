//! Villages feed (GeoJSON FeatureCollection of points).

use super::{Entity, FeedSource, Snapshot};
use crate::fetch::{self, FetchError};
use crate::geo::LngLat;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::warn;

// Features deserialize individually so one malformed feature drops that
// feature, not the whole snapshot.
#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Vec<f64>,
}

// GeoJSON allows string or numeric feature ids; some feeds put the id in
// the properties instead.
fn feature_id(feature: &Feature) -> Option<String> {
    let raw = feature.id.as_ref().or_else(|| feature.properties.get("id"))?;
    match raw {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_entities(collection: FeatureCollection) -> Vec<Entity> {
    let mut entities = Vec::with_capacity(collection.features.len());
    for value in collection.features {
        let feature: Feature = match serde_json::from_value(value) {
            Ok(feature) => feature,
            Err(e) => {
                warn!(error = %e, "Skipping malformed village feature");
                continue;
            }
        };
        let Some(id) = feature_id(&feature) else {
            warn!("Skipping village feature without id");
            continue;
        };
        let Some(geometry) = &feature.geometry else {
            warn!(village_id = %id, "Skipping village feature without geometry");
            continue;
        };
        if geometry.kind != "Point" || geometry.coordinates.len() < 2 {
            warn!(village_id = %id, "Skipping village feature with non-point geometry");
            continue;
        }
        let position = LngLat::new(geometry.coordinates[0], geometry.coordinates[1]);
        if !position.is_finite() {
            warn!(village_id = %id, "Skipping village feature with non-finite position");
            continue;
        }

        entities.push(Entity {
            id,
            position,
            attributes: feature.properties.into_iter().collect(),
        });
    }
    entities
}

/// Villages feed: placed villages published as GeoJSON.
pub struct VillageFeed {
    url: String,
    deadline: Duration,
}

impl VillageFeed {
    pub fn new(url: String, deadline: Duration) -> Self {
        Self { url, deadline }
    }
}

#[async_trait]
impl FeedSource for VillageFeed {
    fn name(&self) -> &str {
        "villages"
    }

    async fn poll(&self, client: &reqwest::Client) -> Result<Snapshot, FetchError> {
        let collection: FeatureCollection =
            fetch::fetch_json(client, &self.url, self.deadline).await?;
        let entities = parse_entities(collection);
        Ok(Snapshot::new(entities, Utc::now()))
    }
}

#[cfg(test)]
pub(super) fn parse_for_tests(json: &str) -> Vec<Entity> {
    let collection: FeatureCollection = serde_json::from_str(json).unwrap();
    parse_entities(collection)
}
