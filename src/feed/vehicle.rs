//! Live vehicle positions feed (GTFS-RT JSON rendition).

use super::{Entity, FeedSource, Snapshot};
use crate::fetch::{self, FetchError};
use crate::geo::LngLat;
use crate::transit::TransitDirectory;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

// Entries deserialize individually so one malformed entry drops that entry,
// not the whole snapshot.
#[derive(Debug, Deserialize)]
struct VehiclePositionsDocument {
    #[serde(rename = "vehiclePositions", default)]
    vehicle_positions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawVehiclePosition {
    #[serde(default)]
    id: String,
    #[serde(default)]
    vehicle: Option<RawVehicleDescriptor>,
    #[serde(default)]
    trip: Option<RawTripDescriptor>,
    #[serde(default)]
    position: Option<RawPosition>,
    #[serde(rename = "stopId", default)]
    stop_id: Option<String>,
    #[serde(rename = "currentStatus", default)]
    current_status: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawVehicleDescriptor {
    #[serde(default)]
    label: Option<String>,
    #[serde(rename = "licensePlate", default)]
    license_plate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTripDescriptor {
    #[serde(default)]
    trip_id: Option<String>,
    #[serde(rename = "routeId", default)]
    route_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    latitude: f64,
    longitude: f64,
}

/// Convert raw feed entries to entities, dropping malformed ones.
///
/// An entry needs a non-empty id and a finite position; everything else is
/// optional display metadata.
fn parse_entities(doc: VehiclePositionsDocument, directory: &TransitDirectory) -> Vec<Entity> {
    let mut entities = Vec::with_capacity(doc.vehicle_positions.len());
    for value in doc.vehicle_positions {
        let raw: RawVehiclePosition = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Skipping malformed vehicle entry");
                continue;
            }
        };
        if raw.id.is_empty() {
            warn!("Skipping vehicle entry without id");
            continue;
        }
        let position = match &raw.position {
            Some(p) => LngLat::new(p.longitude, p.latitude),
            None => {
                warn!(vehicle_id = %raw.id, "Skipping vehicle entry without position");
                continue;
            }
        };
        if !position.is_finite() {
            warn!(vehicle_id = %raw.id, "Skipping vehicle entry with non-finite position");
            continue;
        }

        let mut attributes = HashMap::new();
        if let Some(vehicle) = &raw.vehicle {
            if let Some(label) = &vehicle.label {
                attributes.insert("label".to_string(), Value::String(label.clone()));
            }
            if let Some(plate) = &vehicle.license_plate {
                attributes.insert("license_plate".to_string(), Value::String(plate.clone()));
            }
        }
        if let Some(status) = &raw.current_status {
            attributes.insert("status".to_string(), Value::String(status.clone()));
        }
        if let Some(stop_id) = &raw.stop_id {
            attributes.insert("stop_id".to_string(), Value::String(stop_id.clone()));
        }
        if let Some(timestamp) = raw.timestamp {
            attributes.insert("timestamp".to_string(), Value::from(timestamp));
        }

        let (trip_id, route_id) = match &raw.trip {
            Some(trip) => (trip.trip_id.as_deref(), trip.route_id.as_deref()),
            None => (None, None),
        };
        if let Some(route_id) = route_id {
            attributes.insert("route_id".to_string(), Value::String(route_id.to_string()));
        }
        directory.enrich(
            &mut attributes,
            route_id,
            trip_id,
            raw.stop_id.as_deref(),
            raw.current_status.as_deref(),
        );

        entities.push(Entity {
            id: raw.id,
            position,
            attributes,
        });
    }
    entities
}

/// Vehicle positions feed: polls the realtime document and resolves display
/// names against the static transit directory.
pub struct VehicleFeed {
    url: String,
    directory: Arc<TransitDirectory>,
    deadline: Duration,
}

impl VehicleFeed {
    pub fn new(url: String, directory: Arc<TransitDirectory>, deadline: Duration) -> Self {
        Self {
            url,
            directory,
            deadline,
        }
    }
}

#[async_trait]
impl FeedSource for VehicleFeed {
    fn name(&self) -> &str {
        "vehicles"
    }

    async fn poll(&self, client: &reqwest::Client) -> Result<Snapshot, FetchError> {
        let doc: VehiclePositionsDocument =
            fetch::fetch_json(client, &self.url, self.deadline).await?;
        let entities = parse_entities(doc, &self.directory);
        Ok(Snapshot::new(entities, Utc::now()))
    }
}

#[cfg(test)]
pub(super) fn parse_for_tests(json: &str, directory: &TransitDirectory) -> Vec<Entity> {
    let doc: VehiclePositionsDocument = serde_json::from_str(json).unwrap();
    parse_entities(doc, directory)
}
