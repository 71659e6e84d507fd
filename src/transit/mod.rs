//! Static transit data (stops, routes, trips) and vehicle enrichment.
//!
//! The static document changes rarely, so it is fetched once at startup and
//! consulted when live vehicle entries need display names resolved. Running
//! without it is fine — vehicles are then tracked with raw ids only.

pub mod departures;

use crate::fetch::{self, FetchError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// GTFS stop record (the subset the map displays).
#[derive(Clone, Debug, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
    #[serde(default)]
    pub stop_code: String,
}

/// GTFS route record.
#[derive(Clone, Debug, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub route_short_name: String,
    #[serde(default)]
    pub route_long_name: String,
    #[serde(default)]
    pub route_color: String,
    #[serde(default)]
    pub route_text_color: String,
}

/// GTFS trip record.
#[derive(Clone, Debug, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    #[serde(default)]
    pub trip_headsign: String,
}

#[derive(Debug, Deserialize)]
struct GtfsDocument {
    #[serde(default)]
    stops: HashMap<String, Stop>,
    #[serde(default)]
    routes: HashMap<String, Route>,
    #[serde(default)]
    trips: HashMap<String, Trip>,
}

/// Display verb for a GTFS-RT `currentStatus` value.
pub fn status_verb(status: &str) -> Option<&'static str> {
    match status {
        "IN_TRANSIT_TO" => Some("Next stop"),
        "STOPPED_AT" => Some("Currently at"),
        "INCOMING_AT" => Some("Arriving at"),
        _ => None,
    }
}

/// Static transit directory keyed by GTFS ids.
#[derive(Debug, Default)]
pub struct TransitDirectory {
    pub stops: HashMap<String, Stop>,
    pub routes: HashMap<String, Route>,
    pub trips: HashMap<String, Trip>,
}

impl TransitDirectory {
    /// Directory with no data; lookups resolve nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fetch and parse the static GTFS document.
    pub async fn load(
        client: &reqwest::Client,
        url: &str,
        deadline: Duration,
    ) -> Result<Self, FetchError> {
        let doc: GtfsDocument = fetch::fetch_json(client, url, deadline).await?;
        info!(
            stops = doc.stops.len(),
            routes = doc.routes.len(),
            trips = doc.trips.len(),
            "Loaded transit directory"
        );
        Ok(Self {
            stops: doc.stops,
            routes: doc.routes,
            trips: doc.trips,
        })
    }

    pub fn stop(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.get(stop_id)
    }

    /// Resolve a route directly, or through the trip when the live feed only
    /// carries a trip id.
    pub fn route_for(&self, route_id: Option<&str>, trip_id: Option<&str>) -> Option<&Route> {
        if let Some(route) = route_id.and_then(|id| self.routes.get(id)) {
            return Some(route);
        }
        trip_id
            .and_then(|id| self.trips.get(id))
            .and_then(|trip| self.routes.get(&trip.route_id))
    }

    /// Resolve live-feed ids into display attributes: route name and colors,
    /// stop name, and the verb for the vehicle's current status. Unknown ids
    /// leave the attributes untouched.
    pub fn enrich(
        &self,
        attributes: &mut HashMap<String, Value>,
        route_id: Option<&str>,
        trip_id: Option<&str>,
        stop_id: Option<&str>,
        status: Option<&str>,
    ) {
        if let Some(route) = self.route_for(route_id, trip_id) {
            attributes.insert(
                "route_name".to_string(),
                Value::String(route.route_short_name.clone()),
            );
            if !route.route_color.is_empty() {
                attributes.insert(
                    "route_color".to_string(),
                    Value::String(route.route_color.clone()),
                );
            }
            if !route.route_text_color.is_empty() {
                attributes.insert(
                    "route_text_color".to_string(),
                    Value::String(route.route_text_color.clone()),
                );
            }
        }

        if let Some(stop) = stop_id.and_then(|id| self.stop(id)) {
            attributes.insert(
                "stop_name".to_string(),
                Value::String(stop.stop_name.clone()),
            );
            if let Some(verb) = status.and_then(status_verb) {
                attributes.insert("status_verb".to_string(), Value::String(verb.to_string()));
            }
        }
    }
}
