//! Feed data model and parse boundary.
//!
//! Each feed type deserializes its own wire schema and validates per entry:
//! a malformed entry is dropped with a warning, a document that fails to
//! deserialize at all fails the whole poll.

pub mod vehicle;
pub mod village;


pub use vehicle::VehicleFeed;
pub use village::VillageFeed;

use crate::fetch::FetchError;
use crate::geo::LngLat;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// A tracked object from a live feed (a vehicle, a village).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    /// Stable external identifier
    pub id: String,

    /// Geographic position
    pub position: LngLat,

    /// Display metadata (labels, status codes) — opaque to the reconciler
    pub attributes: HashMap<String, Value>,
}

/// One fetched, parsed state of a live feed.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Entities present in this snapshot, unique by id
    pub entities: Vec<Entity>,

    /// Time of the successful fetch
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot, enforcing id uniqueness. The first occurrence of an
    /// id wins; later duplicates are dropped.
    pub fn new(entities: Vec<Entity>, fetched_at: DateTime<Utc>) -> Self {
        let mut seen = HashSet::with_capacity(entities.len());
        let mut unique = Vec::with_capacity(entities.len());
        for entity in entities {
            if seen.insert(entity.id.clone()) {
                unique.push(entity);
            } else {
                warn!(entity_id = %entity.id, "Duplicate id in snapshot, keeping first occurrence");
            }
        }
        Self {
            entities: unique,
            fetched_at,
        }
    }
}

/// A pollable feed producing entity snapshots.
///
/// The poller calls `poll` on schedule and hands the snapshot to the
/// reconciler. Implementations own their endpoint and fetch deadline.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Short identifier used in logs (e.g. "vehicles").
    fn name(&self) -> &str;

    /// Fetch and parse one snapshot.
    async fn poll(&self, client: &reqwest::Client) -> Result<Snapshot, FetchError>;
}
