//! Live entity reconciliation.
//!
//! Each feed owns one reconciler: it diffs every incoming snapshot against
//! the tracked entity set and drives the rendering layer through minimal
//! add/update/remove calls. Sustained fetch failure falls back to an empty
//! display instead of showing indefinitely stale positions.

pub mod poller;


pub use poller::{PollOptions, Reconciler, ReconcilerHandle};

use crate::feed::{Entity, Snapshot};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Rendering-layer boundary. The reconciler never touches drawing
/// primitives; it tells the sink what appeared, moved or vanished.
pub trait RenderSink: Send {
    fn add_entity(&mut self, entity: &Entity);
    fn update_entity(&mut self, entity: &Entity);
    fn remove_entity(&mut self, id: &str);
}

/// Reconciliation state for one feed.
///
/// The displayed set is always derived from the most recent successfully
/// parsed snapshot — or, once failures outlast the grace period, from
/// nothing at all. It is never a partial merge of two snapshots.
pub struct ReconcilerState {
    /// Tracked entities. Shared with readers outside the poll task;
    /// last-write-wins per tick, no transactional read guarantee.
    entities: Arc<DashMap<String, Entity>>,

    /// Ids the sink currently displays. Mirrors the sink exactly; diverges
    /// from `entities` only while the view is hidden.
    rendered: HashSet<String>,

    /// Time of the last successfully applied snapshot
    last_success: Option<DateTime<Utc>>,

    /// When false, per-tick sink traffic is suppressed
    visible: bool,
}

impl ReconcilerState {
    pub fn new() -> Self {
        Self {
            entities: Arc::new(DashMap::new()),
            rendered: HashSet::new(),
            last_success: None,
            visible: true,
        }
    }

    /// Shared handle to the tracked entity map.
    pub fn entities(&self) -> Arc<DashMap<String, Entity>> {
        Arc::clone(&self.entities)
    }

    /// Apply one snapshot: update known entities in place (the sink reuses
    /// whatever it has attached to them), add new ones, remove those absent
    /// from the snapshot.
    pub fn apply_snapshot(
        &mut self,
        snapshot: Snapshot,
        now: DateTime<Utc>,
        sink: &mut dyn RenderSink,
    ) {
        let mut seen = HashSet::with_capacity(snapshot.entities.len());
        for entity in snapshot.entities {
            seen.insert(entity.id.clone());
            if self.visible {
                if self.rendered.contains(&entity.id) {
                    sink.update_entity(&entity);
                } else {
                    sink.add_entity(&entity);
                    self.rendered.insert(entity.id.clone());
                }
            }
            self.entities.insert(entity.id.clone(), entity);
        }

        let stale: Vec<String> = self
            .entities
            .iter()
            .filter(|entry| !seen.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        for id in stale {
            self.entities.remove(&id);
            if self.visible && self.rendered.remove(&id) {
                sink.remove_entity(&id);
            }
        }

        self.last_success = Some(now);
    }

    /// Handle a failed poll. Within the grace window the last good snapshot
    /// stays up; past it, the displayed set is cleared. Clearing reaches the
    /// sink even while hidden, so a reveal cannot resurrect stale markers.
    pub fn record_failure(
        &mut self,
        grace_period: Duration,
        now: DateTime<Utc>,
        sink: &mut dyn RenderSink,
    ) {
        let Some(last) = self.last_success else {
            // Never had data; nothing displayed, nothing to clear
            return;
        };

        let age_ms = (now - last).num_milliseconds();
        if age_ms < grace_period.as_millis() as i64 {
            debug!(age_ms, "Feed failing within grace period, keeping last snapshot");
            return;
        }

        warn!(age_ms, "Feed failing past grace period, clearing displayed entities");
        self.entities.clear();
        for id in self.rendered.drain() {
            sink.remove_entity(&id);
        }
        self.last_success = None;
    }

    /// Show or hide the view. Hiding suppresses sink traffic while polling
    /// and state maintenance continue; showing replays the diff accumulated
    /// in the meantime.
    pub fn set_visible(&mut self, visible: bool, sink: &mut dyn RenderSink) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        if !visible {
            return;
        }

        let stale: Vec<String> = self
            .rendered
            .iter()
            .filter(|id| !self.entities.contains_key(*id))
            .cloned()
            .collect();
        for id in stale {
            self.rendered.remove(&id);
            sink.remove_entity(&id);
        }
        for entry in self.entities.iter() {
            if self.rendered.contains(entry.key()) {
                sink.update_entity(entry.value());
            } else {
                sink.add_entity(entry.value());
                self.rendered.insert(entry.key().clone());
            }
        }
    }
}

impl Default for ReconcilerState {
    fn default() -> Self {
        Self::new()
    }
}
