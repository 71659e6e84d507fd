//! Poll scheduling for one feed.
//!
//! One spawned task per feed drives sequential fetch→reconcile cycles on a
//! fixed interval. A cycle never starts while the previous one is in flight,
//! so snapshots apply in completion order by construction.

use super::{ReconcilerState, RenderSink};
use crate::feed::{Entity, FeedSource};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Per-feed polling parameters. The deployed feeds run different values;
/// nothing here is shared or hard-coded.
#[derive(Clone, Copy, Debug)]
pub struct PollOptions {
    /// Time between poll ticks
    pub interval: Duration,

    /// How long fetch failures are tolerated before the display falls back
    /// to empty
    pub grace_period: Duration,
}

/// Owns a feed, a sink and the reconciliation state; `spawn` turns it into
/// a background polling task.
pub struct Reconciler {
    feed: Arc<dyn FeedSource>,
    sink: Box<dyn RenderSink>,
    client: reqwest::Client,
    options: PollOptions,
}

impl Reconciler {
    pub fn new(feed: Arc<dyn FeedSource>, sink: Box<dyn RenderSink>, options: PollOptions) -> Self {
        Self {
            feed,
            sink,
            client: reqwest::Client::new(),
            options,
        }
    }

    /// Use a shared HTTP client instead of a fresh one.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Start polling (non-blocking).
    ///
    /// The first fetch fires on the task's first tick, never synchronously
    /// with this call. Returns a handle for state reads, visibility control
    /// and teardown.
    pub fn spawn(self) -> ReconcilerHandle {
        let Reconciler {
            feed,
            mut sink,
            client,
            options,
        } = self;

        let name = feed.name().to_string();
        let (visible_tx, visible_rx) = watch::channel(true);
        let mut state = ReconcilerState::new();
        let entities = state.entities();

        let task = tokio::spawn(async move {
            info!(
                feed = %feed.name(),
                interval_ms = options.interval.as_millis() as u64,
                grace_period_ms = options.grace_period.as_millis() as u64,
                "Starting feed poller"
            );

            let mut ticker = interval(options.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                // Visibility changes apply at tick boundaries; a reveal
                // replays everything that changed while hidden.
                state.set_visible(*visible_rx.borrow(), sink.as_mut());

                debug!(feed = %feed.name(), "Polling feed");
                match feed.poll(&client).await {
                    Ok(snapshot) => {
                        debug!(
                            feed = %feed.name(),
                            entities = snapshot.entities.len(),
                            "Applying snapshot"
                        );
                        let fetched_at = snapshot.fetched_at;
                        state.apply_snapshot(snapshot, fetched_at, sink.as_mut());
                    }
                    Err(e) => {
                        warn!(feed = %feed.name(), error = %e, "Feed poll failed");
                        state.record_failure(options.grace_period, Utc::now(), sink.as_mut());
                    }
                }
            }
        });

        ReconcilerHandle {
            name,
            task,
            entities,
            visible: visible_tx,
        }
    }
}

/// Handle to a running reconciler.
pub struct ReconcilerHandle {
    name: String,
    task: JoinHandle<()>,
    entities: Arc<DashMap<String, Entity>>,
    visible: watch::Sender<bool>,
}

impl ReconcilerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the tracked entities. Last-write-wins per tick; no
    /// transactional guarantee across reads.
    pub fn entities(&self) -> Vec<Entity> {
        self.entities.iter().map(|e| e.value().clone()).collect()
    }

    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.entities.get(id).map(|e| e.clone())
    }

    /// Show or hide the owning view; takes effect on the next poll tick.
    /// Polling continues either way.
    pub fn set_visible(&self, visible: bool) {
        let _ = self.visible.send(visible);
    }

    /// Stop polling. Aborts the task at its current await point: a fetch
    /// still in flight is cancelled and its snapshot is never applied, so
    /// the sink sees no calls after this returns.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
