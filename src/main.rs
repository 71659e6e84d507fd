use anyhow::{Context, Result};
use mapfeed::config::{load_config, MapFeedConfig};
use mapfeed::feed::{Entity, VehicleFeed, VillageFeed};
use mapfeed::reconcile::{PollOptions, Reconciler, ReconcilerHandle, RenderSink};
use mapfeed::transit::TransitDirectory;
use std::sync::Arc;
use tracing::{info, warn};

/// The daemon's rendering layer: entity changes become log lines.
struct LogSink {
    feed: String,
}

impl LogSink {
    fn new(feed: &str) -> Self {
        Self {
            feed: feed.to_string(),
        }
    }
}

impl RenderSink for LogSink {
    fn add_entity(&mut self, entity: &Entity) {
        info!(
            feed = %self.feed,
            entity_id = %entity.id,
            lng = entity.position.lng,
            lat = entity.position.lat,
            "Entity appeared"
        );
    }

    fn update_entity(&mut self, entity: &Entity) {
        info!(
            feed = %self.feed,
            entity_id = %entity.id,
            lng = entity.position.lng,
            lat = entity.position.lat,
            "Entity moved"
        );
    }

    fn remove_entity(&mut self, id: &str) {
        info!(feed = %self.feed, entity_id = %id, "Entity vanished");
    }
}

/// Top-level application context. Owns the running reconcilers; nothing
/// lives in ambient globals.
struct App {
    handles: Vec<ReconcilerHandle>,
}

impl App {
    fn stop_all(&self) {
        for handle in &self.handles {
            info!(feed = %handle.name(), "Stopping reconciler");
            handle.stop();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mapfeed=info".into()),
        )
        .init();

    info!("mapfeed starting...");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        load_config(&config_path).context("Failed to load configuration")?
    } else {
        info!(path = %config_path, "No config file found, using defaults");
        MapFeedConfig::default()
    };

    let client = reqwest::Client::builder()
        .user_agent(concat!("mapfeed/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    // The directory is best-effort: vehicles still track without it, just
    // with raw ids instead of display names.
    let directory = if config.vehicles.enabled {
        match TransitDirectory::load(&client, &config.transit.gtfs_url, config.transit.timeout())
            .await
        {
            Ok(directory) => Arc::new(directory),
            Err(e) => {
                warn!(error = %e, "Failed to load transit directory, continuing without");
                Arc::new(TransitDirectory::empty())
            }
        }
    } else {
        Arc::new(TransitDirectory::empty())
    };

    let mut app = App {
        handles: Vec::new(),
    };

    if config.vehicles.enabled {
        let feed = Arc::new(VehicleFeed::new(
            config.vehicles.url.clone(),
            Arc::clone(&directory),
            config.vehicles.timeout(),
        ));
        let handle = Reconciler::new(
            feed,
            Box::new(LogSink::new("vehicles")),
            PollOptions {
                interval: config.vehicles.poll_interval(),
                grace_period: config.vehicles.grace_period(),
            },
        )
        .with_client(client.clone())
        .spawn();
        app.handles.push(handle);
    }

    if config.villages.enabled {
        let feed = Arc::new(VillageFeed::new(
            config.villages.url.clone(),
            config.villages.timeout(),
        ));
        let handle = Reconciler::new(
            feed,
            Box::new(LogSink::new("villages")),
            PollOptions {
                interval: config.villages.poll_interval(),
                grace_period: config.villages.grace_period(),
            },
        )
        .with_client(client.clone())
        .spawn();
        app.handles.push(handle);
    }

    if app.handles.is_empty() {
        warn!("No feeds enabled, nothing to do");
        return Ok(());
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down");
    app.stop_all();

    Ok(())
}
