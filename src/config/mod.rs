use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Complete mapfeed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MapFeedConfig {
    #[serde(default)]
    pub vehicles: VehiclesConfig,
    #[serde(default)]
    pub villages: VillagesConfig,
    #[serde(default)]
    pub transit: TransitConfig,
}

/// Live vehicle positions feed
#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesConfig {
    #[serde(default = "default_vehicles_enabled")]
    pub enabled: bool,
    #[serde(default = "default_vehicles_url")]
    pub url: String,
    /// Poll interval (milliseconds)
    #[serde(default = "default_vehicles_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Tolerated failure window before the display falls back to empty
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Per-request deadline
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_vehicles_enabled() -> bool {
    true
}

fn default_vehicles_url() -> String {
    "https://tracking.tfemf.uk/media/gtfs-rt.json".to_string()
}

fn default_vehicles_poll_interval_ms() -> u64 {
    2500
}

fn default_grace_period_ms() -> u64 {
    60_000
}

fn default_timeout_ms() -> u64 {
    8000
}

impl VehiclesConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for VehiclesConfig {
    fn default() -> Self {
        Self {
            enabled: default_vehicles_enabled(),
            url: default_vehicles_url(),
            poll_interval_ms: default_vehicles_poll_interval_ms(),
            grace_period_ms: default_grace_period_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Villages GeoJSON feed
#[derive(Debug, Clone, Deserialize)]
pub struct VillagesConfig {
    #[serde(default = "default_villages_enabled")]
    pub enabled: bool,
    #[serde(default = "default_villages_url")]
    pub url: String,
    /// Poll interval (milliseconds)
    #[serde(default = "default_villages_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Tolerated failure window before the display falls back to empty
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Per-request deadline
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_villages_enabled() -> bool {
    true
}

fn default_villages_url() -> String {
    "https://www.emfcamp.org/api/villages.geojson".to_string()
}

fn default_villages_poll_interval_ms() -> u64 {
    20_000
}

impl VillagesConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for VillagesConfig {
    fn default() -> Self {
        Self {
            enabled: default_villages_enabled(),
            url: default_villages_url(),
            poll_interval_ms: default_villages_poll_interval_ms(),
            grace_period_ms: default_grace_period_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Static transit data and departure boards
#[derive(Debug, Clone, Deserialize)]
pub struct TransitConfig {
    #[serde(default = "default_gtfs_url")]
    pub gtfs_url: String,
    #[serde(default = "default_departure_board_url")]
    pub departure_board_url: String,
    /// Departure-board lookahead (minutes)
    #[serde(default = "default_board_duration_minutes")]
    pub board_duration_minutes: u32,
    /// Per-request deadline
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_gtfs_url() -> String {
    "https://tracking.tfemf.uk/media/gtfs.json".to_string()
}

fn default_departure_board_url() -> String {
    "https://tracking.tfemf.uk/hafas".to_string()
}

fn default_board_duration_minutes() -> u32 {
    240
}

impl TransitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            gtfs_url: default_gtfs_url(),
            departure_board_url: default_departure_board_url(),
            board_duration_minutes: default_board_duration_minutes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for MapFeedConfig {
    fn default() -> Self {
        Self {
            vehicles: VehiclesConfig::default(),
            villages: VillagesConfig::default(),
            transit: TransitConfig::default(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<MapFeedConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: MapFeedConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MapFeedConfig::default();
        assert!(config.vehicles.enabled);
        assert_eq!(config.vehicles.poll_interval_ms, 2500);
        assert_eq!(config.vehicles.grace_period_ms, 60_000);
        assert_eq!(config.villages.poll_interval_ms, 20_000);
        assert_eq!(config.transit.board_duration_minutes, 240);
        assert_eq!(config.transit.timeout_ms, 8000);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [vehicles]
            enabled = true
            url = "http://localhost:9000/gtfs-rt.json"
            poll_interval_ms = 1000
            grace_period_ms = 30000

            [villages]
            enabled = false
            poll_interval_ms = 60000

            [transit]
            gtfs_url = "http://localhost:9000/gtfs.json"
            board_duration_minutes = 60
        "#;

        let config: MapFeedConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.vehicles.url, "http://localhost:9000/gtfs-rt.json");
        assert_eq!(config.vehicles.poll_interval_ms, 1000);
        assert_eq!(config.vehicles.grace_period_ms, 30_000);
        assert!(!config.villages.enabled);
        assert_eq!(config.villages.poll_interval_ms, 60_000);
        assert_eq!(config.transit.board_duration_minutes, 60);
    }

    #[test]
    fn test_partial_config() {
        // Missing sections and fields use defaults
        let toml = r#"
            [vehicles]
            poll_interval_ms = 5000
        "#;

        let config: MapFeedConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.vehicles.poll_interval_ms, 5000);
        assert_eq!(config.vehicles.grace_period_ms, 60_000); // Default
        assert!(config.villages.enabled); // Default
        assert_eq!(config.transit.timeout_ms, 8000); // Default
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[villages]\nurl = \"http://localhost:2342/api/villages.geojson\""
        )
        .unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(
            config.villages.url,
            "http://localhost:2342/api/villages.geojson"
        );
        assert_eq!(config.vehicles.poll_interval_ms, 2500);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/no/such/config.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn durations_convert_from_millis() {
        let config = MapFeedConfig::default();
        assert_eq!(config.vehicles.poll_interval(), Duration::from_millis(2500));
        assert_eq!(config.villages.grace_period(), Duration::from_secs(60));
        assert_eq!(config.transit.timeout(), Duration::from_secs(8));
    }
}
