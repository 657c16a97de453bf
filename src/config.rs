use crate::proximity::{validate_radius, DEFAULT_RADIUS_MILES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub api: ApiConfig,
    pub location: LocationConfig,
    pub map: MapConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,          // Event API root, e.g. http://localhost:5000
    pub search_url: String,        // Address search endpoint (Nominatim compatible)
    pub poll_interval_seconds: u64,
    pub timeout_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocationConfig {
    pub auto_detect: bool, // Use IP geolocation if true
    pub lookup_ip: String, // Address to geolocate; empty means this machine
    pub manual_lat: f64,   // Used if auto_detect is false
    pub manual_lng: f64,
    pub radius_miles: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub default_zoom: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                base_url: "http://localhost:5000".to_string(),
                search_url: "https://nominatim.openstreetmap.org/search".to_string(),
                poll_interval_seconds: 60,
                timeout_seconds: 10,
            },
            location: LocationConfig {
                auto_detect: true,
                lookup_ip: String::new(),
                manual_lat: 39.9526,
                manual_lng: -75.1652,
                radius_miles: DEFAULT_RADIUS_MILES,
            },
            map: MapConfig { default_zoom: 7 },
        }
    }
}

impl Config {
    /// Loads config.toml from the working directory.
    /// If it doesn't exist, creates a default one.
    pub fn load() -> Self {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str(&content) {
                Ok(config) => return Self::sanitized(config),
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    return Config::default();
                }
            }
        }

        // Save default config to disk for the user to edit later
        let default_config = Config::default();
        match toml::to_string_pretty(&default_config) {
            Ok(toml_string) => {
                if fs::write(path, toml_string).is_err() {
                    warn!("Could not write default {} to disk.", path.display());
                }
            }
            Err(e) => warn!("Could not serialize default config: {}", e),
        }

        info!("Loaded default configuration.");
        default_config
    }

    /// Replaces values the app cannot run with by their defaults.
    fn sanitized(mut config: Config) -> Config {
        if let Err(e) = validate_radius(config.location.radius_miles) {
            warn!("{}; using {} mi instead", e, DEFAULT_RADIUS_MILES);
            config.location.radius_miles = DEFAULT_RADIUS_MILES;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path);
        assert_eq!(config, Config::default());
        assert_eq!(config.location.radius_miles, 20.0);

        let written = fs::read_to_string(&path).unwrap();
        let reparsed: Config = toml::from_str(&written).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[api]
base_url = "https://events.example.org"
search_url = "https://search.example.org"
poll_interval_seconds = 15
timeout_seconds = 5

[location]
auto_detect = false
lookup_ip = ""
manual_lat = 40.0
manual_lng = -75.0
radius_miles = 35.0

[map]
default_zoom = 9
"#,
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.api.base_url, "https://events.example.org");
        assert!(!config.location.auto_detect);
        assert_eq!(config.location.radius_miles, 35.0);
        assert_eq!(config.map.default_zoom, 9);
    }

    #[test]
    fn negative_radius_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut on_disk = Config::default();
        on_disk.location.radius_miles = -1.0;
        on_disk.api.poll_interval_seconds = 30;
        fs::write(&path, toml::to_string_pretty(&on_disk).unwrap()).unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.location.radius_miles, DEFAULT_RADIUS_MILES);
        assert_eq!(config.api.poll_interval_seconds, 30);
        assert!(crate::app::App::new(config).is_ok());
    }

    #[test]
    fn malformed_file_falls_back_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "not = [valid").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "not = [valid");
    }
}
