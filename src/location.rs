//! User location resolution and address search.
//!
//! [`current_location`] produces the coordinate the proximity ranking is
//! centered on, either from IP geolocation (IpApi) or from the manual position
//! in the config. Unlike a plain lookup with a hard-coded fallback, failures
//! are reported as [`LocationUnavailable`] so the view model can switch to the
//! unranked listing instead of pretending the user is somewhere else.
//!
//! [`AddressSearch`] queries a Nominatim-compatible endpoint and turns its
//! `{ display_name, lat, lon }` hits into [`AddressCandidate`]s.

use crate::config::LocationConfig;
use crate::error::{FetchError, LocationUnavailable};
use crate::geo::Coordinate;
use crate::models::AddressCandidate;
use ipgeolocate::{Locator, Service};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Resolves the user's position.
///
/// With `auto_detect` off, the configured manual coordinate is used as-is.
/// Otherwise the IpApi service is asked about `lookup_ip`.
///
/// # Errors
///
/// [`LocationUnavailable`] when the service fails, returns an unparsable
/// position, or the manual coordinate is out of range.
pub async fn current_location(config: &LocationConfig) -> Result<Coordinate, LocationUnavailable> {
    if !config.auto_detect {
        return Coordinate::new(config.manual_lat, config.manual_lng).map_err(|e| {
            error!("Manual location in config is invalid: {}", e);
            LocationUnavailable::new(format!("manual location is invalid: {e}"))
        });
    }

    // Using IpApi as the service, it's pretty reliable.
    match Locator::get(&config.lookup_ip, Service::IpApi).await {
        Ok(loc) => {
            let coordinate = parse_position(&loc.latitude, &loc.longitude)?;
            info!("Geolocation successful - {}", coordinate);
            Ok(coordinate)
        }
        Err(e) => {
            error!("Error using geolocation service: {}", e);
            Err(LocationUnavailable::new(format!("geolocation service failed: {e}")))
        }
    }
}

fn parse_position(lat: &str, lng: &str) -> Result<Coordinate, LocationUnavailable> {
    let (Ok(lat), Ok(lng)) = (lat.trim().parse::<f64>(), lng.trim().parse::<f64>()) else {
        return Err(LocationUnavailable::new(format!(
            "geolocation returned an unreadable position ({lat}, {lng})"
        )));
    };
    Coordinate::new(lat, lng).map_err(|e| LocationUnavailable::new(e.to_string()))
}

/// A raw search hit. Nominatim sends `lat`/`lon` as strings; other providers
/// send numbers.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub display_name: Option<String>,
    pub lat: Option<serde_json::Value>,
    pub lon: Option<serde_json::Value>,
}

fn as_degrees(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Keeps the hits that carry a name and a valid position, in provider order.
pub fn parse_candidates(hits: Vec<SearchHit>) -> Vec<AddressCandidate> {
    hits.into_iter()
        .filter_map(|hit| {
            let name = hit.display_name.filter(|n| !n.trim().is_empty());
            let lat = hit.lat.as_ref().and_then(as_degrees);
            let lon = hit.lon.as_ref().and_then(as_degrees);
            match (name, lat, lon) {
                (Some(display_name), Some(lat), Some(lon)) => match Coordinate::new(lat, lon) {
                    Ok(coordinate) => Some(AddressCandidate {
                        display_name,
                        coordinate,
                    }),
                    Err(e) => {
                        warn!("Dropping search hit '{}': {}", display_name, e);
                        None
                    }
                },
                _ => {
                    warn!("Dropping incomplete search hit");
                    None
                }
            }
        })
        .collect()
}

pub struct AddressSearch {
    client: Client,
    url: String,
}

impl AddressSearch {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("charity-map/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Looks up `query`. An empty query or a search with no usable hits
    /// yields an empty list rather than an error.
    pub async fn search(&self, query: &str) -> Result<Vec<AddressCandidate>, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let res = self
            .client
            .get(&self.url)
            .query(&[("format", "json"), ("limit", "5"), ("q", query)])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("search failed").to_string(),
            });
        }

        let hits = res
            .json::<Vec<SearchHit>>()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        let candidates = parse_candidates(hits);
        info!("Address search for '{}' returned {} candidates", query, candidates.len());
        Ok(candidates)
    }
}
