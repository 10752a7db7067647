//! Resolve place names to coordinates
//!
//! Lookups never fail: a name that is not found, a rejected key or an HTTP
//! failure all resolve to `None`, and the pipeline carries the name forward as
//! an unresolved placeholder. Only building the resolver can fail.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeocodingConfig;
use crate::domain::LatLng;

/// Resolver construction failure
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Failed to build geocoding client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Place-name resolution
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve `name` to a coordinate, or `None` if it cannot be found
    async fn resolve(&self, name: &str) -> Option<LatLng>;
}

/// Google Geocoding API client
pub struct GoogleGeocoder {
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

impl GoogleGeocoder {
    /// Create a geocoder from configuration
    ///
    /// Without an API key every lookup resolves to `None`.
    pub fn from_config(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let api_key = config.api_key();
        if api_key.is_none() {
            warn!(env_var = %config.api_key_env, "from_config: geocoding API key not set, locations will not resolve");
        }
        let http = Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            api_key,
            base_url: config.base_url.clone(),
            http,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

/// Interpret a Geocoding API response body
fn parse_response(name: &str, body: GeocodeResponse) -> Option<LatLng> {
    match body.status.as_str() {
        "OK" => {
            let coords = body.results.into_iter().next().map(|r| r.geometry.location);
            if coords.is_none() {
                warn!(%name, "parse_response: OK status without results");
            }
            coords
        }
        "ZERO_RESULTS" => {
            warn!(%name, "parse_response: no results");
            None
        }
        "REQUEST_DENIED" => {
            warn!(%name, error_message = ?body.error_message, "parse_response: request denied, check the geocoding API key");
            None
        }
        other => {
            warn!(%name, status = %other, error_message = ?body.error_message, "parse_response: lookup failed");
            None
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn resolve(&self, name: &str) -> Option<LatLng> {
        debug!(%name, "resolve: called");
        let Some(api_key) = &self.api_key else {
            debug!(%name, "resolve: no API key, skipping lookup");
            return None;
        };

        let response = match self
            .http
            .get(&self.base_url)
            .query(&[("address", name), ("key", api_key.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(%name, error = %e, "resolve: request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%name, %status, "resolve: HTTP error");
            return None;
        }

        match response.json::<GeocodeResponse>().await {
            Ok(body) => {
                let coords = parse_response(name, body);
                debug!(%name, ?coords, "resolve: done");
                coords
            }
            Err(e) => {
                warn!(%name, error = %e, "resolve: malformed response body");
                None
            }
        }
    }
}
