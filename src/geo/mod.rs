pub mod nominatim;
pub mod opencage;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::normalize::fields::{text_or, NOT_AVAILABLE};
use crate::settings::{GeocoderKind, Settings};

pub const LOCATION_NOT_AVAILABLE: &str = "Location Not Available";
pub const LOCATION_NOT_FOUND: &str = "Location Not Found";

/// Address breakdown for one coordinate pair. Every text field is populated,
/// with sentinels standing in for anything the lookup could not provide.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoResolution {
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl GeoResolution {
    fn sentinel(address: &str, lat: Option<f64>, lon: Option<f64>) -> Self {
        GeoResolution {
            address: address.to_string(),
            city: NOT_AVAILABLE.to_string(),
            state: NOT_AVAILABLE.to_string(),
            country: NOT_AVAILABLE.to_string(),
            postal_code: NOT_AVAILABLE.to_string(),
            lat,
            lon,
        }
    }

    pub fn not_available(lat: Option<f64>, lon: Option<f64>) -> Self {
        Self::sentinel(LOCATION_NOT_AVAILABLE, lat, lon)
    }

    pub fn not_found(lat: f64, lon: f64) -> Self {
        Self::sentinel(LOCATION_NOT_FOUND, Some(lat), Some(lon))
    }

    fn from_place(place: Place, lat: f64, lon: f64) -> Self {
        let or_na = |v: Option<String>| v.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        GeoResolution {
            address: place.formatted,
            city: or_na(place.city.or(place.town).or(place.village)),
            state: or_na(place.state),
            country: or_na(place.country),
            postal_code: or_na(place.postcode),
            lat: Some(lat),
            lon: Some(lon),
        }
    }
}

/// Best match returned by a reverse-geocoding provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Place {
    pub formatted: String,
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
}

impl Place {
    /// Both providers report components under the same OSM-style keys.
    pub fn from_components(formatted: String, components: &Value) -> Self {
        let field = |key: &str| {
            Some(text_or(components, &[key], ""))
                .filter(|v| !v.trim().is_empty())
        };
        Place {
            formatted,
            city: field("city"),
            town: field("town"),
            village: field("village"),
            state: field("state"),
            country: field("country"),
            postcode: field("postcode"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request timed out")]
    Timeout,
    #[error("geocoding service returned HTTP {0}")]
    Status(u16),
    #[error("geocoding request failed: {0}")]
    Transport(reqwest::Error),
    #[error("geocoding response was not valid JSON: {0}")]
    Decode(reqwest::Error),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GeocodeError::Timeout
        } else if e.is_decode() {
            GeocodeError::Decode(e)
        } else {
            GeocodeError::Transport(e)
        }
    }
}

/// Reverse lookup: coordinates to the single best address match, or `None`
/// when the provider has nothing for that point.
pub trait Geocoder {
    fn name(&self) -> &'static str;
    fn reverse(&self, lat: f64, lon: f64) -> Result<Option<Place>, GeocodeError>;
}

pub(crate) fn fetch_json(request: RequestBuilder) -> Result<Value, GeocodeError> {
    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(GeocodeError::Status(status.as_u16()));
    }
    Ok(response.json()?)
}

/// Best-effort address enrichment. Never fails: a missing provider, missing
/// coordinates, or a failed lookup all degrade to sentinel values.
pub struct GeoEnricher {
    geocoder: Option<Box<dyn Geocoder>>,
    cache: HashMap<(u64, u64), GeoResolution>,
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl GeoEnricher {
    pub fn new(geocoder: Box<dyn Geocoder>) -> Self {
        GeoEnricher {
            geocoder: Some(geocoder),
            cache: HashMap::new(),
            min_interval: Duration::ZERO,
            last_call: None,
        }
    }

    pub fn disabled() -> Self {
        GeoEnricher {
            geocoder: None,
            cache: HashMap::new(),
            min_interval: Duration::ZERO,
            last_call: None,
        }
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, GeocodeError> {
        if !settings.geocode {
            return Ok(Self::disabled());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.geocode_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;
        let base = settings.geocoder_url.clone();
        let geocoder: Box<dyn Geocoder> = match settings.geocoder {
            GeocoderKind::Nominatim => Box::new(nominatim::NominatimGeocoder::new(client, base)),
            GeocoderKind::OpenCage => Box::new(opencage::OpenCageGeocoder::new(
                client,
                base,
                settings.geocoder_key.clone().unwrap_or_default(),
            )),
        };

        Ok(Self::new(geocoder)
            .with_min_interval(Duration::from_millis(settings.geocode_interval_ms)))
    }

    pub fn is_enabled(&self) -> bool {
        self.geocoder.is_some()
    }

    pub fn resolve(&mut self, lat: Option<f64>, lon: Option<f64>) -> GeoResolution {
        let (Some(lat), Some(lon)) = (lat, lon) else {
            return GeoResolution::not_available(lat, lon);
        };

        let key = (lat.to_bits(), lon.to_bits());
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }

        let Some(geocoder) = self.geocoder.as_deref() else {
            return GeoResolution::not_available(Some(lat), Some(lon));
        };

        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        let outcome = geocoder.reverse(lat, lon);
        self.last_call = Some(Instant::now());

        let resolution = match outcome {
            Ok(Some(place)) => GeoResolution::from_place(place, lat, lon),
            Ok(None) => {
                debug!(lat, lon, provider = geocoder.name(), "no address match");
                GeoResolution::not_found(lat, lon)
            }
            Err(e) => {
                // Transient; leave it out of the cache so a later record can retry.
                debug!(lat, lon, provider = geocoder.name(), error = %e, "reverse geocoding failed");
                return GeoResolution::not_found(lat, lon);
            }
        };

        self.cache.insert(key, resolution.clone());
        resolution
    }
}
