use reqwest::blocking::Client;
use serde_json::Value;

use super::{fetch_json, GeocodeError, Geocoder, Place};
use crate::normalize::fields::{list, pluck, text_or};

pub const DEFAULT_BASE_URL: &str = "https://api.opencagedata.com";

pub struct OpenCageGeocoder {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenCageGeocoder {
    pub fn new(client: Client, base_url: Option<String>, api_key: String) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        OpenCageGeocoder {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

impl Geocoder for OpenCageGeocoder {
    fn name(&self) -> &'static str {
        "opencage"
    }

    fn reverse(&self, lat: f64, lon: f64) -> Result<Option<Place>, GeocodeError> {
        let request = self
            .client
            .get(format!("{}/geocode/v1/json", self.base_url))
            .query(&[
                ("q", format!("{}+{}", lat, lon)),
                ("key", self.api_key.clone()),
                ("language", "en".to_string()),
                ("limit", "1".to_string()),
                ("no_annotations", "1".to_string()),
            ]);
        Ok(parse_results(&fetch_json(request)?))
    }
}

fn parse_results(body: &Value) -> Option<Place> {
    let best = list(body, &["results"]).first()?;
    let formatted = text_or(best, &["formatted"], "");
    if formatted.is_empty() {
        return None;
    }
    let components = pluck(best, &["components"]).unwrap_or(&Value::Null);
    Some(Place::from_components(formatted, components))
}
