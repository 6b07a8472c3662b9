use reqwest::blocking::Client;
use serde_json::Value;

use super::{fetch_json, GeocodeError, Geocoder, Place};
use crate::normalize::fields::{pluck, text_or};

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// OpenStreetMap Nominatim `/reverse`. The public instance rejects requests
/// without a User-Agent, which the shared client carries.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(client: Client, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        NominatimGeocoder {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    fn reverse(&self, lat: f64, lon: f64) -> Result<Option<Place>, GeocodeError> {
        let request = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("accept-language", "en".to_string()),
                ("addressdetails", "1".to_string()),
            ]);
        Ok(parse_reverse(&fetch_json(request)?))
    }
}

/// Unresolvable points come back as 200 with `{"error": "Unable to geocode"}`.
fn parse_reverse(body: &Value) -> Option<Place> {
    if pluck(body, &["error"]).is_some() {
        return None;
    }
    let formatted = text_or(body, &["display_name"], "");
    let address = pluck(body, &["address"])?;
    if formatted.is_empty() {
        return None;
    }
    Some(Place::from_components(formatted, address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_http::StubServer;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};
    use serde_json::json;

    #[test]
    fn parses_jsonv2_reverse() {
        let body = json!({
            "place_id": 1,
            "lat": "-37.8093",
            "lon": "144.9644",
            "display_name": "RMIT, Swanston Street, Melbourne, Victoria, 3000, Australia",
            "address": {
                "amenity": "RMIT",
                "road": "Swanston Street",
                "city": "Melbourne",
                "state": "Victoria",
                "postcode": "3000",
                "country": "Australia",
                "country_code": "au"
            }
        });
        let place = parse_reverse(&body).unwrap();
        assert_eq!(place.formatted, "RMIT, Swanston Street, Melbourne, Victoria, 3000, Australia");
        assert_eq!(place.city.as_deref(), Some("Melbourne"));
        assert_eq!(place.postcode.as_deref(), Some("3000"));
        assert_eq!(place.town, None);
    }

    #[test]
    fn error_body_is_no_match() {
        assert_eq!(parse_reverse(&json!({ "error": "Unable to geocode" })), None);
    }

    #[test]
    fn missing_address_is_no_match() {
        assert_eq!(parse_reverse(&json!({ "display_name": "Somewhere" })), None);
    }

    #[test]
    fn trims_trailing_slash_from_base() {
        let g = NominatimGeocoder::new(Client::new(), Some("http://localhost:8080/".into()));
        assert_eq!(g.base_url, "http://localhost:8080");
    }

    #[test]
    fn reverse_asks_for_english_address_details() {
        let stub = StubServer::start();
        stub.mount(
            Mock::given(method("GET"))
                .and(path("/reverse"))
                .and(query_param("format", "jsonv2"))
                .and(query_param("lat", "-37.8"))
                .and(query_param("lon", "144.9"))
                .and(query_param("accept-language", "en"))
                .and(query_param("addressdetails", "1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "display_name": "Carlton, Melbourne, Victoria, 3053, Australia",
                    "address": { "suburb": "Carlton", "city": "Melbourne", "state": "Victoria", "country": "Australia" }
                }))),
        );

        let g = NominatimGeocoder::new(Client::new(), Some(stub.uri()));
        let place = g.reverse(-37.8, 144.9).unwrap().unwrap();
        assert_eq!(place.city.as_deref(), Some("Melbourne"));
        assert_eq!(place.postcode, None);
    }

    #[test]
    fn server_error_is_a_status_error() {
        let stub = StubServer::start();
        stub.mount(
            Mock::given(method("GET"))
                .and(path("/reverse"))
                .respond_with(ResponseTemplate::new(503)),
        );

        let g = NominatimGeocoder::new(Client::new(), Some(stub.uri()));
        assert!(matches!(g.reverse(1.0, 2.0), Err(GeocodeError::Status(503))));
    }

    #[test]
    fn slow_response_is_a_timeout() {
        let stub = StubServer::start();
        stub.mount(
            Mock::given(method("GET"))
                .and(path("/reverse"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "error": "Unable to geocode" }))
                        .set_delay(Duration::from_secs(2)),
                ),
        );

        let client = Client::builder().timeout(Duration::from_millis(200)).build().unwrap();
        let g = NominatimGeocoder::new(client, Some(stub.uri()));
        assert!(matches!(g.reverse(1.0, 2.0), Err(GeocodeError::Timeout)));
    }
}
