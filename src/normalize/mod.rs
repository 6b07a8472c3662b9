pub mod fields;
pub mod modes;
pub mod text;

use itertools::Itertools;
use serde_json::Value;
use thiserror::Error;

use crate::api::ApiError;
use crate::export::CourseRow;
use crate::geo::GeoEnricher;
use fields::{coordinate, list, pluck, text, NOT_AVAILABLE};
use text::clean_value;

const CAREER_FEATURE_CODE: &str = "CAREER-OPP";

static NULL: Value = Value::Null;

/// A single course that could not be turned into a row. The run carries on.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("detail fetch failed: {source}")]
    Detail {
        id: String,
        #[source]
        source: ApiError,
    },
    #[error("search hit is not a JSON object")]
    Malformed { id: String },
}

impl RecordError {
    pub fn id(&self) -> &str {
        match self {
            RecordError::Detail { id, .. } | RecordError::Malformed { id } => id,
        }
    }
}

pub fn record_id(hit: &Value) -> String {
    text(hit, &["_id"])
}

/// Map one search hit onto the output schema.
///
/// `detail` is the per-course document when one was fetched; its `_source`
/// then replaces the hit's. The title always comes from the hit. Delivery
/// modes are left as raw codes for [`modes::apply_delivery_modes`].
pub fn normalize_course(
    hit: &Value,
    detail: Option<&Value>,
    geo: &mut GeoEnricher,
) -> Result<CourseRow, RecordError> {
    let id = record_id(hit);
    if !hit.is_object() {
        return Err(RecordError::Malformed { id });
    }

    let source = pluck(detail.unwrap_or(hit), &["_source"]).unwrap_or(&NULL);
    let features = list(source, &["features"]);

    // Positional: the API happens to list admission criteria first.
    let prerequisites = features
        .first()
        .map(|f| clean_value(pluck(f, &["value"]), NOT_AVAILABLE))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let (delivery_mode_1, delivery_mode_2) =
        modes::split_attendance_modes(pluck(source, &["attendanceModes"]));

    let (lat, lon) = course_coordinates(source);
    let place = geo.resolve(lat, lon);
    let location = campus_location(list(source, &["campuses"]), &place.address);
    let render = |v: Option<f64>| v.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string());

    Ok(CourseRow {
        course_id: id,
        title: text(hit, &["_source", "name"]),
        institution_name: text(source, &["institutionName"]),
        level_of_qualification: text(source, &["levelOfQualificationDesc"]),
        study_area: text(source, &["studyArea"]),
        course_overview: clean_value(pluck(source, &["description"]), NOT_AVAILABLE),
        prerequisites,
        atar_highest: text(source, &["atarProfile", "highestAtarUnadjusted"]),
        atar_median: text(source, &["atarProfile", "medianAtarUnadjusted"]),
        atar_lowest: text(source, &["atarProfile", "lowestAtarUnadjusted"]),
        delivery_mode_1,
        delivery_mode_2,
        // "N/A years" when the duration is missing; downstream sheets expect it.
        full_time_duration: format!("{} years", text(source, &["fullTime"])),
        part_time_duration: text(source, &["partTime"]),
        course_code: text(source, &["courseCodeTac"]),
        career_outcome: career_outcome(features),
        fees: text(source, &["fees"]),
        fees_link: text(source, &["tacLink"]),
        location,
        address: place.address,
        city: place.city,
        state: place.state,
        country: place.country,
        postal_code: place.postal_code,
        lat: render(place.lat),
        lon: render(place.lon),
    })
}

/// Cleaned text of the first `CAREER-OPP` feature. Blank rather than `N/A`
/// when there is none.
fn career_outcome(features: &[Value]) -> String {
    features
        .iter()
        .find(|f| pluck(f, &["code"]).and_then(Value::as_str) == Some(CAREER_FEATURE_CODE))
        .map(|f| clean_value(pluck(f, &["value"]), NOT_AVAILABLE))
        .filter(|v| v != NOT_AVAILABLE)
        .unwrap_or_default()
}

/// Course-level coordinates, else the first campus's.
fn course_coordinates(source: &Value) -> (Option<f64>, Option<f64>) {
    let lat = coordinate(source, &["geolocation", "lat"]);
    let lon = coordinate(source, &["geolocation", "lon"]);
    if lat.is_some() && lon.is_some() {
        return (lat, lon);
    }
    match list(source, &["campuses"]).first() {
        Some(campus) => (
            coordinate(campus, &["geolocation", "lat"]),
            coordinate(campus, &["geolocation", "lon"]),
        ),
        None => (lat, lon),
    }
}

fn campus_location(campuses: &[Value], address: &str) -> String {
    let names = campuses
        .iter()
        .map(|c| format!("{}, {}", text(c, &["campusName"]), text(c, &["state"])))
        .join("; ");
    if names.is_empty() {
        format!("({})", address)
    } else {
        format!("{} ({})", names, address)
    }
}
