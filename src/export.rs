use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// One output line. Field order is column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseRow {
    #[serde(rename = "Course ID")]
    pub course_id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Institution Name")]
    pub institution_name: String,
    #[serde(rename = "Level of Qualification")]
    pub level_of_qualification: String,
    #[serde(rename = "Study Area")]
    pub study_area: String,
    #[serde(rename = "Course Overview")]
    pub course_overview: String,
    #[serde(rename = "Prerequisites")]
    pub prerequisites: String,
    #[serde(rename = "ATAR Highest")]
    pub atar_highest: String,
    #[serde(rename = "ATAR Median")]
    pub atar_median: String,
    #[serde(rename = "ATAR Lowest")]
    pub atar_lowest: String,
    #[serde(rename = "Delivery Mode 1")]
    pub delivery_mode_1: String,
    #[serde(rename = "Delivery Mode 2")]
    pub delivery_mode_2: String,
    #[serde(rename = "Full Time Duration")]
    pub full_time_duration: String,
    #[serde(rename = "Part Time Duration")]
    pub part_time_duration: String,
    #[serde(rename = "Course Code")]
    pub course_code: String,
    #[serde(rename = "Career Outcome")]
    pub career_outcome: String,
    #[serde(rename = "Fees")]
    pub fees: String,
    #[serde(rename = "Fees Link")]
    pub fees_link: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Postal Code")]
    pub postal_code: String,
    #[serde(rename = "Lat")]
    pub lat: String,
    #[serde(rename = "Long")]
    pub lon: String,
}

pub const COLUMNS: [&str; 26] = [
    "Course ID",
    "Title",
    "Institution Name",
    "Level of Qualification",
    "Study Area",
    "Course Overview",
    "Prerequisites",
    "ATAR Highest",
    "ATAR Median",
    "ATAR Lowest",
    "Delivery Mode 1",
    "Delivery Mode 2",
    "Full Time Duration",
    "Part Time Duration",
    "Course Code",
    "Career Outcome",
    "Fees",
    "Fees Link",
    "Location",
    "Address",
    "City",
    "State",
    "Country",
    "Postal Code",
    "Lat",
    "Long",
];

/// Write every row to `path`, creating parent directories. An empty run
/// still produces a header line.
pub fn write_csv(path: &Path, rows: &[CourseRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }

    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    if rows.is_empty() {
        writer.write_record(COLUMNS)?;
    }
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write course {}", row.course_id))?;
    }
    writer.flush()?;
    Ok(())
}
