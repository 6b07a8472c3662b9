use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{ApiError, CourseSource};
use crate::export::CourseRow;
use crate::geo::GeoEnricher;
use crate::normalize::modes::apply_delivery_modes;
use crate::normalize::{normalize_course, record_id, RecordError};
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub page_size: usize,
    pub start_from: usize,
    pub target_count: Option<usize>,
    pub fetch_details: bool,
}

impl From<&Settings> for HarvestOptions {
    fn from(s: &Settings) -> Self {
        HarvestOptions {
            page_size: s.page_size,
            start_from: s.start_from,
            target_count: s.target_count,
            fetch_details: s.fetch_details,
        }
    }
}

/// A course that was skipped, kept for the end-of-run report.
#[derive(Debug)]
pub struct RecordFailure {
    pub id: String,
    pub error: RecordError,
}

/// Everything one run produced.
#[derive(Debug, Default)]
pub struct Harvest {
    pub rows: Vec<CourseRow>,
    pub failures: Vec<RecordFailure>,
    pub pages_fetched: usize,
    pub hits_seen: usize,
    pub total_hits: Option<u64>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fetching { offset: usize },
    Done,
}

pub struct Harvester<S: CourseSource> {
    source: S,
    geo: GeoEnricher,
    options: HarvestOptions,
    progress: ProgressBar,
}

impl<S: CourseSource> Harvester<S> {
    pub fn new(source: S, geo: GeoEnricher, options: HarvestOptions) -> Self {
        Harvester {
            source,
            geo,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Page through the search endpoint until an empty page or the target
    /// row count. A failed page request aborts; a failed course is skipped.
    pub fn run(&mut self) -> Result<Harvest, ApiError> {
        let started = Instant::now();
        let mut harvest = Harvest::default();
        let mut state = State::Fetching {
            offset: self.options.start_from,
        };

        while let State::Fetching { offset } = state {
            state = self.step(offset, &mut harvest)?;
        }
        self.progress.finish_and_clear();

        apply_delivery_modes(&mut harvest.rows);
        harvest.elapsed = started.elapsed();
        info!(
            rows = harvest.rows.len(),
            skipped = harvest.failures.len(),
            pages = harvest.pages_fetched,
            elapsed = %format_duration(harvest.elapsed),
            "harvest finished"
        );
        Ok(harvest)
    }

    fn step(&mut self, offset: usize, harvest: &mut Harvest) -> Result<State, ApiError> {
        if self.target_reached(harvest) {
            return Ok(State::Done);
        }

        let page_started = Instant::now();
        let page = self.source.fetch_page(offset, self.options.page_size)?;
        harvest.pages_fetched += 1;
        if harvest.total_hits.is_none() {
            harvest.total_hits = page.total;
        }

        if page.hits.is_empty() {
            info!(offset, "empty page, stopping");
            return Ok(State::Done);
        }
        info!(offset, hits = page.hits.len(), total = ?page.total, "fetched page");

        for hit in &page.hits {
            harvest.hits_seen += 1;
            match self.harvest_one(hit) {
                Ok(row) => {
                    self.progress.set_message(row.title.clone());
                    self.progress.inc(1);
                    harvest.rows.push(row);
                }
                Err(error) => {
                    let id = error.id().to_string();
                    warn!(course_id = %id, error = %error, "skipping course");
                    harvest.failures.push(RecordFailure { id, error });
                }
            }

            if self.target_reached(harvest) {
                info!(rows = harvest.rows.len(), "target row count reached");
                return Ok(State::Done);
            }
        }

        info!(
            offset,
            rows = harvest.rows.len(),
            elapsed = %format_duration(page_started.elapsed()),
            "page done"
        );
        Ok(State::Fetching {
            offset: offset + self.options.page_size,
        })
    }

    fn harvest_one(&mut self, hit: &Value) -> Result<CourseRow, RecordError> {
        if !hit.is_object() {
            return Err(RecordError::Malformed { id: record_id(hit) });
        }

        let detail = if self.options.fetch_details {
            let id = record_id(hit);
            let doc = self
                .source
                .fetch_detail(&id)
                .map_err(|source| RecordError::Detail { id, source })?;
            Some(doc)
        } else {
            None
        };

        normalize_course(hit, detail.as_ref(), &mut self.geo)
    }

    fn target_reached(&self, harvest: &Harvest) -> bool {
        self.options
            .target_count
            .is_some_and(|target| harvest.rows.len() >= target)
    }
}

/// Compact human duration for logs and the run summary: `850ms`, `2.5s`,
/// `2m 05s`, `1h 02m 05s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        0 => format!("{}ms", d.as_millis()),
        1..=59 => format!("{:.1}s", d.as_secs_f64()),
        60..=3599 => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}h {:02}m {:02}s", secs / 3600, secs % 3600 / 60, secs % 60),
    }
}
