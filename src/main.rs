mod api;
mod export;
mod geo;
mod harvest;
mod normalize;
mod settings;
#[cfg(test)]
mod test_http;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use api::HttpCourseSource;
use geo::{GeoEnricher, LOCATION_NOT_AVAILABLE};
use harvest::{format_duration, HarvestOptions, Harvester};
use settings::{GeocoderKind, Settings};

const MAX_LISTED_FAILURES: usize = 20;

#[derive(Parser)]
#[command(name = "course_harvester", about = "Harvest course records from the course search API into CSV")]
struct Cli {
    /// Config file (default: ./harvester.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Stop after this many rows (default: until an empty page)
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Output CSV path
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Results per search request
    #[arg(long)]
    page_size: Option<usize>,
    /// Offset of the first search request
    #[arg(long = "from")]
    start_from: Option<usize>,
    /// Search endpoint URL
    #[arg(long)]
    endpoint: Option<String>,
    /// Use search hits as-is instead of fetching each course's detail document
    #[arg(long)]
    no_details: bool,
    /// Skip reverse geocoding
    #[arg(long)]
    no_geocode: bool,
    /// Reverse-geocoding provider
    #[arg(long, value_enum)]
    geocoder: Option<GeocoderKind>,
}

impl Cli {
    fn apply(self, settings: &mut Settings) {
        if let Some(n) = self.limit {
            settings.target_count = Some(n);
        }
        if let Some(p) = self.output {
            settings.output = p;
        }
        if let Some(n) = self.page_size {
            settings.page_size = n;
        }
        if let Some(n) = self.start_from {
            settings.start_from = n;
        }
        if let Some(e) = self.endpoint {
            settings.endpoint = e;
        }
        if let Some(g) = self.geocoder {
            settings.geocoder = g;
        }
        if self.no_details {
            settings.fetch_details = false;
        }
        if self.no_geocode {
            settings.geocode = false;
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    cli.apply(&mut settings);
    settings.validate()?;
    info!(
        endpoint = %settings.endpoint,
        page_size = settings.page_size,
        target = ?settings.target_count,
        details = settings.fetch_details,
        msg = "Starting course harvest"
    );

    let source = HttpCourseSource::new(
        &settings.endpoint,
        Duration::from_secs(settings.request_timeout_secs),
        &settings.user_agent,
    )?;
    let geo = GeoEnricher::from_settings(&settings).context("Failed to build geocoding client")?;
    if geo.is_enabled() {
        info!(provider = ?settings.geocoder, interval_ms = settings.geocode_interval_ms, "reverse geocoding enabled");
    } else {
        info!("reverse geocoding disabled, addresses will read \"{}\"", LOCATION_NOT_AVAILABLE);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} courses ({per_sec}) {wide_msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let mut harvester =
        Harvester::new(source, geo, HarvestOptions::from(&settings)).with_progress(pb);
    let harvest = harvester
        .run()
        .context("Course search failed; aborting without writing output")?;

    let export_started = Instant::now();
    export::write_csv(&settings.output, &harvest.rows)?;
    let export_elapsed = export_started.elapsed();

    println!(
        "Harvested {} courses from {} pages ({} hits seen{}).",
        harvest.rows.len(),
        harvest.pages_fetched,
        harvest.hits_seen,
        harvest
            .total_hits
            .map(|t| format!(", {} reported by the API", t))
            .unwrap_or_default()
    );
    if !harvest.failures.is_empty() {
        println!("Skipped {} courses:", harvest.failures.len());
        for failure in harvest.failures.iter().take(MAX_LISTED_FAILURES) {
            println!("  {}: {}", failure.id, failure.error);
        }
        if harvest.failures.len() > MAX_LISTED_FAILURES {
            println!("  ... and {} more", harvest.failures.len() - MAX_LISTED_FAILURES);
        }
    }
    println!("Saved to {}", settings.output.display());

    println!(
        "\nDone in {} (harvest {}, export {})",
        format_duration(t0.elapsed()),
        format_duration(harvest.elapsed),
        format_duration(export_elapsed)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "course_harvester",
            "-n",
            "25",
            "--from",
            "10000",
            "--no-geocode",
            "--geocoder",
            "opencage",
            "-o",
            "out.csv",
        ]);
        let mut s = Settings::default();
        cli.apply(&mut s);

        assert_eq!(s.target_count, Some(25));
        assert_eq!(s.start_from, 10_000);
        assert!(!s.geocode);
        assert!(s.fetch_details);
        assert_eq!(s.geocoder, GeocoderKind::OpenCage);
        assert_eq!(s.output, PathBuf::from("out.csv"));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn no_flags_keep_settings() {
        let mut s = Settings::default();
        Cli::parse_from(["course_harvester"]).apply(&mut s);
        assert!(s.target_count.is_none());
        assert_eq!(s.page_size, 50);
        assert!(s.geocode && s.fetch_details);
    }
}
