#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fixture replay tool for the civic watch dashboard core.
//!
//! Seeds the in-memory backend from a JSON fixture, signs in the recorded
//! session, replays the recorded changes and prints what the dashboard
//! would show as JSON.

mod fixture;

use std::path::PathBuf;
use std::sync::Arc;

use civic_watch_analytics_models::{ChartSlice, ClusterKey, ReportStats};
use civic_watch_dashboard::{DashboardConfig, LiveDashboard, Notice};
use civic_watch_geography_models::Zone;
use civic_watch_report_models::ReportId;
use civic_watch_scope::RoleScope;
use civic_watch_store::ReportBackend;
use clap::Parser;
use serde::Serialize;

use crate::fixture::{Fixture, FixtureSession, replay};

/// Replay a recorded dashboard session.
#[derive(Parser)]
#[command(name = "civic_watch")]
#[command(about = "Replay a recorded report fixture through the dashboard core")]
struct Cli {
    /// JSON fixture with `session`, `reports`, `wards` and `events`.
    fixture: PathBuf,

    /// TOML dashboard config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print compact JSON.
    #[arg(long)]
    compact: bool,
}

/// What the dashboard shows after the replay.
#[derive(Serialize)]
struct Summary {
    scope: Option<RoleScope>,
    authoritative: bool,
    filtered: Vec<ReportId>,
    cluster_key: ClusterKey,
    stats: ReportStats,
    chart: Option<Vec<ChartSlice>>,
    zones: Vec<Zone>,
    notices: Vec<Notice>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    }
    .with_env_overrides();

    let fixture = Fixture::load(&args.fixture)?;
    let backend = Arc::new(fixture.backend());
    let mut dashboard = LiveDashboard::new(
        Arc::clone(&backend) as Arc<dyn ReportBackend>,
        config,
    );

    if let Some(criteria) = fixture.criteria.clone() {
        dashboard.set_criteria(criteria);
    }

    dashboard
        .refresh_session(&FixtureSession(fixture.session.clone()))
        .await?;

    if let Err(e) = dashboard.load_wards().await {
        log::warn!("Ward overlays unavailable: {e}");
    }

    let events = fixture.events.len();
    for change in fixture.events {
        replay(&backend, change);
    }
    let changed = dashboard.pump().await;
    log::info!("Replayed {events} events, {changed} changed the view");

    let filtered = dashboard
        .filtered()
        .iter()
        .map(|report| report.id.clone())
        .collect();

    let summary = Summary {
        scope: dashboard.scope().cloned(),
        authoritative: dashboard.is_authoritative(),
        filtered,
        cluster_key: dashboard.cluster_key(),
        stats: dashboard.stats(),
        chart: dashboard.chart(),
        zones: dashboard.wards().zones(),
        notices: dashboard.take_notices(),
    };

    let output = if args.compact {
        serde_json::to_string(&summary)?
    } else {
        serde_json::to_string_pretty(&summary)?
    };
    println!("{output}");

    Ok(())
}
