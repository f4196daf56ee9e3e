//! HazardWatch DST Simulator CLI
//!
//! Run deterministic simulation tests with chaos engineering scenarios.

use anyhow::{bail, Context, Result};
use clap::Parser;
use hazardwatch_core::{CatalogConfig, ZoneCatalog};
use hazardwatch_env::{SourceOptions, TokioContext};
use hazardwatch_sim::scenarios::ScenarioId;
use hazardwatch_sim::{crossing_path, run_live, ScenarioResult, ScenarioRunner};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// HazardWatch Deterministic Simulation Testing CLI
#[derive(Parser, Debug)]
#[command(name = "hazardwatch-sim")]
#[command(about = "Run deterministic simulation tests for HazardWatch", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (walk_through, departure, glitch_storm, sensor_dropout,
    /// long_haul, empty_catalog, early_teardown, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of random seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Maximum simulation duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Fixes per simulated second
    #[arg(long, default_value = "5")]
    tick_rate: u32,

    /// Zone catalog JSON (defaults to the built-in zones)
    #[arg(short, long)]
    zones: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export simulation data to a JSON file for map visualization
    #[arg(long)]
    export: Option<String>,

    /// Replay a crossing in real time through the channel source
    #[arg(long)]
    live: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides the flag
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns Ok(false) when any scenario failed.
fn run(args: &Args) -> Result<bool> {
    if !args.json {
        info!("HazardWatch DST Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let catalog = match &args.zones {
        Some(path) => {
            let config = CatalogConfig::from_json_file(path).with_context(|| format!("loading zones from {}", path))?;
            ZoneCatalog::from_config(&config).with_context(|| format!("validating zones from {}", path))?
        }
        None => ZoneCatalog::builtin(),
    };
    info!("Loaded {} zone(s)", catalog.len());

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    if args.live {
        return run_live_mode(args, catalog, base_seed);
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        let scenario = args.scenario.parse::<ScenarioId>().map_err(anyhow::Error::msg).with_context(|| {
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            format!("available scenarios: {}, all", names.join(", "))
        })?;
        vec![scenario]
    };

    // Handle --export mode for visualization
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            bail!("--export only supports a single scenario, not 'all'");
        }
        info!("Running with export to: {}", export_path);

        let runner = ScenarioRunner::new(base_seed)
            .with_duration(args.duration)
            .with_tick_rate(args.tick_rate)
            .with_catalog(catalog);
        let (result, export) = runner.run_recorded(scenarios[0]);
        export
            .write_to_file(export_path)
            .with_context(|| format!("writing export to {}", export_path))?;
        info!("Exported {} frames to {}", export.frames.len(), export_path);

        report_one(&result, args.json);
        return Ok(result.passed);
    }

    // Run simulations
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed)
            .with_duration(args.duration)
            .with_tick_rate(args.tick_rate)
            .with_catalog(catalog.clone());

        for scenario in &scenarios {
            let result = runner.run(*scenario);
            report_one(&result, args.json);
            all_results.push(result);
        }
    }

    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    let total = all_results.len();

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "fixes_accepted": r.metrics.fixes_accepted,
                    "fixes_rejected": r.metrics.fixes_rejected,
                    "zone_entries": r.metrics.zone_entries,
                    "zone_exits": r.metrics.zone_exits,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    Ok(failed_count == 0)
}

fn report_one(result: &ScenarioResult, json: bool) {
    if json {
        return;
    }
    if result.passed {
        info!("✓ {} (seed={}) PASSED", result.scenario.name(), result.seed);
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

fn run_live_mode(args: &Args, catalog: ZoneCatalog, seed: u64) -> Result<bool> {
    let rate = args.tick_rate.max(1);
    let points = ((args.duration * rate as f64).ceil() as usize).max(1);
    let interval = Duration::from_secs_f64(1.0 / rate as f64);
    let path = crossing_path(&catalog, seed, points);

    let runtime = tokio::runtime::Runtime::new().context("starting Tokio runtime")?;
    let report = runtime.block_on(run_live(
        TokioContext::shared(),
        catalog,
        &path,
        interval,
        SourceOptions::default(),
    ))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "fixes_sent": report.fixes_sent,
                "zone_entries": report.zone_entries,
                "zone_exits": report.zone_exits,
                "fixes_rejected": report.fixes_rejected,
                "source_errors": report.source_errors,
                "summary": report.summary,
            }))?
        );
    } else {
        info!(
            "Live replay: {} fixes, {} entries, {} exits, inside={}, nearest={}",
            report.fixes_sent,
            report.zone_entries,
            report.zone_exits,
            report.summary.inside_any_zone,
            report.summary.distance_label().unwrap_or_else(|| "n/a".to_string())
        );
    }

    Ok(report.fixes_rejected == 0 && report.trail.len() == report.fixes_sent)
}
