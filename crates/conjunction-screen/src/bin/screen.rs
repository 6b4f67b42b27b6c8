//! Conjunction screening command-line tool
//!
//! Run with: cargo run -p conjunction-screen -- <command>

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use conjunction_screen::{
    propagation::parse_catalog_text, Alert, ConjunctionEvent, ObjectId, RiskLevel,
    ScreeningConfig, ScreeningService, Sgp4Propagator, SqliteStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "conjunction-screen", about = "Orbital catalog conjunction screening")]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overrides the configured one
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load two-line or three-line element sets into the catalog.
    Ingest {
        /// Element set text file
        file: PathBuf,
    },

    /// Screen the whole catalog for close approaches.
    Sweep {
        /// Look-ahead window in hours
        #[arg(long, default_value = "24")]
        hours: i64,
    },

    /// Find the closest approach between two objects.
    Check {
        id1: ObjectId,
        id2: ObjectId,

        /// Look-ahead window in hours
        #[arg(long, default_value = "24")]
        hours: i64,
    },

    /// Screen one object against the filtered catalog.
    Analyze {
        /// Primary object id
        primary: ObjectId,

        /// Prediction window in days
        #[arg(long, default_value = "7")]
        days: i64,
    },

    /// Present separation of two objects.
    Distance { id1: ObjectId, id2: ObjectId },

    /// List unresolved alerts.
    Alerts {
        /// Only this severity (LOW, MEDIUM, HIGH, CRITICAL)
        #[arg(long)]
        level: Option<RiskLevel>,
    },

    /// Mark an alert resolved.
    Resolve { id: Uuid },

    /// Stored conjunction events for one object.
    Events {
        primary: ObjectId,

        /// Days ahead to include
        #[arg(long, default_value = "7")]
        days: i64,

        /// Only future HIGH and CRITICAL events
        #[arg(long)]
        high_risk: bool,
    },

    /// Delete conjunction events older than the retention window.
    Purge {
        /// Days of past events to keep
        #[arg(long, default_value = "30")]
        keep_days: i64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conjunction_screen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ScreeningConfig::from_toml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ScreeningConfig::default(),
    };
    if let Some(path) = &cli.database {
        config.storage.database_path = path.clone();
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Database: {}", config.storage.database_path.display());
    tracing::info!("  - Workers: {}", config.worker_count());

    let store = Arc::new(SqliteStore::new(&config.storage.database_path)?);

    let service =
        ScreeningService::with_store(config, Arc::new(Sgp4Propagator::new()), store.clone())?;

    run(cli.command, &service, &store, cli.json)
}

fn run(
    command: Commands,
    service: &ScreeningService,
    store: &SqliteStore,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Ingest { file } => ingest(store, &file)?,
        Commands::Sweep { hours } => {
            let report = service.full_catalog_sweep(hours)?;
            println!(
                "Sweep: {} objects ({} positioned, {} failed), {} pairs within radius, {} approaches",
                report.objects,
                report.positioned,
                report.propagation_failures,
                report.scan.within_radius,
                report.approaches
            );
            println!(
                "Alerts: {} new, {} existing ({:.2}s)",
                report.alerts_created, report.alerts_existing, report.duration_secs
            );
            print_alerts(&report.alerts, json)?;
        }
        Commands::Check { id1, id2, hours } => {
            let check = service.check_pair(id1, id2, hours)?;
            match (&check.approach, &check.alert) {
                (_, Some(alert)) => print_alerts(std::slice::from_ref(alert), json)?,
                (Some(approach), None) => println!("No alert: {}", approach),
                (None, None) => println!("No approach: objects {} and {} are co-moving", id1, id2),
            }
        }
        Commands::Analyze { primary, days } => {
            let report = service.analyze_primary(primary, days)?;
            println!(
                "Filtered {} -> {} (coarse) -> {} (RAAN) -> {} (co-location); {} failed",
                report.catalog_size,
                report.after_coarse,
                report.after_raan,
                report.after_co_location,
                report.failed
            );
            println!(
                "Events: {} (Critical: {}, High: {}, Medium: {}, Low: {})",
                report.events.len(),
                report.count(RiskLevel::Critical),
                report.count(RiskLevel::High),
                report.count(RiskLevel::Medium),
                report.count(RiskLevel::Low)
            );
            print_events(&report.events, json)?;
        }
        Commands::Distance { id1, id2 } => {
            let km = service.current_distance(id1, id2)?;
            println!("{} <-> {}: {:.3} km", id1, id2, km);
        }
        Commands::Alerts { level } => {
            print_alerts(&service.list_unresolved_alerts(level)?, json)?;
        }
        Commands::Resolve { id } => {
            let alert = service.resolve_alert(id)?;
            println!("Resolved {} ({})", alert.id, alert.pair());
        }
        Commands::Events {
            primary,
            days,
            high_risk,
        } => {
            let events = if high_risk {
                service.high_risk_events(primary)?
            } else {
                service.upcoming_events(primary, days)?
            };
            print_events(&events, json)?;
        }
        Commands::Purge { keep_days } => {
            let removed = service.purge_events_older_than(keep_days)?;
            println!("Removed {} events", removed);
        }
    }

    Ok(())
}

fn ingest(store: &SqliteStore, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading element sets from {}", file.display()))?;
    let (records, failures) = parse_catalog_text(&text);

    let mut current = 0;
    for (metadata, state) in &records {
        store.upsert_object(metadata)?;
        if store.insert_state(state)? {
            current += 1;
        }
    }

    tracing::info!(
        "Ingested {} element sets ({} now current), {} rejected",
        records.len(),
        current,
        failures
    );
    println!("Ingested {} element sets, {} rejected", records.len(), failures);
    Ok(())
}

fn print_alerts(alerts: &[Alert], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(alerts)?);
        return Ok(());
    }
    for alert in alerts {
        println!(
            "{} [{}] {} TCA={} miss={:.3} km v={:.2} km/s p={:.3}",
            alert.id,
            alert.risk_level,
            alert.pair(),
            alert.tca.to_rfc3339(),
            alert.min_distance_km,
            alert.relative_velocity_kms,
            alert.collision_probability
        );
    }
    Ok(())
}

fn print_events(events: &[ConjunctionEvent], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(events)?);
        return Ok(());
    }
    for event in events {
        println!(
            "[{}] {} <-> {} TCA={} miss={:.0} m v={:.1} m/s{}",
            event.risk_level,
            event.primary_id,
            event.secondary_id,
            event.tca.to_rfc3339(),
            event.miss_distance_m,
            event.relative_velocity_ms,
            if event.stale_state { " (stale elements)" } else { "" }
        );
    }
    Ok(())
}
