use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use infirmary_analytics::build_dashboard_str;
use infirmary_core::{DashboardData, RiskThresholds, ThresholdOverrides};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "infirmary",
    about = "Build risk dashboard analytics from clinic records JSON."
)]
struct Args {
    /// JSON file with `patients`, `vitals`, `results` and `consultations` arrays.
    #[arg(short, long)]
    input: PathBuf,

    /// Optional JSON file overriding risk thresholds, e.g. `{"bmi": {"critical": 40}}`.
    #[arg(short, long)]
    thresholds: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Format::Summary)]
    format: Format,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// KPI counts and the follow-up cohort.
    Summary,
    /// Full dashboard as pretty-printed JSON.
    Json,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("infirmary=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let thresholds = load_thresholds(args.thresholds.as_ref())?;

    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read records file {:?}", args.input))?;
    let dashboard = build_dashboard_str(&data, &thresholds)?;

    tracing::info!(
        patients = dashboard.total_patients,
        cohort = dashboard.at_risk_cohort.len(),
        "dashboard built from {:?}",
        args.input
    );

    match args.format {
        Format::Summary => print_summary(&dashboard),
        Format::Json => println!("{}", serde_json::to_string_pretty(&dashboard)?),
    }

    Ok(())
}

fn load_thresholds(path: Option<&PathBuf>) -> anyhow::Result<RiskThresholds> {
    let Some(path) = path else {
        return Ok(RiskThresholds::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read thresholds file {path:?}"))?;
    let overrides: ThresholdOverrides = serde_json::from_str(&raw)
        .with_context(|| format!("invalid thresholds file {path:?}"))?;
    let thresholds = RiskThresholds::from(overrides);
    thresholds.validate()?;
    tracing::debug!(?thresholds, "using threshold overrides");
    Ok(thresholds)
}

fn print_summary(dashboard: &DashboardData) {
    println!(
        "Patients: {}\nHypertensive: {}\nObese: {}\nHigh LDL: {}\nDiabetic watch: {}",
        dashboard.total_patients,
        dashboard.hypertensive_count,
        dashboard.obesity_count,
        dashboard.critical_ldl_count,
        dashboard.diabetic_watch_count
    );

    for bucket in &dashboard.risk_stratification {
        println!("{}: {}", bucket.name, bucket.value);
    }

    if !dashboard.at_risk_cohort.is_empty() {
        println!("\nFollow-up cohort:");
        for entry in &dashboard.at_risk_cohort {
            println!(
                "  [{}] {} ({}) {}",
                entry.status,
                entry.name,
                entry.uuid,
                entry.chronic_factors.join(", ")
            );
        }
    }
}
