//! Offline evaluation command: single-policy replay or labelled sweeps.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use cogrouter_core::{
    evaluate_labeled, load_records, load_sweep, sweep, ConfigError, PolicyBuilder,
    PolicyOverrides, Report, Result, RoutingPolicy,
};

#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to the historical records JSON array
    #[arg(long)]
    pub data: PathBuf,

    /// Policy overrides: a JSON file path or an inline JSON object
    #[arg(long)]
    pub policy: Option<String>,

    /// Labelled sweep file (JSON list of {label, policy}); overrides --policy
    #[arg(long)]
    pub grid: Option<PathBuf>,

    /// Write the JSON report(s) to this path
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Print reports as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: EvaluateArgs) -> Result<()> {
    let records = load_records(&args.data)?;

    let reports = if let Some(grid_path) = &args.grid {
        let policies = load_sweep(grid_path)?;
        sweep(&records, &policies)?
    } else {
        let policy = match &args.policy {
            Some(raw) => parse_policy_arg(raw)?,
            None => RoutingPolicy::default(),
        };
        vec![evaluate_labeled(&records, &policy, "default")?]
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else if reports.len() == 1 {
        print_report(&reports[0]);
    } else {
        print_sweep_table(&reports);
    }

    if let Some(out) = &args.out {
        fs::write(out, serde_json::to_string_pretty(&reports)?)?;
        eprintln!("wrote {} report(s) to {}", reports.len(), out.display());
    }
    Ok(())
}

/// Accept either a path to a JSON file or an inline JSON object.
pub fn parse_policy_arg(raw: &str) -> Result<RoutingPolicy> {
    let text = if Path::new(raw).exists() {
        fs::read_to_string(raw)?
    } else {
        raw.to_string()
    };
    let overrides: PolicyOverrides = serde_json::from_str(&text)
        .map_err(|err| ConfigError::ParseFailed(err.to_string()))?;
    Ok(PolicyBuilder::new().apply(&overrides).build()?)
}

fn print_report(report: &Report) {
    println!("Offline evaluation (policy: {})", report.label);
    println!("Total tasks: {}", report.total_tasks);
    let counts: Vec<String> = report
        .strategy_counts
        .iter()
        .map(|(strategy, count)| format!("{strategy}={count}"))
        .collect();
    println!("Strategy counts: {}", counts.join(" "));
    println!("Average priority: {:.2}", report.average_priority);
    println!("Average attention load: {:.2}", report.average_load);
    println!(
        "Baseline human rate: {:.2} | Router human rate: {:.2}",
        report.baseline_human_rate, report.router_human_rate
    );
    println!(
        "Human intervention reduction: {:.1}%",
        report.human_intervention_reduction * 100.0
    );
}

fn print_sweep_table(reports: &[Report]) {
    println!("Offline evaluation sweep");
    println!("label | router rate | baseline rate | reduction %");
    for report in reports {
        println!(
            "{} | {:.2} | {:.2} | {:.1}",
            report.label,
            report.router_human_rate,
            report.baseline_human_rate,
            report.human_intervention_reduction * 100.0
        );
    }
}
