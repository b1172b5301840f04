//! Grid-search command over policy configurations.

use std::fs;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use cogrouter_core::{load_grid, load_records, optimize, Objective, Result};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ObjectiveArg {
    /// Minimize the fraction of tasks routed to a human
    HumanRate,
    /// Maximize the average priority of routed items
    PriorityMean,
}

impl From<ObjectiveArg> for Objective {
    fn from(arg: ObjectiveArg) -> Self {
        match arg {
            ObjectiveArg::HumanRate => Objective::HumanRate,
            ObjectiveArg::PriorityMean => Objective::PriorityMean,
        }
    }
}

#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to the historical records JSON array
    #[arg(long)]
    pub data: PathBuf,

    /// Path to the policy grid JSON file
    #[arg(long)]
    pub grid: PathBuf,

    /// Optimization objective
    #[arg(long, value_enum, default_value = "human-rate")]
    pub objective: ObjectiveArg,

    /// Drop candidates whose router human rate exceeds this value
    #[arg(long)]
    pub max_router_rate: Option<f64>,

    /// Write the winning policy and its report to this path
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: OptimizeArgs) -> Result<()> {
    let records = load_records(&args.data)?;
    let grid = load_grid(&args.grid)?;

    let outcome = optimize(
        &records,
        &grid,
        args.objective.into(),
        args.max_router_rate,
    )?;

    println!("Best candidate: {}", outcome.report.label);
    println!("Score: {:.4}", outcome.score);
    println!(
        "Router human rate: {:.2} | Baseline human rate: {:.2}",
        outcome.report.router_human_rate, outcome.report.baseline_human_rate
    );
    println!(
        "Human intervention reduction: {:.1}%",
        outcome.report.human_intervention_reduction * 100.0
    );
    println!("Recommended policy:");
    println!("{}", serde_json::to_string_pretty(&outcome.policy)?);

    if let Some(out) = &args.out {
        let payload = serde_json::json!({
            "policy": outcome.policy,
            "report": outcome.report,
            "score": outcome.score,
        });
        fs::write(out, serde_json::to_string_pretty(&payload)?)?;
        eprintln!("wrote optimization result to {}", out.display());
    }
    Ok(())
}
