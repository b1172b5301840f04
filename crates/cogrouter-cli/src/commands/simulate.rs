//! Deterministic simulation command.

use clap::Args;
use cogrouter_core::{run_simulation, Result, SimulationConfig};

#[derive(Args)]
pub struct SimArgs {
    /// Number of task intents to generate
    #[arg(long, default_value_t = 5)]
    pub tasks: usize,

    /// Random seed; identical seeds reproduce the transcript
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

pub fn run(args: SimArgs) -> Result<()> {
    let outcome = run_simulation(&SimulationConfig {
        tasks: args.tasks,
        seed: args.seed,
    })?;

    for line in &outcome.transcript {
        println!("{line}");
    }
    println!(
        "routed {} task(s); {} queued for a human",
        outcome.items.len(),
        outcome.queue_depth
    );
    Ok(())
}
