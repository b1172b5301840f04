use clap::{Parser, Subcommand};
use cogrouter_core::RouterError;

mod commands;

#[derive(Parser)]
#[command(name = "cogrouter", version, about = "Cognitive bandwidth router CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay historical records through a routing policy
    Evaluate(commands::evaluate::EvaluateArgs),
    /// Grid-search policy configurations against an objective
    Optimize(commands::optimize::OptimizeArgs),
    /// Run a deterministic routing simulation
    Sim(commands::simulate::SimArgs),
    /// Policy configuration management
    Policy {
        #[command(subcommand)]
        action: commands::policy::PolicyAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Evaluate(args) => commands::evaluate::run(args),
        Commands::Optimize(args) => commands::optimize::run(args),
        Commands::Sim(args) => commands::simulate::run(args),
        Commands::Policy { action } => commands::policy::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(exit_code(&e));
    }
}

/// 0 success, 2 configuration error, 3 input-file error, 1 anything else.
fn exit_code(err: &RouterError) -> i32 {
    match err {
        RouterError::Config(_) => 2,
        RouterError::Io(_) | RouterError::Json(_) => 3,
        _ => 1,
    }
}
