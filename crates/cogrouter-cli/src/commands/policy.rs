//! Policy inspection and validation commands.

use std::fs;
use std::path::PathBuf;

use clap::Subcommand;
use cogrouter_core::{ConfigError, PolicyBuilder, PolicyOverrides, Result, RoutingPolicy};

#[derive(Subcommand)]
pub enum PolicyAction {
    /// Print the default policy as JSON
    Show,
    /// Validate a policy overrides file without applying it
    Check {
        /// Path to a JSON policy overrides file
        file: PathBuf,
    },
}

pub fn run(action: PolicyAction) -> Result<()> {
    match action {
        PolicyAction::Show => {
            println!(
                "{}",
                serde_json::to_string_pretty(&RoutingPolicy::default())?
            );
            Ok(())
        }
        PolicyAction::Check { file } => {
            let text = fs::read_to_string(&file)?;
            let overrides: PolicyOverrides = serde_json::from_str(&text)
                .map_err(|err| ConfigError::ParseFailed(err.to_string()))?;
            let policy = PolicyBuilder::new().apply(&overrides).build()?;
            println!("policy ok");
            println!("{}", serde_json::to_string_pretty(&policy)?);
            Ok(())
        }
    }
}
