//! CLI argument parsing for the stopwise binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::services::repair::RepairStrategy;

#[derive(Parser)]
#[command(name = "stopwise", about = "Order stops into a drivable route", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Routing instructions in plain text
#[derive(Args, Debug, Default, Clone)]
pub struct PromptArgs {
    /// Standing instructions, e.g. "prioritize urgent stops"
    #[arg(long, default_value = "")]
    pub persistent: String,
    /// Instructions for this run only, e.g. "avoid Main Street"
    #[arg(long, default_value = "")]
    pub adhoc: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Plan a route for the stops in a JSON file and print the report
    Plan {
        /// JSON array of {name, lat, lng, serviceMinutes?, urgent?, windowStart?, windowEnd?}
        #[arg(long)]
        stops: PathBuf,
        #[command(flatten)]
        prompts: PromptArgs,
        /// Route start as HH:MM (overrides ROUTE_START)
        #[arg(long)]
        start: Option<String>,
        /// Return to the first stop (overrides ROUND_TRIP)
        #[arg(long)]
        round_trip: bool,
        /// Repair pass applied after the rule-weighted order (overrides REPAIR_STRATEGY)
        #[arg(long, value_enum)]
        strategy: Option<RepairStrategy>,
    },
    /// Resolve routing instructions into a rule set and print it
    Interpret {
        #[command(flatten)]
        prompts: PromptArgs,
    },
}
