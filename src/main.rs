//! Stopwise CLI
//!
//! Reads a stop list, builds a heuristic order, applies natural-language
//! routing rules and prints the resulting plan as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stopwise::cli::{Cli, Command, PromptArgs};
use stopwise::config::Config;
use stopwise::services::clock::parse_hhmm;
use stopwise::services::routing::{create_routing_service, RoutingService};
use stopwise::services::rules::{create_rule_interpreter, resolve_rules, RuleInterpreter};
use stopwise::services::session::{PlannerSettings, PlanningSession};
use stopwise::types::StopDraft;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration (also reads .env)
    let config = Config::from_env()?;

    std::fs::create_dir_all(&config.logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.logs_dir, "stopwise.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - stderr and file; stdout carries the JSON output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,stopwise=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    info!("Starting Stopwise...");

    let routing: Arc<dyn RoutingService> = Arc::from(create_routing_service(config.osrm())?);
    let interpreter: Arc<dyn RuleInterpreter> = Arc::from(create_rule_interpreter(&config)?);

    let result = match cli.command {
        Command::Plan { stops, prompts, start, round_trip, strategy } => {
            let mut settings = PlannerSettings::from_config(&config)?;
            if let Some(start) = start {
                settings.route_start = parse_hhmm(&start)?;
            }
            settings.round_trip |= round_trip;
            if let Some(strategy) = strategy {
                settings.repair_strategy = strategy;
            }
            run_plan(routing, interpreter, settings, &stops, prompts).await
        }
        Command::Interpret { prompts } => run_interpret(interpreter.as_ref(), &prompts).await,
    };

    if let Err(e) = &result {
        error!("Run failed: {:#}", e);
    }
    result
}

fn load_stops(path: &std::path::Path) -> Result<Vec<StopDraft>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read stops file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse stops file {}", path.display()))
}

async fn run_plan(
    routing: Arc<dyn RoutingService>,
    interpreter: Arc<dyn RuleInterpreter>,
    settings: PlannerSettings,
    stops_path: &std::path::Path,
    prompts: PromptArgs,
) -> Result<()> {
    let drafts = load_stops(stops_path)?;
    info!("Loaded {} stops from {}", drafts.len(), stops_path.display());

    let mut session = PlanningSession::new(routing, interpreter, settings);
    debug!("Planner settings: {:?}", session.settings());
    for draft in drafts {
        session.add_stop(draft)?;
    }
    session.save_persistent_prompt(prompts.persistent);
    session.save_adhoc_prompt(prompts.adhoc);

    session.optimize().await?;
    if session.has_rule_text() {
        session.apply_rules().await?;
    }

    info!(
        "Committed order {:?} ({} cached leg checks)",
        session.current_order().unwrap_or_default(),
        session.cache().len()
    );

    let report = session.report();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_interpret(interpreter: &dyn RuleInterpreter, prompts: &PromptArgs) -> Result<()> {
    let rules = resolve_rules(interpreter, &prompts.persistent, &prompts.adhoc, &[]).await;
    println!("{}", serde_json::to_string_pretty(&rules)?);
    Ok(())
}
