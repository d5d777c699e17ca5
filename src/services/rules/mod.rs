//! Rule interpretation
//!
//! Free-text persistent and ad-hoc instructions are turned into a [`RuleSet`]
//! by an external interpreter. Any interpreter failure falls back to local
//! phrase extraction so a run always gets rules.

mod fallback;
mod http;

pub use fallback::fallback_interpret;
pub use http::{extract_rule_object, HttpRuleInterpreter};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::services::clock::format_hhmm;
use crate::types::{RuleSet, Stop};

/// Window of a stop as clock strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowContext {
    pub start: String,
    pub end: String,
}

/// Summary of one stop sent along with the instructions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopContext {
    pub index: usize,
    pub name: String,
    pub urgent: bool,
    pub service_minutes: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowContext>,
}

impl From<&Stop> for StopContext {
    fn from(stop: &Stop) -> Self {
        Self {
            index: stop.index,
            name: stop.name.clone(),
            urgent: stop.urgent,
            service_minutes: stop.service_seconds / 60.0,
            window: stop.time_window.map(|tw| WindowContext {
                start: format_hhmm(tw.start),
                end: format_hhmm(tw.end),
            }),
        }
    }
}

/// Interpreter request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretRequest {
    pub persistent: String,
    pub adhoc: String,
    pub context: Vec<StopContext>,
}

impl InterpretRequest {
    pub fn new(persistent: &str, adhoc: &str, stops: &[Stop]) -> Self {
        Self {
            persistent: persistent.to_string(),
            adhoc: adhoc.to_string(),
            context: stops.iter().map(StopContext::from).collect(),
        }
    }

    /// Both prompts as the fallback parser reads them.
    pub fn combined_text(&self) -> String {
        format!("{}\n{}", self.persistent, self.adhoc)
    }
}

/// Turns instructions into a rule set
#[async_trait]
pub trait RuleInterpreter: Send + Sync {
    async fn interpret(&self, request: &InterpretRequest) -> Result<RuleSet>;

    /// Get interpreter name for logging
    fn name(&self) -> &str;
}

/// Interpreter used when no endpoint is configured
pub struct OfflineInterpreter;

#[async_trait]
impl RuleInterpreter for OfflineInterpreter {
    async fn interpret(&self, _request: &InterpretRequest) -> Result<RuleSet> {
        anyhow::bail!("no rule interpreter configured")
    }

    fn name(&self) -> &str {
        "Offline"
    }
}

/// Interpreter rules, or the local fallback when the interpreter fails.
pub async fn resolve_rules(
    interpreter: &dyn RuleInterpreter,
    persistent: &str,
    adhoc: &str,
    stops: &[Stop],
) -> RuleSet {
    let request = InterpretRequest::new(persistent, adhoc, stops);
    match interpreter.interpret(&request).await {
        Ok(rules) => {
            info!(
                "Rules from {}: priority {}, {} roads to avoid",
                interpreter.name(),
                rules.priority.as_str(),
                rules.avoid_road_names.len()
            );
            rules
        }
        Err(e) => {
            warn!("Rule interpreter {} failed, using local fallback: {:#}", interpreter.name(), e);
            fallback_interpret(&request.combined_text())
        }
    }
}

/// Create the interpreter selected by configuration.
pub fn create_rule_interpreter(config: &Config) -> Result<Box<dyn RuleInterpreter>> {
    match &config.interpreter_url {
        Some(url) => {
            info!("Using rule interpreter at {}", url);
            Ok(Box::new(HttpRuleInterpreter::new(url.as_str(), config.http_timeout_seconds)?))
        }
        None => {
            info!("No INTERPRETER_URL set, rules come from the local fallback");
            Ok(Box::new(OfflineInterpreter))
        }
    }
}
