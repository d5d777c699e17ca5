//! Client for the language-model rule interpreter proxy

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{InterpretRequest, RuleInterpreter};
use crate::types::RuleSet;

/// Interpreter reached at `POST {base_url}/ai/interpret`
pub struct HttpRuleInterpreter {
    client: Client,
    base_url: String,
}

impl HttpRuleInterpreter {
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn interpret_url(&self) -> String {
        format!("{}/ai/interpret", self.base_url)
    }
}

/// Parse a response body that is, or contains, one JSON object.
pub fn extract_rule_object(body: &str) -> Result<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }
    let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) else {
        anyhow::bail!("interpreter response contains no JSON object");
    };
    anyhow::ensure!(start < end, "interpreter response contains no JSON object");

    let value: Value = serde_json::from_str(&body[start..=end])
        .context("Failed to parse JSON object in interpreter response")?;
    anyhow::ensure!(value.is_object(), "interpreter response is not a JSON object");
    Ok(value)
}

#[async_trait]
impl RuleInterpreter for HttpRuleInterpreter {
    async fn interpret(&self, request: &InterpretRequest) -> Result<RuleSet> {
        debug!(
            "Interpreting rules for {} stops via {}",
            request.context.len(),
            self.base_url
        );

        let response = self
            .client
            .post(self.interpret_url())
            .json(request)
            .send()
            .await
            .context("Failed to send request to rule interpreter")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read rule interpreter response")?;
        if !status.is_success() {
            anyhow::bail!("Rule interpreter returned error {}: {}", status, body);
        }

        let raw = extract_rule_object(&body)?;
        if let Some(error) = raw.get("error") {
            anyhow::bail!("Rule interpreter reported error: {}", error);
        }
        Ok(RuleSet::from_value(&raw))
    }

    fn name(&self) -> &str {
        "HttpRuleInterpreter"
    }
}
