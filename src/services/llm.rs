//! Company autofill and goal drafting through an LLM.
//!
//! Uses rig-core for the provider transport. `RigCompleter` bridges a rig
//! `Agent` to the `TextCompleter` seam that `LlmEnrichment` calls.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::{CompletionModel, Prompt};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::wizard::{CompanyLookup, CompanyProfile, GoalsProfile};

use super::prompts::{
    ENRICHMENT_SYSTEM_PROMPT, autofill_prompt, goals_prompt, parse_goals, parse_lookup,
};
use super::{DirectoryService, GoalGenerator};

const MAX_TOKENS: u64 = 1024;
const AUTOFILL_TEMPERATURE: f64 = 0.0;
const GOALS_TEMPERATURE: f64 = 0.4;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One prompt in, the model's text answer out.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, String>;
}

/// A rig agent preconfigured with the enrichment preamble.
pub struct RigCompleter<M: CompletionModel> {
    agent: Agent<M>,
}

impl<M: CompletionModel> RigCompleter<M> {
    pub fn new(agent: Agent<M>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl<M> TextCompleter for RigCompleter<M>
where
    M: CompletionModel + 'static,
{
    async fn complete(&self, prompt: &str) -> Result<String, String> {
        self.agent
            .prompt(prompt.to_string())
            .await
            .map_err(|e| e.to_string())
    }
}

/// Directory and goal generator backed by a language model.
pub struct LlmEnrichment {
    autofill: Arc<dyn TextCompleter>,
    goals: Arc<dyn TextCompleter>,
    model: String,
    pricing_models: Vec<String>,
    timeout: Duration,
}

impl LlmEnrichment {
    /// Wire both completers to the same Anthropic model.
    pub fn anthropic(api_key: &SecretString, model: &str) -> Result<Self, ServiceError> {
        use rig::providers::anthropic;

        let client: rig::client::Client<anthropic::client::AnthropicExt> =
            anthropic::Client::new(api_key.expose_secret()).map_err(|e| {
                ServiceError::Unavailable(format!("Failed to create Anthropic client: {}", e))
            })?;

        let autofill = client
            .agent(model)
            .preamble(ENRICHMENT_SYSTEM_PROMPT)
            .temperature(AUTOFILL_TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .build();
        let goals = client
            .agent(model)
            .preamble(ENRICHMENT_SYSTEM_PROMPT)
            .temperature(GOALS_TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .build();

        tracing::info!("Using Anthropic for enrichment (model: {})", model);
        Ok(Self::with_completers(
            Arc::new(RigCompleter::new(autofill)),
            Arc::new(RigCompleter::new(goals)),
            model,
        ))
    }

    /// Build from arbitrary completers (other providers, tests).
    pub fn with_completers(
        autofill: Arc<dyn TextCompleter>,
        goals: Arc<dyn TextCompleter>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            autofill,
            goals,
            model: model.into(),
            pricing_models: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Pricing catalog the autofill answer should pick from.
    pub fn with_pricing_models(mut self, pricing_models: Vec<String>) -> Self {
        self.pricing_models = pricing_models;
        self
    }

    /// Upper bound on a single model call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    async fn ask(&self, completer: &dyn TextCompleter, prompt: &str) -> Result<String, String> {
        let answer = tokio::time::timeout(self.timeout, completer.complete(prompt))
            .await
            .map_err(|_| format!("model call timed out after {:?}", self.timeout))??;
        debug!(model = %self.model, chars = answer.len(), "Enrichment answer received");
        Ok(answer)
    }
}

#[async_trait]
impl DirectoryService for LlmEnrichment {
    async fn lookup(&self, domain: &str) -> Result<CompanyLookup, ServiceError> {
        let prompt = autofill_prompt(domain, &self.pricing_models);
        let answer = self
            .ask(self.autofill.as_ref(), &prompt)
            .await
            .map_err(|reason| {
                warn!(domain = %domain, reason = %reason, "Autofill call failed");
                ServiceError::Lookup(reason)
            })?;
        parse_lookup(&answer)
    }
}

#[async_trait]
impl GoalGenerator for LlmEnrichment {
    async fn generate(&self, company: &CompanyProfile) -> Result<GoalsProfile, ServiceError> {
        let prompt = goals_prompt(company);
        let answer = self
            .ask(self.goals.as_ref(), &prompt)
            .await
            .map_err(|reason| {
                warn!(
                    company = %company.company_name,
                    reason = %reason,
                    "Goal generation call failed"
                );
                ServiceError::Generation(reason)
            })?;
        parse_goals(&answer)
    }
}
