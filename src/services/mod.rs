//! Collaborator interfaces the wizard calls out to, and their adapters.
//!
//! The engine only sees the traits. Adapters:
//! - **http**: the registry/verification REST backend
//! - **llm**: company autofill and goal drafting via rig-core
//! - **memory**: in-process stand-ins for local runs and tests

pub mod http;
pub mod llm;
pub mod memory;
pub mod prompts;

pub use http::HttpBackend;
pub use llm::{LlmEnrichment, RigCompleter, TextCompleter};
pub use memory::{DisabledEnrichment, InMemoryRegistry, InMemoryVerification};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::WizardConfig;
use crate::error::ServiceError;
use crate::wizard::{
    CompanyLookup, CompanyProfile, GoalsProfile, OnboardingPayload, PersonProfile,
    RegistrySnapshot, SubmissionReceipt,
};

/// Issues and checks one-time codes for an email address.
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Send a code to `person.email`; returns the canonical person record.
    async fn send_code(&self, person: &PersonProfile) -> Result<PersonProfile, ServiceError>;

    /// Check a code previously sent to `email`.
    async fn check_code(&self, email: &str, code: &str) -> Result<(), ServiceError>;
}

/// Best-effort company profile lookup by domain.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<CompanyLookup, ServiceError>;
}

/// Suggests goals for a company.
#[async_trait]
pub trait GoalGenerator: Send + Sync {
    async fn generate(&self, company: &CompanyProfile) -> Result<GoalsProfile, ServiceError>;
}

/// Persists finished onboardings.
#[async_trait]
pub trait RegistryService: Send + Sync {
    async fn create_record(
        &self,
        payload: &OnboardingPayload,
    ) -> Result<SubmissionReceipt, ServiceError>;

    /// Read-only snapshot of every stored user and agent.
    async fn read_all(&self) -> Result<RegistrySnapshot, ServiceError>;
}

/// The four collaborators an engine is wired to.
#[derive(Clone)]
pub struct WizardServices {
    pub verification: Arc<dyn VerificationService>,
    pub directory: Arc<dyn DirectoryService>,
    pub goals: Arc<dyn GoalGenerator>,
    pub registry: Arc<dyn RegistryService>,
}

impl WizardServices {
    /// Fully in-process wiring: in-memory verification and registry,
    /// enrichment disabled.
    pub fn in_memory(config: &WizardConfig) -> Self {
        let enrichment = Arc::new(DisabledEnrichment);
        Self {
            verification: Arc::new(
                InMemoryVerification::new().with_code_length(config.code_length),
            ),
            directory: enrichment.clone(),
            goals: enrichment,
            registry: Arc::new(InMemoryRegistry::new()),
        }
    }
}
