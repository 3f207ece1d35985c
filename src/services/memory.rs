//! In-process collaborators for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::wizard::{
    CompanyLookup, CompanyProfile, GoalsProfile, OnboardingPayload, PersonProfile,
    RegistrySnapshot, SubmissionReceipt,
};

use super::{DirectoryService, GoalGenerator, RegistryService, VerificationService};

const DEFAULT_CODE_LENGTH: usize = 6;

/// Issues numeric one-time codes and keeps them in memory.
///
/// Codes are logged at `info` so a local operator can complete sign-up
/// without a mail server.
pub struct InMemoryVerification {
    codes: RwLock<HashMap<String, String>>,
    fixed_code: Option<String>,
    code_length: usize,
}

impl InMemoryVerification {
    pub fn new() -> Self {
        Self {
            codes: RwLock::new(HashMap::new()),
            fixed_code: None,
            code_length: DEFAULT_CODE_LENGTH,
        }
    }

    /// Always issue `code` instead of a random one.
    pub fn with_fixed_code(code: impl Into<String>) -> Self {
        Self {
            fixed_code: Some(code.into()),
            ..Self::new()
        }
    }

    pub fn with_code_length(mut self, code_length: usize) -> Self {
        self.code_length = code_length;
        self
    }

    /// The outstanding code for `email`, if any.
    pub async fn issued_code(&self, email: &str) -> Option<String> {
        self.codes.read().await.get(&email_key(email)).cloned()
    }

    fn next_code(&self) -> String {
        if let Some(code) = &self.fixed_code {
            return code.clone();
        }
        let mut rng = rand::thread_rng();
        (0..self.code_length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }
}

impl Default for InMemoryVerification {
    fn default() -> Self {
        Self::new()
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl VerificationService for InMemoryVerification {
    async fn send_code(&self, person: &PersonProfile) -> Result<PersonProfile, ServiceError> {
        let email = person.email.trim().to_string();
        let Some(domain) = person.email_domain().map(str::to_lowercase) else {
            return Err(ServiceError::Verification(
                "A valid email is required".to_string(),
            ));
        };

        let code = self.next_code();
        self.codes.write().await.insert(email_key(&email), code.clone());
        info!(email = %email, code = %code, "Verification code issued");

        Ok(PersonProfile {
            email,
            company_domain: domain,
            verified: false,
            ..person.clone()
        })
    }

    async fn check_code(&self, email: &str, code: &str) -> Result<(), ServiceError> {
        let key = email_key(email);
        let mut codes = self.codes.write().await;
        match codes.get(&key) {
            None => Err(ServiceError::Verification(
                "No code was sent to this email".to_string(),
            )),
            Some(expected) if expected == code.trim() => {
                codes.remove(&key);
                debug!(email = %email, "Verification code accepted");
                Ok(())
            }
            Some(_) => Err(ServiceError::Verification(
                "Invalid or expired code".to_string(),
            )),
        }
    }
}

/// Registry kept in process memory; lost on restart.
pub struct InMemoryRegistry {
    snapshot: RwLock<RegistrySnapshot>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(RegistrySnapshot::default()),
        }
    }

    pub async fn agent_count(&self) -> usize {
        self.snapshot.read().await.agents.len()
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryService for InMemoryRegistry {
    async fn create_record(
        &self,
        payload: &OnboardingPayload,
    ) -> Result<SubmissionReceipt, ServiceError> {
        if !payload.user.verified {
            return Err(ServiceError::Submission(
                "Email must be verified before registering an agent".to_string(),
            ));
        }

        let user_id = payload
            .user
            .user_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let agent_id = format!("agent_{}", Uuid::new_v4().simple());
        let now = Utc::now();

        let mut user = payload.user.clone();
        user.user_id = Some(user_id.clone());
        let user_json = serde_json::to_value(&user)
            .map_err(|e| ServiceError::Submission(format!("Failed to encode user: {e}")))?;

        let agent_json = serde_json::json!({
            "agent_id": agent_id,
            "owner_user_id": user_id,
            "company_context": payload.agent.company_context,
            "goals": payload.agent.goals,
            "created_at": now.to_rfc3339(),
        });

        let mut snapshot = self.snapshot.write().await;
        snapshot.users.insert(user_id.clone(), user_json);
        snapshot.agents.insert(agent_id.clone(), agent_json);
        info!(agent_id = %agent_id, user_id = %user_id, "Agent registered");

        Ok(SubmissionReceipt {
            agent_id,
            user_id: Some(user_id),
        })
    }

    async fn read_all(&self) -> Result<RegistrySnapshot, ServiceError> {
        Ok(self.snapshot.read().await.clone())
    }
}

/// Stands in for autofill and goal drafting when no model is configured.
///
/// Every call fails, which the wizard treats as non-fatal: the user types
/// the values instead.
pub struct DisabledEnrichment;

const ENRICHMENT_DISABLED: &str = "enrichment is not configured";

#[async_trait]
impl DirectoryService for DisabledEnrichment {
    async fn lookup(&self, _domain: &str) -> Result<CompanyLookup, ServiceError> {
        Err(ServiceError::Unavailable(ENRICHMENT_DISABLED.to_string()))
    }
}

#[async_trait]
impl GoalGenerator for DisabledEnrichment {
    async fn generate(&self, _company: &CompanyProfile) -> Result<GoalsProfile, ServiceError> {
        Err(ServiceError::Unavailable(ENRICHMENT_DISABLED.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::AgentDraft;

    fn person(email: &str) -> PersonProfile {
        PersonProfile {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn random_codes_are_numeric_with_configured_length() {
        let verification = InMemoryVerification::new().with_code_length(8);
        verification.send_code(&person("jane@acme.io")).await.unwrap();
        let code = verification.issued_code("jane@acme.io").await.unwrap();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn send_code_returns_canonical_person() {
        let verification = InMemoryVerification::with_fixed_code("123456");
        let canonical = verification
            .send_code(&person("  jane@Acme.IO "))
            .await
            .unwrap();
        assert_eq!(canonical.email, "jane@Acme.IO");
        assert_eq!(canonical.company_domain, "acme.io");
        assert!(!canonical.verified);
    }

    #[tokio::test]
    async fn code_is_single_use() {
        let verification = InMemoryVerification::with_fixed_code("123456");
        verification.send_code(&person("jane@acme.io")).await.unwrap();

        assert!(verification.check_code("jane@acme.io", "000000").await.is_err());
        assert!(verification.check_code("JANE@acme.io", "123456").await.is_ok());
        assert!(verification.check_code("jane@acme.io", "123456").await.is_err());
    }

    #[tokio::test]
    async fn check_without_send_fails() {
        let verification = InMemoryVerification::new();
        let err = verification
            .check_code("nobody@acme.io", "123456")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No code was sent to this email");
    }

    #[tokio::test]
    async fn registry_stores_user_and_agent() {
        let registry = InMemoryRegistry::new();
        let mut user = person("jane@acme.io");
        user.verified = true;
        let payload = OnboardingPayload {
            user,
            agent: AgentDraft {
                company_context: CompanyProfile::new("Subscription"),
                goals: GoalsProfile::default(),
            },
        };

        let receipt = registry.create_record(&payload).await.unwrap();
        assert!(receipt.agent_id.starts_with("agent_"));
        let user_id = receipt.user_id.unwrap();

        let snapshot = registry.read_all().await.unwrap();
        assert_eq!(snapshot.users[&user_id]["email"], "jane@acme.io");
        assert_eq!(
            snapshot.agents[&receipt.agent_id]["owner_user_id"],
            user_id.as_str()
        );
        assert_eq!(registry.agent_count().await, 1);
    }

    #[tokio::test]
    async fn registry_rejects_unverified_users() {
        let registry = InMemoryRegistry::new();
        let payload = OnboardingPayload {
            user: person("jane@acme.io"),
            agent: AgentDraft {
                company_context: CompanyProfile::default(),
                goals: GoalsProfile::default(),
            },
        };
        assert!(matches!(
            registry.create_record(&payload).await,
            Err(ServiceError::Submission(_))
        ));
    }

    #[tokio::test]
    async fn disabled_enrichment_always_fails() {
        assert!(DisabledEnrichment.lookup("acme.io").await.is_err());
        assert!(
            DisabledEnrichment
                .generate(&CompanyProfile::default())
                .await
                .is_err()
        );
    }
}
