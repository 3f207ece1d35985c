//! Profile records built by the wizard and the payloads exchanged with
//! collaborators.

use serde::{Deserialize, Serialize};

/// The person registering the company.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Domain of `email`, filled in before the code is sent.
    #[serde(default)]
    pub company_domain: String,
    /// Set only after the one-time code was accepted.
    #[serde(default)]
    pub verified: bool,
    #[serde(default = "default_verification_method")]
    pub verification_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

fn default_verification_method() -> String {
    "otp".to_string()
}

impl Default for PersonProfile {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            company_domain: String::new(),
            verified: false,
            verification_method: default_verification_method(),
            role_title: None,
            user_id: None,
        }
    }
}

impl PersonProfile {
    /// Domain part of the email: everything after the first `@`.
    pub fn email_domain(&self) -> Option<&str> {
        email_domain(&self.email)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Domain part of an address, or `None` when there is no `@` or nothing
/// follows it.
pub fn email_domain(email: &str) -> Option<&str> {
    let (_, rest) = email.split_once('@')?;
    let domain = rest.split('@').next().unwrap_or_default().trim();
    if domain.is_empty() { None } else { Some(domain) }
}

/// The company the agent will represent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompanyProfile {
    pub company_name: String,
    /// Tax identifier (EIN).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ein: Option<String>,
    pub website: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub policies: String,
    pub pricing_model: String,
    #[serde(default)]
    pub services: Vec<String>,
}

impl CompanyProfile {
    pub fn new(pricing_model: impl Into<String>) -> Self {
        Self {
            pricing_model: pricing_model.into(),
            ..Default::default()
        }
    }

    /// Merge a directory lookup for `domain` into this draft.
    ///
    /// Fields the lookup carries overwrite the draft. Domains fall back to
    /// `[domain]`, services are normalized, and the tax identifier is always
    /// cleared: a lookup never supplies one.
    pub fn apply_lookup(&mut self, lookup: CompanyLookup, domain: &str) {
        if let Some(name) = lookup.company_name {
            self.company_name = name;
        }
        if let Some(website) = lookup.website {
            self.website = website;
        }
        if let Some(policies) = lookup.policies {
            self.policies = policies;
        }
        if let Some(pricing) = lookup.pricing_model {
            self.pricing_model = pricing;
        }

        let domains = dedup_trimmed(lookup.domains.unwrap_or_default());
        self.domains = if domains.is_empty() {
            vec![domain.to_string()]
        } else {
            domains
        };

        if let Some(services) = lookup.services {
            self.services = services.into_entries();
        }

        self.ein = None;
    }
}

/// Short- and long-term goals for the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalsProfile {
    pub short_term: String,
    pub long_term: String,
}

/// Best-effort company profile returned by the directory service.
///
/// Every field may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompanyLookup {
    pub company_name: Option<String>,
    pub website: Option<String>,
    pub domains: Option<Vec<String>>,
    pub policies: Option<String>,
    pub pricing_model: Option<String>,
    pub services: Option<ServicesField>,
    /// Accepted for compatibility; never merged.
    pub ein: Option<String>,
}

/// Services as a directory may return them: a period-delimited sentence or
/// a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ServicesField {
    Text(String),
    List(Vec<String>),
}

impl ServicesField {
    /// Individual, trimmed, non-empty, de-duplicated entries.
    pub fn into_entries(self) -> Vec<String> {
        match self {
            Self::Text(text) => split_services(&text),
            Self::List(items) => dedup_trimmed(items),
        }
    }
}

/// Split a period-delimited services description into entries.
pub fn split_services(text: &str) -> Vec<String> {
    dedup_trimmed(text.split('.').map(str::to_string))
}

fn dedup_trimmed(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let trimmed = item.trim();
        if !trimmed.is_empty() && !out.iter().any(|s| s == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Everything submitted to the registry in one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnboardingPayload {
    pub user: PersonProfile,
    pub agent: AgentDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentDraft {
    pub company_context: CompanyProfile,
    pub goals: GoalsProfile,
}

/// Registry response to a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Read-only view of the whole registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub users: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub agents: serde_json::Map<String, serde_json::Value>,
}
