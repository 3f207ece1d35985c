//! Configuration types.

use std::collections::HashSet;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Consumer email providers that may not be used to onboard a business.
const DEFAULT_FREE_EMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "ymail.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "msn.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "proton.me",
    "protonmail.com",
    "gmx.com",
    "mail.com",
    "zoho.com",
    "yandex.com",
];

const DEFAULT_PRICING_MODELS: &[&str] = &[
    "Subscription",
    "Usage-Based",
    "Flat Fee",
    "Freemium",
    "Enterprise",
];

const DEFAULT_CODE_LENGTH: usize = 6;

/// Lookup tables and limits the wizard validates against.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Lower-cased email domains rejected at sign-up.
    pub free_email_domains: HashSet<String>,
    /// Pricing models a company may pick. The first entry is the default.
    pub pricing_models: Vec<String>,
    /// Exact length of a one-time verification code.
    pub code_length: usize,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            free_email_domains: DEFAULT_FREE_EMAIL_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            pricing_models: DEFAULT_PRICING_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            code_length: DEFAULT_CODE_LENGTH,
        }
    }
}

impl WizardConfig {
    /// Build from environment variables, falling back to the defaults.
    ///
    /// - `ONBOARD_FREE_EMAIL_DOMAINS`: comma-separated denylist
    /// - `ONBOARD_PRICING_MODELS`: comma-separated catalog
    /// - `ONBOARD_CODE_LENGTH`: verification code length
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(domains) = env_list("ONBOARD_FREE_EMAIL_DOMAINS") {
            config = config.with_free_email_domains(domains);
        }

        if let Some(models) = env_list("ONBOARD_PRICING_MODELS") {
            if models.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "ONBOARD_PRICING_MODELS".to_string(),
                    message: "at least one pricing model is required".to_string(),
                });
            }
            config.pricing_models = models;
        }

        if let Ok(raw) = std::env::var("ONBOARD_CODE_LENGTH") {
            config.code_length = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "ONBOARD_CODE_LENGTH".to_string(),
                        message: format!("expected a positive integer, got {raw:?}"),
                    });
                }
            };
        }

        Ok(config)
    }

    /// Replace the free-email denylist. Entries are lower-cased.
    pub fn with_free_email_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.free_email_domains = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        self
    }

    /// Replace the pricing catalog.
    pub fn with_pricing_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pricing_models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_code_length(mut self, code_length: usize) -> Self {
        self.code_length = code_length;
        self
    }

    /// Whether `domain` belongs to a consumer email provider.
    pub fn is_free_email_domain(&self, domain: &str) -> bool {
        self.free_email_domains.contains(&domain.to_lowercase())
    }

    /// Pricing model a fresh company draft starts with.
    pub fn default_pricing_model(&self) -> String {
        self.pricing_models.first().cloned().unwrap_or_default()
    }
}

/// Process-level settings for the HTTP server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the wizard REST API listens on.
    pub port: u16,
    /// Base URL of the registry/verification backend. `None` runs the
    /// in-memory collaborators instead.
    pub registry_url: Option<String>,
    /// Anthropic API key for autofill and goal drafting. `None` disables
    /// enrichment; users then fill those steps by hand.
    pub anthropic_api_key: Option<SecretString>,
    /// Model used for enrichment calls.
    pub model: String,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("ONBOARD_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let registry_url = std::env::var("ONBOARD_REGISTRY_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let model = std::env::var("ONBOARD_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

        let http_timeout_secs: u64 = std::env::var("ONBOARD_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Self {
            port,
            registry_url,
            anthropic_api_key,
            model,
            http_timeout: Duration::from_secs(http_timeout_secs),
        }
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = std::env::var(key).ok()?;
    Some(
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}
