//! REST client for the registry backend, which also owns email verification.
//!
//! Endpoints:
//! - `POST /api/signup` (person → canonical person, sends the code)
//! - `POST /api/verify-otp` (`{email, otp}`)
//! - `POST /api/agents` (onboarding payload → `{agent_id}`)
//! - `GET  /api/registry` (`{users, agents}`)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ServiceError;
use crate::wizard::{OnboardingPayload, PersonProfile, RegistrySnapshot, SubmissionReceipt};

use super::{RegistryService, VerificationService};

#[derive(Serialize)]
struct VerifyRequest<'a> {
    email: &'a str,
    otp: &'a str,
}

/// HTTP adapter for the verification and registry collaborators.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Unavailable(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, String> {
        debug!(path, "POST to registry backend");
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        check_status(resp).await
    }

    async fn get(&self, path: &str) -> Result<Response, String> {
        debug!(path, "GET from registry backend");
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        check_status(resp).await
    }
}

/// Turn a non-2xx response into its error message.
///
/// Prefers the `error` (or `message`) field of a JSON body, then the raw
/// body, then the status line.
async fn check_status(resp: Response) -> Result<Response, String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let raw = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&raw)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .or_else(|| (!raw.trim().is_empty()).then(|| raw.trim().to_string()))
        .unwrap_or_else(|| format!("Request failed with status {status}"));
    Err(message)
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, String> {
    resp.json::<T>()
        .await
        .map_err(|e| format!("Unexpected response from registry backend: {e}"))
}

#[async_trait]
impl VerificationService for HttpBackend {
    async fn send_code(&self, person: &PersonProfile) -> Result<PersonProfile, ServiceError> {
        let resp = self
            .post("/api/signup", person)
            .await
            .map_err(ServiceError::Verification)?;
        decode(resp).await.map_err(ServiceError::Verification)
    }

    async fn check_code(&self, email: &str, code: &str) -> Result<(), ServiceError> {
        self.post("/api/verify-otp", &VerifyRequest { email, otp: code })
            .await
            .map_err(ServiceError::Verification)?;
        Ok(())
    }
}

#[async_trait]
impl RegistryService for HttpBackend {
    async fn create_record(
        &self,
        payload: &OnboardingPayload,
    ) -> Result<SubmissionReceipt, ServiceError> {
        let resp = self
            .post("/api/agents", payload)
            .await
            .map_err(ServiceError::Submission)?;
        decode(resp).await.map_err(ServiceError::Submission)
    }

    async fn read_all(&self) -> Result<RegistrySnapshot, ServiceError> {
        let resp = self
            .get("/api/registry")
            .await
            .map_err(ServiceError::Registry)?;
        decode(resp).await.map_err(ServiceError::Registry)
    }
}
