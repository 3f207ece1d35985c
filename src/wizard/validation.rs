//! Synchronous field validation for each step.
//!
//! Validation never touches the network. Each validator returns the full set
//! of violated fields so the caller can surface them together.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::WizardConfig;

use super::model::{CompanyProfile, PersonProfile, email_domain};

/// Field names used as error keys.
pub mod fields {
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const EMAIL: &str = "email";
    pub const CODE: &str = "code";
    pub const COMPANY_NAME: &str = "company_name";
    pub const WEBSITE: &str = "website";
}

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Field name → human-readable message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// One-line rendering for logs and error displays.
    pub fn summary(&self) -> String {
        self.iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// `Ok(())` when empty, otherwise the errors themselves.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Check an email address: shape first, then the free-provider denylist.
pub fn validate_email(email: &str, config: &WizardConfig) -> Option<&'static str> {
    if !EMAIL_PATTERN.is_match(email) {
        return Some("Invalid email format");
    }
    let Some(domain) = email_domain(email) else {
        return Some("Business email is required");
    };
    if config.is_free_email_domain(domain) {
        return Some("Please use a business email");
    }
    None
}

pub fn validate_sign_up(person: &PersonProfile, config: &WizardConfig) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if person.first_name.trim().is_empty() {
        errors.insert(fields::FIRST_NAME, "First name is required");
    }
    if person.last_name.trim().is_empty() {
        errors.insert(fields::LAST_NAME, "Last name is required");
    }
    if let Some(message) = validate_email(&person.email, config) {
        errors.insert(fields::EMAIL, message);
    }
    errors.into_result()
}

pub fn validate_code(code: &str, config: &WizardConfig) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if code.trim().chars().count() != config.code_length {
        errors.insert(
            fields::CODE,
            format!("Code must be {} characters", config.code_length),
        );
    }
    errors.into_result()
}

pub fn validate_company(company: &CompanyProfile) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if company.company_name.trim().is_empty() {
        errors.insert(fields::COMPANY_NAME, "Company name is required");
    }
    if company.website.trim().is_empty() {
        errors.insert(fields::WEBSITE, "Website is required");
    }
    errors.into_result()
}
