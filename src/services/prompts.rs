//! Prompts for company autofill and goal drafting, and parsing of the
//! model's JSON answers.

use crate::error::ServiceError;
use crate::wizard::{CompanyLookup, CompanyProfile, GoalsProfile};

pub const ENRICHMENT_SYSTEM_PROMPT: &str = "\
You are a business research assistant helping a company register an AI agent.
Answer with ONLY valid JSON, no explanation or markdown formatting.
If you are unsure about a field, use null rather than guessing.";

/// Build the prompt asking for a company profile behind `domain`.
pub fn autofill_prompt(domain: &str, pricing_models: &[String]) -> String {
    let pricing = if pricing_models.is_empty() {
        "string or null".to_string()
    } else {
        let options: Vec<String> = pricing_models.iter().map(|m| format!("\"{m}\"")).collect();
        format!("{} | null", options.join(" | "))
    };

    format!(
        r#"Describe the company that owns the web domain "{domain}".

Return this JSON object:
{{
  "company_name": "string or null",
  "website": "full https URL or null",
  "domains": ["other domains the company operates, including {domain}"],
  "policies": "known compliance standards or policies (e.g. SOC2, GDPR) or null",
  "pricing_model": {pricing},
  "services": "core products or services as short sentences, each ending with a period"
}}"#
    )
}

/// Build the prompt asking for goals that fit `company`.
pub fn goals_prompt(company: &CompanyProfile) -> String {
    let services = if company.services.is_empty() {
        "not specified".to_string()
    } else {
        company.services.join(", ")
    };
    let policies = if company.policies.trim().is_empty() {
        "not specified"
    } else {
        company.policies.trim()
    };

    format!(
        r#"Draft business goals for this company's AI agent.

Company: {name}
Website: {website}
Pricing model: {pricing}
Services: {services}
Policies: {policies}

Return this JSON object:
{{
  "short_term": "2-4 concrete goals for the next 3-6 months, as one paragraph",
  "long_term": "2-4 strategic goals for the next 1-3 years, as one paragraph"
}}"#,
        name = company.company_name,
        website = company.website,
        pricing = company.pricing_model,
    )
}

/// Locate the JSON object in a model answer.
///
/// Tolerates code fences and chatter around the object.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn parse_lookup(text: &str) -> Result<CompanyLookup, ServiceError> {
    let json = extract_json(text)
        .ok_or_else(|| ServiceError::Lookup("No JSON object in autofill answer".to_string()))?;
    serde_json::from_str(json)
        .map_err(|e| ServiceError::Lookup(format!("Malformed autofill answer: {e}")))
}

pub fn parse_goals(text: &str) -> Result<GoalsProfile, ServiceError> {
    let json = extract_json(text)
        .ok_or_else(|| ServiceError::Generation("No JSON object in goals answer".to_string()))?;
    let goals: GoalsProfile = serde_json::from_str(json)
        .map_err(|e| ServiceError::Generation(format!("Malformed goals answer: {e}")))?;
    if goals.short_term.trim().is_empty() && goals.long_term.trim().is_empty() {
        return Err(ServiceError::Generation("Model returned empty goals".to_string()));
    }
    Ok(goals)
}
