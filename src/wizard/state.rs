//! Wizard state machine.
//!
//! `WizardState` is synchronous and performs no I/O. Every operation that
//! needs a collaborator is split in two: a `begin_*` call that validates,
//! marks the session busy and hands back the `Request` to issue, and a
//! `complete_*` call that applies the outcome in one step. The async driver
//! lives in `engine`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::WizardConfig;
use crate::error::{ServiceError, WizardError};

use super::model::{
    AgentDraft, CompanyLookup, CompanyProfile, GoalsProfile, OnboardingPayload, PersonProfile,
    RegistrySnapshot, SubmissionReceipt, split_services,
};
use super::step::Step;
use super::validation::{FieldErrors, validate_code, validate_company, validate_sign_up};

pub const AUTOFILL_FAILED: &str =
    "Autofill failed. You can continue by filling company details manually.";
pub const GOALS_FAILED: &str = "Goal generation failed. You can still enter goals manually.";

/// An external call the driver must issue on behalf of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SendCode(PersonProfile),
    CheckCode { email: String, code: String },
    Lookup { domain: String },
    GenerateGoals(CompanyProfile),
    CreateRecord(OnboardingPayload),
    ReadRegistry,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendCode(_) => "send_code",
            Self::CheckCode { .. } => "check_code",
            Self::Lookup { .. } => "lookup",
            Self::GenerateGoals(_) => "generate_goals",
            Self::CreateRecord(_) => "create_record",
            Self::ReadRegistry => "read_registry",
        }
    }
}

/// What a forward move turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Moved locally, no call needed.
    Moved(Step),
    /// The session is now busy until the request's outcome is applied.
    Call(Request),
}

/// Why the registry view is being refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Follow-up to a successful submission; failures only leave the view stale.
    AfterSubmit,
    /// Explicitly requested; failures surface as the top-level error.
    Requested,
}

/// A single field edit. Setters never validate and never clear errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate {
    FirstName(String),
    LastName(String),
    Email(String),
    RoleTitle(String),
    Code(String),
    CompanyName(String),
    Ein(String),
    Website(String),
    Domains(Vec<String>),
    Policies(String),
    PricingModel(String),
    Services(Vec<String>),
    /// Period-delimited services text, split into entries.
    ServicesText(String),
    ShortTerm(String),
    LongTerm(String),
}

/// Serializable snapshot of the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardStatus {
    pub step: Step,
    pub step_index: usize,
    pub total_steps: usize,
    pub title: String,
    pub subtitle: String,
    pub progress: u8,
    /// Stepper labels, one per step in order.
    pub step_labels: Vec<String>,
    pub person: PersonProfile,
    pub company: CompanyProfile,
    pub goals: GoalsProfile,
    pub code: String,
    pub field_errors: FieldErrors,
    pub busy: bool,
    pub error: Option<String>,
    pub agent_id: Option<String>,
    pub registry: Option<RegistrySnapshot>,
    pub pricing_models: Vec<String>,
}

/// One onboarding session.
#[derive(Debug, Clone)]
pub struct WizardState {
    config: Arc<WizardConfig>,
    step: Step,
    person: PersonProfile,
    company: CompanyProfile,
    goals: GoalsProfile,
    code: String,
    field_errors: FieldErrors,
    busy: bool,
    error: Option<String>,
    agent_id: Option<String>,
    registry: Option<RegistrySnapshot>,
}

impl WizardState {
    pub fn new(config: Arc<WizardConfig>) -> Self {
        let company = CompanyProfile::new(config.default_pricing_model());
        Self {
            config,
            step: Step::SignUp,
            person: PersonProfile::default(),
            company,
            goals: GoalsProfile::default(),
            code: String::new(),
            field_errors: FieldErrors::new(),
            busy: false,
            error: None,
            agent_id: None,
            registry: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn person(&self) -> &PersonProfile {
        &self.person
    }

    pub fn company(&self) -> &CompanyProfile {
        &self.company
    }

    pub fn goals(&self) -> &GoalsProfile {
        &self.goals
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Identifier returned by the registry; present only at `Success`.
    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn registry(&self) -> Option<&RegistrySnapshot> {
        self.registry.as_ref()
    }

    pub fn progress(&self) -> u8 {
        self.step.progress()
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn status(&self) -> WizardStatus {
        WizardStatus {
            step: self.step,
            step_index: self.step.index(),
            total_steps: Step::ALL.len(),
            title: self.step.title().to_string(),
            subtitle: self.step.subtitle().to_string(),
            progress: self.progress(),
            step_labels: Step::ALL.iter().map(|s| s.label().to_string()).collect(),
            person: self.person.clone(),
            company: self.company.clone(),
            goals: self.goals.clone(),
            code: self.code.clone(),
            field_errors: self.field_errors.clone(),
            busy: self.busy,
            error: self.error.clone(),
            agent_id: self.agent_id.clone(),
            registry: self.registry.clone(),
            pricing_models: self.config.pricing_models.clone(),
        }
    }

    // ── Field mutators ──────────────────────────────────────────────

    pub fn set_first_name(&mut self, value: impl Into<String>) {
        self.person.first_name = value.into();
    }

    pub fn set_last_name(&mut self, value: impl Into<String>) {
        self.person.last_name = value.into();
    }

    pub fn set_email(&mut self, value: impl Into<String>) {
        self.person.email = value.into();
    }

    pub fn set_role_title(&mut self, value: impl Into<String>) {
        self.person.role_title = non_empty(value.into());
    }

    pub fn set_code(&mut self, value: impl Into<String>) {
        self.code = value.into();
    }

    pub fn set_company_name(&mut self, value: impl Into<String>) {
        self.company.company_name = value.into();
    }

    pub fn set_ein(&mut self, value: impl Into<String>) {
        self.company.ein = non_empty(value.into());
    }

    pub fn set_website(&mut self, value: impl Into<String>) {
        self.company.website = value.into();
    }

    pub fn set_domains(&mut self, value: Vec<String>) {
        self.company.domains = value;
    }

    pub fn set_policies(&mut self, value: impl Into<String>) {
        self.company.policies = value.into();
    }

    pub fn set_pricing_model(&mut self, value: impl Into<String>) {
        self.company.pricing_model = value.into();
    }

    pub fn set_services(&mut self, value: Vec<String>) {
        self.company.services = value;
    }

    pub fn set_services_text(&mut self, text: &str) {
        self.company.services = split_services(text);
    }

    pub fn set_short_term_goal(&mut self, value: impl Into<String>) {
        self.goals.short_term = value.into();
    }

    pub fn set_long_term_goal(&mut self, value: impl Into<String>) {
        self.goals.long_term = value.into();
    }

    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::FirstName(v) => self.set_first_name(v),
            FieldUpdate::LastName(v) => self.set_last_name(v),
            FieldUpdate::Email(v) => self.set_email(v),
            FieldUpdate::RoleTitle(v) => self.set_role_title(v),
            FieldUpdate::Code(v) => self.set_code(v),
            FieldUpdate::CompanyName(v) => self.set_company_name(v),
            FieldUpdate::Ein(v) => self.set_ein(v),
            FieldUpdate::Website(v) => self.set_website(v),
            FieldUpdate::Domains(v) => self.set_domains(v),
            FieldUpdate::Policies(v) => self.set_policies(v),
            FieldUpdate::PricingModel(v) => self.set_pricing_model(v),
            FieldUpdate::Services(v) => self.set_services(v),
            FieldUpdate::ServicesText(v) => self.set_services_text(&v),
            FieldUpdate::ShortTerm(v) => self.set_short_term_goal(v),
            FieldUpdate::LongTerm(v) => self.set_long_term_goal(v),
        }
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Validate the current step and move forward, or hand back the call
    /// that has to succeed first.
    pub fn begin_advance(&mut self) -> Result<Transition, WizardError> {
        self.ensure_idle()?;
        let step = self.step;
        match step {
            Step::SignUp => {
                self.clear_errors();
                validate_sign_up(&self.person, &self.config)
                    .map_err(|errors| self.reject(errors))?;
                let mut person = self.person.clone();
                person.company_domain = person.email_domain().unwrap_or_default().to_string();
                Ok(self.call(Request::SendCode(person)))
            }
            Step::VerifyCode => {
                self.clear_errors();
                validate_code(&self.code, &self.config).map_err(|errors| self.reject(errors))?;
                Ok(self.call(Request::CheckCode {
                    email: self.person.email.clone(),
                    code: self.code.trim().to_string(),
                }))
            }
            Step::CompanyInfo => {
                self.clear_errors();
                validate_company(&self.company).map_err(|errors| self.reject(errors))?;
                Ok(Transition::Moved(self.move_to(Step::Goals)))
            }
            Step::Goals => {
                self.clear_errors();
                Ok(Transition::Moved(self.move_to(Step::Review)))
            }
            // Review leaves through `begin_submit` only.
            Step::Review => Err(WizardError::WrongStep {
                operation: "advance",
                step,
            }),
            Step::Success => Err(WizardError::Terminal),
        }
    }

    /// Step back once. Non-destructive: drafted data is kept.
    pub fn retreat(&mut self) -> Result<Step, WizardError> {
        self.ensure_idle()?;
        if self.step.is_terminal() {
            return Err(WizardError::Terminal);
        }
        let previous = match self.step.previous() {
            Some(previous) if self.step.can_retreat() => previous,
            _ => return Err(WizardError::AtFirstStep),
        };
        self.clear_errors();
        info!(from = %self.step, to = %previous, "Wizard retreated");
        self.step = previous;
        Ok(previous)
    }

    pub fn begin_submit(&mut self) -> Result<Request, WizardError> {
        self.ensure_idle()?;
        self.ensure_step(Step::Review, "submit")?;
        self.clear_errors();
        let payload = OnboardingPayload {
            user: self.person.clone(),
            agent: AgentDraft {
                company_context: self.company.clone(),
                goals: self.goals.clone(),
            },
        };
        Ok(self.call_request(Request::CreateRecord(payload)))
    }

    pub fn begin_autofill(&mut self) -> Result<Request, WizardError> {
        self.ensure_idle()?;
        self.ensure_step(Step::CompanyInfo, "autofill company details")?;
        self.clear_errors();
        let Some(domain) = self.person.email_domain().map(str::to_string) else {
            let err = WizardError::MissingDomain;
            self.error = Some(err.to_string());
            return Err(err);
        };
        Ok(self.call_request(Request::Lookup { domain }))
    }

    pub fn begin_generate_goals(&mut self) -> Result<Request, WizardError> {
        self.ensure_idle()?;
        self.ensure_step(Step::Goals, "generate goals")?;
        self.clear_errors();
        Ok(self.call_request(Request::GenerateGoals(self.company.clone())))
    }

    pub fn begin_refresh_registry(&mut self) -> Result<Request, WizardError> {
        self.ensure_idle()?;
        self.ensure_step(Step::Success, "refresh the registry")?;
        self.error = None;
        Ok(self.call_request(Request::ReadRegistry))
    }

    /// Discard the session and start again at `SignUp`.
    pub fn reset(&mut self) -> Result<(), WizardError> {
        self.ensure_idle()?;
        *self = Self::new(Arc::clone(&self.config));
        info!("Wizard reset");
        Ok(())
    }

    // ── Completions ─────────────────────────────────────────────────

    pub fn complete_send_code(
        &mut self,
        outcome: Result<PersonProfile, ServiceError>,
    ) -> Result<Step, WizardError> {
        self.busy = false;
        match outcome {
            Ok(person) => {
                self.person = person;
                Ok(self.move_to(Step::VerifyCode))
            }
            Err(e) => Err(self.fail("send_code", e.to_string(), e)),
        }
    }

    pub fn complete_check_code(
        &mut self,
        outcome: Result<(), ServiceError>,
    ) -> Result<Step, WizardError> {
        self.busy = false;
        match outcome {
            Ok(()) => {
                self.person.verified = true;
                Ok(self.move_to(Step::CompanyInfo))
            }
            Err(e) => Err(self.fail("check_code", e.to_string(), e)),
        }
    }

    pub fn complete_lookup(
        &mut self,
        domain: &str,
        outcome: Result<CompanyLookup, ServiceError>,
    ) -> Result<(), WizardError> {
        self.busy = false;
        match outcome {
            Ok(lookup) => {
                self.company.apply_lookup(lookup, domain);
                info!(domain = %domain, "Company details autofilled");
                Ok(())
            }
            Err(e) => Err(self.fail("lookup", AUTOFILL_FAILED.to_string(), e)),
        }
    }

    pub fn complete_generate_goals(
        &mut self,
        outcome: Result<GoalsProfile, ServiceError>,
    ) -> Result<(), WizardError> {
        self.busy = false;
        match outcome {
            Ok(goals) => {
                self.goals = goals;
                info!("Goals generated");
                Ok(())
            }
            Err(e) => Err(self.fail("generate_goals", GOALS_FAILED.to_string(), e)),
        }
    }

    /// Apply the registry's answer to a submission.
    ///
    /// On success the session moves to `Success` but stays busy: the returned
    /// `ReadRegistry` request must be issued and completed with
    /// `RefreshMode::AfterSubmit`.
    pub fn complete_submit(
        &mut self,
        outcome: Result<SubmissionReceipt, ServiceError>,
    ) -> Result<Request, WizardError> {
        match outcome {
            Ok(receipt) => {
                info!(agent_id = %receipt.agent_id, "Onboarding submitted");
                if receipt.user_id.is_some() {
                    self.person.user_id = receipt.user_id;
                }
                self.agent_id = Some(receipt.agent_id);
                self.move_to(Step::Success);
                Ok(Request::ReadRegistry)
            }
            Err(e) => {
                self.busy = false;
                Err(self.fail("create_record", e.to_string(), e))
            }
        }
    }

    pub fn complete_refresh_registry(
        &mut self,
        mode: RefreshMode,
        outcome: Result<RegistrySnapshot, ServiceError>,
    ) -> Result<(), WizardError> {
        self.busy = false;
        match (outcome, mode) {
            (Ok(snapshot), _) => {
                self.registry = Some(snapshot);
                Ok(())
            }
            (Err(e), RefreshMode::AfterSubmit) => {
                warn!(error = %e, "Registry refresh after submit failed; view left stale");
                Ok(())
            }
            (Err(e), RefreshMode::Requested) => Err(self.fail("read_registry", e.to_string(), e)),
        }
    }

    /// Drop the busy flag without applying an outcome.
    ///
    /// Used when an in-flight call is abandoned; drafted data is untouched.
    pub fn release(&mut self) {
        if self.busy {
            warn!(step = %self.step, "Outstanding call abandoned");
            self.busy = false;
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn ensure_idle(&self) -> Result<(), WizardError> {
        if self.busy {
            warn!(step = %self.step, "Operation refused while busy");
            return Err(WizardError::Busy);
        }
        Ok(())
    }

    fn ensure_step(&self, expected: Step, operation: &'static str) -> Result<(), WizardError> {
        if self.step == expected {
            return Ok(());
        }
        if self.step.is_terminal() {
            return Err(WizardError::Terminal);
        }
        Err(WizardError::WrongStep {
            operation,
            step: self.step,
        })
    }

    fn clear_errors(&mut self) {
        self.error = None;
        self.field_errors.clear();
    }

    fn reject(&mut self, errors: FieldErrors) -> WizardError {
        debug!(step = %self.step, errors = %errors.summary(), "Validation failed");
        self.field_errors = errors.clone();
        WizardError::Validation(errors)
    }

    fn fail(&mut self, call: &'static str, message: String, cause: ServiceError) -> WizardError {
        warn!(step = %self.step, call, error = %cause, "Collaborator call failed");
        self.error = Some(message);
        WizardError::Service(cause)
    }

    fn call(&mut self, request: Request) -> Transition {
        Transition::Call(self.call_request(request))
    }

    fn call_request(&mut self, request: Request) -> Request {
        debug!(step = %self.step, call = request.name(), "Issuing collaborator call");
        self.busy = true;
        request
    }

    fn move_to(&mut self, next: Step) -> Step {
        debug_assert!(self.step.can_advance_to(next));
        info!(from = %self.step, to = %next, "Wizard advanced");
        self.step = next;
        next
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}
