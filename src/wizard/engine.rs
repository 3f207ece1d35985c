//! WizardEngine: drives a `WizardState` against the collaborators.
//!
//! At most one collaborator call is outstanding per engine. The busy flag is
//! raised in the same critical section that validates and builds the request
//! and lowered in the one that applies the outcome, so neither a second call
//! nor a half-applied result can be observed. The state lock is never held
//! across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::config::WizardConfig;
use crate::error::Result;
use crate::services::WizardServices;

use super::model::{CompanyProfile, GoalsProfile, RegistrySnapshot};
use super::state::{FieldUpdate, RefreshMode, Request, Transition, WizardState, WizardStatus};
use super::step::Step;

/// One onboarding session wired to its collaborators.
pub struct WizardEngine {
    state: Mutex<WizardState>,
    services: WizardServices,
}

impl WizardEngine {
    pub fn new(config: Arc<WizardConfig>, services: WizardServices) -> Self {
        Self {
            state: Mutex::new(WizardState::new(config)),
            services,
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn status(&self) -> WizardStatus {
        self.lock().status()
    }

    pub fn step(&self) -> Step {
        self.lock().step()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().is_busy()
    }

    pub fn progress(&self) -> u8 {
        self.lock().progress()
    }

    pub fn agent_id(&self) -> Option<String> {
        self.lock().agent_id().map(str::to_string)
    }

    /// Run a read-only closure against the current state.
    pub fn inspect<T>(&self, f: impl FnOnce(&WizardState) -> T) -> T {
        f(&self.lock())
    }

    // ── Writes ──────────────────────────────────────────────────────

    pub fn set_field(&self, update: FieldUpdate) {
        self.lock().apply(update);
    }

    /// Apply several field edits under one lock.
    pub fn edit(&self, f: impl FnOnce(&mut WizardState)) {
        f(&mut self.lock());
    }

    /// Validate the current step and move forward, calling out first when
    /// the step requires it.
    pub async fn advance(&self) -> Result<Step> {
        let transition = self.lock().begin_advance()?;
        match transition {
            Transition::Moved(step) => Ok(step),
            Transition::Call(request) => self.execute(request).await,
        }
    }

    pub fn retreat(&self) -> Result<Step> {
        self.lock().retreat()
    }

    /// Submit the assembled profile. Returns the registry's agent id.
    pub async fn submit(&self) -> Result<String> {
        let request = self.lock().begin_submit()?;
        self.execute(request).await?;
        Ok(self.agent_id().unwrap_or_default())
    }

    /// Merge a directory lookup for the email's domain into the company draft.
    pub async fn autofill_company(&self) -> Result<CompanyProfile> {
        let request = self.lock().begin_autofill()?;
        self.execute(request).await?;
        Ok(self.lock().company().clone())
    }

    /// Replace the goals with generated drafts.
    pub async fn generate_goals(&self) -> Result<GoalsProfile> {
        let request = self.lock().begin_generate_goals()?;
        self.execute(request).await?;
        Ok(self.lock().goals().clone())
    }

    /// Re-read the registry view shown after success.
    pub async fn refresh_registry(&self) -> Result<RegistrySnapshot> {
        let request = self.lock().begin_refresh_registry()?;
        self.execute(request).await?;
        Ok(self.lock().registry().cloned().unwrap_or_default())
    }

    /// Throw the session away and start over at `SignUp`.
    pub fn reset(&self) -> Result<()> {
        self.lock().reset()
    }

    // ── Internals ───────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, WizardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue `request` and apply its outcome. The state is already busy.
    async fn execute(&self, request: Request) -> Result<Step> {
        let flight = InFlight::new(self);
        match request {
            Request::SendCode(person) => {
                info!(domain = %person.company_domain, "Sending verification code");
                let outcome = self.services.verification.send_code(&person).await;
                flight.finish(|s| s.complete_send_code(outcome))
            }
            Request::CheckCode { email, code } => {
                let outcome = self.services.verification.check_code(&email, &code).await;
                flight.finish(|s| s.complete_check_code(outcome))
            }
            Request::Lookup { domain } => {
                info!(domain = %domain, "Looking up company details");
                let outcome = self.services.directory.lookup(&domain).await;
                flight.finish(|s| s.complete_lookup(&domain, outcome).map(|()| s.step()))
            }
            Request::GenerateGoals(company) => {
                let outcome = self.services.goals.generate(&company).await;
                flight.finish(|s| s.complete_generate_goals(outcome).map(|()| s.step()))
            }
            Request::CreateRecord(payload) => {
                let outcome = self.services.registry.create_record(&payload).await;
                // Still busy on success: the registry view is refreshed next.
                flight.finish(|s| s.complete_submit(outcome))?;
                self.read_registry(InFlight::new(self), RefreshMode::AfterSubmit)
                    .await
            }
            Request::ReadRegistry => self.read_registry(flight, RefreshMode::Requested).await,
        }
    }

    async fn read_registry(&self, flight: InFlight<'_>, mode: RefreshMode) -> Result<Step> {
        let outcome = self.services.registry.read_all().await;
        flight.finish(|s| s.complete_refresh_registry(mode, outcome).map(|()| s.step()))
    }
}

/// Releases the busy flag if the owning future is dropped mid-call.
struct InFlight<'a> {
    engine: &'a WizardEngine,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(engine: &'a WizardEngine) -> Self {
        Self {
            engine,
            armed: true,
        }
    }

    fn finish<T>(mut self, apply: impl FnOnce(&mut WizardState) -> T) -> T {
        self.armed = false;
        apply(&mut self.engine.lock())
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.engine.lock().release();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::result::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Notify, Semaphore};

    use super::*;
    use crate::error::{ServiceError, WizardError};
    use crate::services::{
        DirectoryService, GoalGenerator, RegistryService, VerificationService,
    };
    use crate::wizard::model::{
        CompanyLookup, OnboardingPayload, PersonProfile, ServicesField, SubmissionReceipt,
    };
    use crate::wizard::validation::fields;

    /// Scripted collaborators that count every call.
    #[derive(Default)]
    struct Scripted {
        calls: AtomicUsize,
        send_calls: AtomicUsize,
        check_calls: AtomicUsize,
        lookup_calls: AtomicUsize,
        fail_check: bool,
        fail_lookup: bool,
        fail_submit: bool,
        fail_registry: bool,
        lookup: CompanyLookup,
        /// When set, `lookup` waits here after announcing itself on `entered`.
        gate: Option<Arc<Semaphore>>,
        entered: Notify,
    }

    impl Scripted {
        fn total_calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VerificationService for Scripted {
        async fn send_code(&self, person: &PersonProfile) -> Result<PersonProfile, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PersonProfile {
                user_id: Some("user-1".to_string()),
                ..person.clone()
            })
        }

        async fn check_code(&self, _email: &str, code: &str) -> Result<(), ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.check_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_check || code != "123456" {
                return Err(ServiceError::Verification("Invalid or expired code".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DirectoryService for Scripted {
        async fn lookup(&self, _domain: &str) -> Result<CompanyLookup, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.lookup_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                self.entered.notify_one();
                let _permit = gate.acquire().await.expect("gate closed");
            }
            if self.fail_lookup {
                return Err(ServiceError::Lookup("directory offline".to_string()));
            }
            Ok(self.lookup.clone())
        }
    }

    #[async_trait]
    impl GoalGenerator for Scripted {
        async fn generate(&self, company: &CompanyProfile) -> Result<GoalsProfile, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GoalsProfile {
                short_term: format!("Win 3 pilots for {}", company.company_name),
                long_term: "Become the default partner".to_string(),
            })
        }
    }

    #[async_trait]
    impl RegistryService for Scripted {
        async fn create_record(
            &self,
            payload: &OnboardingPayload,
        ) -> Result<SubmissionReceipt, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_submit {
                return Err(ServiceError::Submission("registry unavailable".to_string()));
            }
            assert!(payload.user.verified);
            Ok(SubmissionReceipt {
                agent_id: "agent-123".to_string(),
                user_id: None,
            })
        }

        async fn read_all(&self) -> Result<RegistrySnapshot, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_registry {
                return Err(ServiceError::Registry("registry unreadable".to_string()));
            }
            let mut snapshot = RegistrySnapshot::default();
            snapshot
                .agents
                .insert("agent-123".to_string(), serde_json::json!({"ok": true}));
            Ok(snapshot)
        }
    }

    fn engine_with(mock: Scripted) -> (Arc<WizardEngine>, Arc<Scripted>) {
        let mock = Arc::new(mock);
        let services = WizardServices {
            verification: mock.clone(),
            directory: mock.clone(),
            goals: mock.clone(),
            registry: mock.clone(),
        };
        let engine = Arc::new(WizardEngine::new(
            Arc::new(WizardConfig::default()),
            services,
        ));
        (engine, mock)
    }

    async fn engine_at_company_info(mock: Scripted) -> (Arc<WizardEngine>, Arc<Scripted>) {
        let (engine, mock) = engine_with(mock);
        engine.edit(|s| {
            s.set_first_name("Jane");
            s.set_last_name("Doe");
            s.set_email("jane@acme.io");
        });
        engine.advance().await.unwrap();
        engine.set_field(FieldUpdate::Code("123456".to_string()));
        engine.advance().await.unwrap();
        assert_eq!(engine.step(), Step::CompanyInfo);
        (engine, mock)
    }

    #[tokio::test]
    async fn happy_path_ends_at_success() {
        let (engine, mock) = engine_with(Scripted::default());

        engine.edit(|s| {
            s.set_first_name("Jane");
            s.set_last_name("Doe");
            s.set_email("jane@acme.io");
            s.set_role_title("CEO");
        });
        assert_eq!(engine.advance().await, Ok(Step::VerifyCode));
        assert_eq!(engine.inspect(|s| s.person().user_id.clone()), Some("user-1".to_string()));

        engine.set_field(FieldUpdate::Code("123456".to_string()));
        assert_eq!(engine.advance().await, Ok(Step::CompanyInfo));
        assert!(engine.inspect(|s| s.person().verified));

        engine.edit(|s| {
            s.set_company_name("Acme");
            s.set_website("https://acme.io");
        });
        assert_eq!(engine.advance().await, Ok(Step::Goals));

        engine.edit(|s| {
            s.set_short_term_goal("anything");
            s.set_long_term_goal("at all");
        });
        assert_eq!(engine.advance().await, Ok(Step::Review));

        let agent_id = engine.submit().await.unwrap();
        assert_eq!(agent_id, "agent-123");

        let status = engine.status();
        assert_eq!(status.step, Step::Success);
        assert_eq!(status.progress, 100);
        assert!(!status.busy);
        assert!(status.registry.unwrap().agents.contains_key("agent-123"));
        // send, check, create, read
        assert_eq!(mock.total_calls(), 4);
    }

    #[tokio::test]
    async fn invalid_sign_up_never_calls_out() {
        let (engine, mock) = engine_with(Scripted::default());
        engine.set_field(FieldUpdate::Email("jane@gmail.com".to_string()));

        let err = engine.advance().await.unwrap_err();
        let WizardError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains(fields::FIRST_NAME));
        assert!(errors.contains(fields::LAST_NAME));
        assert!(errors.contains(fields::EMAIL));
        assert_eq!(engine.step(), Step::SignUp);
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn short_code_never_reaches_verification() {
        let (engine, mock) = engine_with(Scripted::default());
        engine.edit(|s| {
            s.set_first_name("Jane");
            s.set_last_name("Doe");
            s.set_email("jane@acme.io");
        });
        engine.advance().await.unwrap();

        engine.set_field(FieldUpdate::Code("12345".to_string()));
        assert!(matches!(
            engine.advance().await,
            Err(WizardError::Validation(_))
        ));
        assert_eq!(mock.check_calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.step(), Step::VerifyCode);
    }

    #[tokio::test]
    async fn rejected_code_is_a_top_level_error() {
        let (engine, _mock) = engine_with(Scripted {
            fail_check: true,
            ..Default::default()
        });
        engine.edit(|s| {
            s.set_first_name("Jane");
            s.set_last_name("Doe");
            s.set_email("jane@acme.io");
        });
        engine.advance().await.unwrap();
        engine.set_field(FieldUpdate::Code("123456".to_string()));

        assert!(matches!(
            engine.advance().await,
            Err(WizardError::Service(ServiceError::Verification(_)))
        ));
        let status = engine.status();
        assert_eq!(status.step, Step::VerifyCode);
        assert_eq!(status.error.as_deref(), Some("Invalid or expired code"));
        assert!(status.field_errors.is_empty());
        assert!(!status.person.verified);
    }

    #[tokio::test]
    async fn autofill_normalizes_services_and_clears_ein() {
        let (engine, _mock) = engine_at_company_info(Scripted {
            lookup: CompanyLookup {
                company_name: Some("Acme Advisory".to_string()),
                website: Some("https://acme.io".to_string()),
                services: Some(ServicesField::Text(
                    "Consulting. Advisory. Training.".to_string(),
                )),
                ..Default::default()
            },
            ..Default::default()
        })
        .await;
        engine.set_field(FieldUpdate::Ein("12-3456789".to_string()));

        let company = engine.autofill_company().await.unwrap();
        assert_eq!(company.services, vec!["Consulting", "Advisory", "Training"]);
        assert_eq!(company.domains, vec!["acme.io"]);
        assert_eq!(company.company_name, "Acme Advisory");
        assert!(company.ein.is_none());
        assert_eq!(engine.step(), Step::CompanyInfo);
    }

    #[tokio::test]
    async fn autofill_without_domain_issues_no_call() {
        let (engine, mock) = engine_at_company_info(Scripted::default()).await;
        let calls_before = mock.total_calls();
        engine.set_field(FieldUpdate::Email("jane.acme.io".to_string()));

        assert_eq!(
            engine.autofill_company().await,
            Err(WizardError::MissingDomain)
        );
        assert_eq!(mock.total_calls(), calls_before);
        assert!(engine.status().error.is_some());
    }

    #[tokio::test]
    async fn autofill_failure_is_non_fatal() {
        let (engine, _mock) = engine_at_company_info(Scripted {
            fail_lookup: true,
            ..Default::default()
        })
        .await;
        engine.edit(|s| {
            s.set_company_name("Typed by hand");
            s.set_website("https://acme.io");
        });

        assert!(engine.autofill_company().await.is_err());
        assert_eq!(engine.inspect(|s| s.company().company_name.clone()), "Typed by hand");

        // Manual entry still completes the step.
        assert_eq!(engine.advance().await, Ok(Step::Goals));
        assert!(engine.status().error.is_none());
    }

    #[tokio::test]
    async fn generate_goals_uses_current_company() {
        let (engine, _mock) = engine_at_company_info(Scripted::default()).await;
        engine.edit(|s| {
            s.set_company_name("Acme");
            s.set_website("https://acme.io");
        });
        engine.advance().await.unwrap();

        let goals = engine.generate_goals().await.unwrap();
        assert_eq!(goals.short_term, "Win 3 pilots for Acme");
    }

    #[tokio::test]
    async fn submit_failure_allows_resubmission() {
        let (engine, mock) = engine_at_company_info(Scripted {
            fail_submit: true,
            ..Default::default()
        })
        .await;
        engine.edit(|s| {
            s.set_company_name("Acme");
            s.set_website("https://acme.io");
        });
        engine.advance().await.unwrap();
        engine.advance().await.unwrap();

        assert!(engine.submit().await.is_err());
        let status = engine.status();
        assert_eq!(status.step, Step::Review);
        assert_eq!(status.error.as_deref(), Some("registry unavailable"));
        assert_eq!(status.company.company_name, "Acme");
        assert!(!status.busy);

        let calls = mock.total_calls();
        assert!(engine.submit().await.is_err());
        assert_eq!(mock.total_calls(), calls + 1);
    }

    #[tokio::test]
    async fn registry_refresh_failure_does_not_undo_success() {
        let (engine, _mock) = engine_at_company_info(Scripted {
            fail_registry: true,
            ..Default::default()
        })
        .await;
        engine.edit(|s| {
            s.set_company_name("Acme");
            s.set_website("https://acme.io");
        });
        engine.advance().await.unwrap();
        engine.advance().await.unwrap();

        assert_eq!(engine.submit().await, Ok("agent-123".to_string()));
        let status = engine.status();
        assert_eq!(status.step, Step::Success);
        assert!(status.error.is_none());
        assert!(status.registry.is_none());

        // An explicit refresh does report the failure.
        assert!(engine.refresh_registry().await.is_err());
        assert!(engine.status().error.is_some());
        assert_eq!(engine.step(), Step::Success);
    }

    #[tokio::test]
    async fn busy_spans_the_whole_call_and_blocks_a_second_one() {
        let gate = Arc::new(Semaphore::new(0));
        let (engine, mock) = engine_at_company_info(Scripted {
            gate: Some(gate.clone()),
            ..Default::default()
        })
        .await;

        let task = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.autofill_company().await })
        };
        mock.entered.notified().await;

        assert!(engine.is_busy());
        assert_eq!(engine.autofill_company().await, Err(WizardError::Busy));
        assert_eq!(engine.advance().await, Err(WizardError::Busy));
        assert_eq!(engine.retreat(), Err(WizardError::Busy));
        assert_eq!(mock.lookup_calls.load(Ordering::SeqCst), 1);

        gate.add_permits(1);
        task.await.unwrap().unwrap();
        assert!(!engine.is_busy());
    }

    #[tokio::test]
    async fn dropped_call_releases_busy() {
        let gate = Arc::new(Semaphore::new(0));
        let (engine, _mock) = engine_at_company_info(Scripted {
            gate: Some(gate),
            ..Default::default()
        })
        .await;
        engine.set_field(FieldUpdate::CompanyName("Kept".to_string()));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), engine.autofill_company()).await;
        assert!(abandoned.is_err());
        assert!(!engine.is_busy());
        assert_eq!(engine.inspect(|s| s.company().company_name.clone()), "Kept");
    }

    #[tokio::test]
    async fn reset_starts_a_fresh_session() {
        let (engine, _mock) = engine_at_company_info(Scripted::default()).await;
        engine.reset().unwrap();
        let status = engine.status();
        assert_eq!(status.step, Step::SignUp);
        assert!(status.person.email.is_empty());
        assert!(!status.person.verified);
    }
}
