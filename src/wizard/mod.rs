//! Onboarding wizard: a fixed sequence of steps that collects a person, their
//! company and their goals, verifies the email, and submits everything to the
//! registry.
//!
//! `state` holds the synchronous state machine; `engine` drives it against
//! the collaborators in `crate::services`; `routes` exposes it over HTTP.

pub mod engine;
pub mod model;
pub mod routes;
pub mod state;
pub mod step;
pub mod validation;

pub use engine::WizardEngine;
pub use model::{
    AgentDraft, CompanyLookup, CompanyProfile, GoalsProfile, OnboardingPayload, PersonProfile,
    RegistrySnapshot, ServicesField, SubmissionReceipt,
};
pub use routes::wizard_routes;
pub use state::{FieldUpdate, Request, Transition, WizardState, WizardStatus};
pub use step::Step;
pub use validation::FieldErrors;
