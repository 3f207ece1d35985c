//! Agent Onboard: guided intake wizard for registering a company's agent.

pub mod config;
pub mod error;
pub mod services;
pub mod wizard;
