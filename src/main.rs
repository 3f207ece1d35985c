use std::sync::Arc;

use agent_onboard::config::{ServerConfig, WizardConfig};
use agent_onboard::services::{HttpBackend, LlmEnrichment, WizardServices};
use agent_onboard::wizard::{WizardEngine, wizard_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let wizard_config = Arc::new(WizardConfig::from_env()?);
    let server_config = ServerConfig::from_env();

    eprintln!("🧭 Agent Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Wizard API: http://0.0.0.0:{}/api/wizard", server_config.port);

    let mut services = WizardServices::in_memory(&wizard_config);

    // ── Verification + registry ──────────────────────────────────────────
    match &server_config.registry_url {
        Some(url) => {
            let backend = Arc::new(HttpBackend::new(url, server_config.http_timeout)?);
            eprintln!("   Registry: {}", backend.base_url());
            services.verification = backend.clone();
            services.registry = backend;
        }
        None => {
            eprintln!("   Registry: in-memory (codes are printed to the log)");
        }
    }

    // ── Enrichment ───────────────────────────────────────────────────────
    match &server_config.anthropic_api_key {
        Some(key) => {
            let enrichment = Arc::new(
                LlmEnrichment::anthropic(key, &server_config.model)?
                    .with_pricing_models(wizard_config.pricing_models.clone())
                    .with_timeout(server_config.http_timeout),
            );
            eprintln!("   Enrichment: {}", enrichment.model_name());
            services.directory = enrichment.clone();
            services.goals = enrichment;
        }
        None => {
            eprintln!("   Enrichment: disabled (set ANTHROPIC_API_KEY to enable)");
        }
    }

    let engine = Arc::new(WizardEngine::new(wizard_config, services));

    let app = wizard_routes(engine);
    let addr = format!("0.0.0.0:{}", server_config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(port = server_config.port, "Wizard server started");
    axum::serve(listener, app).await?;

    Ok(())
}
