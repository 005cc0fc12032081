//! Orchestrator host binary.
//!
//! Loads the TOML config (first argument or `XIAOBAN_CONFIG`), wires the
//! HTTP adapters and the LLM intent engine, and serves the triage HTTP
//! surface. Audio ingest arrives over the external transport and is not
//! launched here; the `xiaoban-segment-wav` tool drives the segmenter
//! offline.

use std::path::PathBuf;
use std::sync::Arc;

use xiaoban::adapters::{AdapterSet, HttpSip, HttpSmartHome, LocalSocial};
use xiaoban::config::CompanionConfig;
use xiaoban::llm::{IntentEngine, StructuredIntentEngine};
use xiaoban::orchestrator::audit::AuditLog;
use xiaoban::orchestrator::Orchestrator;
use xiaoban::server::{serve, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("XIAOBAN_CONFIG").ok())
        .map(PathBuf::from);
    let config = CompanionConfig::load_or_default(config_path.as_deref())?;

    tracing::info!(
        bind = config.server.bind.as_str(),
        llm_backend = ?config.llm.backend,
        "xiaoban-host starting"
    );

    let audit = AuditLog::open(&config.audit)?;
    let intent_engine: Arc<dyn IntentEngine> =
        Arc::new(StructuredIntentEngine::from_config(&config.llm)?);

    let adapter_timeout = config.orchestrator.adapter_timeout();
    let adapters = AdapterSet {
        smart_home: Arc::new(HttpSmartHome::new(
            &config.orchestrator.smart_home_url,
            adapter_timeout,
        )?),
        sip: Arc::new(HttpSip::new(&config.orchestrator.sip_url, adapter_timeout)?),
        social: Arc::new(LocalSocial),
    };

    let orchestrator = Arc::new(Orchestrator::new(
        &config.guard,
        config.orchestrator.clone(),
        Arc::clone(&intent_engine),
        adapters,
        audit,
    ));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    serve(
        listener,
        AppState {
            orchestrator,
            intent_engine,
        },
    )
    .await?;

    tracing::info!("xiaoban-host shut down");
    Ok(())
}
