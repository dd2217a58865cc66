use std::sync::Arc;

use anyhow::Context;

use placement_alert::api::{ApiState, api_routes};
use placement_alert::attachments::AttachmentScanner;
use placement_alert::channels::{ImapMailbox, Mailbox, Notifier, WhatsAppNotifier};
use placement_alert::config::Settings;
use placement_alert::llm::ClassifierCapability;
use placement_alert::pipeline::{
    KeywordMatcher, LlmClassifier, PlacementAnalyzer, PlacementMonitor, spawn_monitor,
};
use placement_alert::profile::ProfileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let Settings {
        app: config,
        keywords,
    } = Settings::load().context("Failed to load settings")?;

    let capability = ClassifierCapability::resolve(config.llm.as_ref());

    eprintln!("📬 Placement Alert v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Mailbox: {}@{}:{} (newest {} unseen)",
        config.email.username, config.email.host, config.email.port, config.email.fetch_limit
    );
    eprintln!("   Alerts: WhatsApp to {}", config.whatsapp.to_number);
    eprintln!(
        "   Classifier: {} [{}]",
        capability.describe(),
        config.llm_backend.name()
    );
    eprintln!(
        "   Keywords: {} from {}",
        keywords.len(),
        config.keywords_file.display()
    );
    eprintln!("   Search terms: {}", config.search_terms.len());
    eprintln!("   Poll interval: {}s", config.poll_interval.as_secs());
    eprintln!("   API: http://0.0.0.0:{}/api/status\n", config.http_port);

    // ── Pipeline ────────────────────────────────────────────────────────
    let profile = ProfileStore::default();
    let capability_text = capability.describe();
    let analyzer = Arc::new(PlacementAnalyzer::new(
        LlmClassifier::new(capability),
        KeywordMatcher::new(keywords),
        profile.clone(),
    ));
    let scanner = Arc::new(AttachmentScanner::new(config.search_terms.clone()));
    let mailbox: Arc<dyn Mailbox> = Arc::new(ImapMailbox::new(config.email.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(WhatsAppNotifier::new(config.whatsapp.clone()));

    let monitor = Arc::new(PlacementMonitor::new(mailbox, notifier, analyzer, scanner));
    let stats = monitor.stats();
    let (monitor_handle, shutdown) = spawn_monitor(monitor, config.poll_interval);

    // ── Control API ─────────────────────────────────────────────────────
    let app = api_routes(ApiState {
        profile,
        stats,
        classifier: capability_text,
        poll_interval: config.poll_interval,
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("Failed to bind API port {}", config.http_port))?;
    tracing::info!(port = config.http_port, "Control API started");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Control API stopped");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");
    let _ = shutdown.send(true);
    monitor_handle.await.context("Monitor task failed")?;

    Ok(())
}
