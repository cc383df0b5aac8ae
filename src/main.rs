use std::sync::Arc;

use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::info;

use clinic::audit::AuditLog;
use clinic::config::Config;
use clinic::engine::Engine;
use clinic::{compactor, console};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout belongs to the menu
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env();
    clinic::observability::init(config.metrics_port);

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let audit = AuditLog::spawn(&config.audit_file)?;
    audit.record("APPLICATION_STARTED", None);

    let engine = Arc::new(Engine::new(config.wal_path(), audit)?);
    info!("clinic started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  audit_file: {}", config.audit_file.display());
    info!("  compact_threshold: {}", config.compact_threshold);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let compactor_engine = engine.clone();
    let threshold = config.compact_threshold;
    tokio::spawn(async move {
        compactor::run_compactor(compactor_engine, threshold).await;
    });

    let lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
    console::run_session(&engine, lines, tokio::io::stdout()).await?;

    // Round-trip the audit writer so queued records reach disk before exit.
    if let Err(e) = engine.audit().recent(1).await {
        tracing::warn!("audit flush failed: {e}");
    }
    info!("clinic stopped");
    Ok(())
}
