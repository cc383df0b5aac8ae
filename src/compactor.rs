use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::{Engine, EngineError};

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact the WAL once `threshold` appends have accumulated since the last
/// compaction. Returns whether a compaction ran.
pub async fn maybe_compact(engine: &Engine, threshold: u64) -> Result<bool, EngineError> {
    let appends = engine.wal_appends_since_compact().await;
    if threshold == 0 || appends < threshold {
        return Ok(false);
    }
    engine.compact_wal().await?;
    info!("compacted WAL after {appends} appends");
    Ok(true)
}

/// Background task that periodically checks whether the WAL needs compacting.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = maybe_compact(&engine, threshold).await {
            tracing::error!("WAL compaction failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::model::*;
    use std::path::PathBuf;

    fn test_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("clinic_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    async fn engine_with_people(name: &str, people: usize) -> Engine {
        let audit = AuditLog::spawn(&test_path(&format!("{name}.csv"))).unwrap();
        let engine = Engine::new(test_path(&format!("{name}.wal")), audit).unwrap();
        for i in 0..people {
            let details = PersonDetails {
                first_name: format!("Doc{i}"),
                last_name: "Smith".into(),
                ..Default::default()
            };
            engine
                .register_doctor(details, Specialty::new("Pediatrics"))
                .await
                .unwrap();
        }
        engine
    }

    #[tokio::test]
    async fn below_threshold_does_nothing() {
        let engine = engine_with_people("below", 3).await;
        assert!(!maybe_compact(&engine, 10).await.unwrap());
        assert_eq!(engine.wal_appends_since_compact().await, 3);
    }

    #[tokio::test]
    async fn at_threshold_compacts_and_resets() {
        let engine = engine_with_people("at", 5).await;
        assert!(maybe_compact(&engine, 5).await.unwrap());
        assert_eq!(engine.wal_appends_since_compact().await, 0);
        assert_eq!(engine.doctors().await.len(), 5);
    }

    #[tokio::test]
    async fn zero_threshold_disables() {
        let engine = engine_with_people("disabled", 2).await;
        assert!(!maybe_compact(&engine, 0).await.unwrap());
    }
}
