use std::net::SocketAddr;

use crate::ledger::StatusCounts;

/// Counter: engine operations. Labels: operation, status.
pub const OPERATIONS_TOTAL: &str = "clinic_operations_total";

/// Histogram: engine operation latency in seconds. Labels: operation.
pub const OPERATION_DURATION_SECONDS: &str = "clinic_operation_duration_seconds";

/// Gauge: appointments per status. Labels: status.
pub const APPOINTMENTS: &str = "clinic_appointments";

/// Gauge: registered doctors and patients.
pub const PERSONS: &str = "clinic_persons";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "clinic_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "clinic_wal_flush_batch_size";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "clinic_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Record the outcome of one engine operation.
pub fn record_operation(operation: &'static str, ok: bool, elapsed_secs: f64) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(OPERATIONS_TOTAL, "operation" => operation, "status" => status).increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => operation).record(elapsed_secs);
}

pub fn record_state(counts: StatusCounts, persons: usize) {
    metrics::gauge!(APPOINTMENTS, "status" => "scheduled").set(counts.scheduled as f64);
    metrics::gauge!(APPOINTMENTS, "status" => "completed").set(counts.completed as f64);
    metrics::gauge!(APPOINTMENTS, "status" => "cancelled").set(counts.cancelled as f64);
    metrics::gauge!(PERSONS).set(persons as f64);
}
