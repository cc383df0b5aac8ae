use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_AUDIT_FILE: &str = "audit_log.csv";
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;
pub const WAL_FILE_NAME: &str = "clinic.wal";

/// Process configuration, read once at start-up from `CLINIC_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub audit_file: PathBuf,
    pub metrics_port: Option<u16>,
    /// WAL appends between compactions.
    pub compact_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            audit_file: PathBuf::from(DEFAULT_AUDIT_FILE),
            metrics_port: None,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Unparseable numbers fall back to their defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: var("CLINIC_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            audit_file: var("CLINIC_AUDIT_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.audit_file),
            metrics_port: var("CLINIC_METRICS_PORT").and_then(|s| s.parse().ok()),
            compact_threshold: var("CLINIC_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(WAL_FILE_NAME)
    }
}
