use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::sync::{mpsc, oneshot};

use crate::limits::MAX_AUDIT_TAIL;

const HEADER: &str = "Action_name,Timestamp";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub action: String,
    pub timestamp: String,
}

/// Quote a CSV field if it holds a comma, quote or line break.
fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn unescape_csv(field: &str) -> String {
    match field.strip_prefix('"').and_then(|f| f.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => field.to_string(),
    }
}

/// One audit row per record: line breaks in the text become spaces.
fn action_text(action: &str, details: Option<&str>) -> String {
    let text = match details {
        Some(d) => format!("{action} - {d}"),
        None => action.to_string(),
    };
    text.replace(['\r', '\n'], " ")
}

// ── File format ──────────────────────────────────────────

/// The CSV audit file: a header line, then one `action,timestamp` row per
/// record. Rows are only ever appended, except by `clear`.
pub struct AuditFile {
    path: PathBuf,
}

impl AuditFile {
    /// Create the file with its header if it does not exist yet.
    pub fn open(path: &Path) -> io::Result<Self> {
        if !path.exists() {
            let mut f = File::create(path)?;
            writeln!(f, "{HEADER}")?;
        }
        Ok(Self { path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entries: &[AuditEntry]) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut w = BufWriter::new(file);
        for e in entries {
            writeln!(w, "{},{}", escape_csv(&e.action), e.timestamp)?;
        }
        w.flush()
    }

    /// The last `n` rows, oldest first.
    pub fn recent(&self, n: usize) -> io::Result<Vec<AuditEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let rows: Vec<AuditEntry> = content
            .lines()
            .skip(1)
            .filter_map(|line| {
                // Timestamps never contain commas, so the last comma splits.
                let (action, timestamp) = line.rsplit_once(',')?;
                Some(AuditEntry {
                    action: unescape_csv(action),
                    timestamp: timestamp.to_string(),
                })
            })
            .collect();
        let start = rows.len().saturating_sub(n);
        Ok(rows[start..].to_vec())
    }

    /// Truncate to the header line.
    pub fn clear(&self) -> io::Result<()> {
        let mut f = File::create(&self.path)?;
        writeln!(f, "{HEADER}")
    }
}

// ── Writer task ──────────────────────────────────────────

enum AuditCommand {
    Record(AuditEntry),
    Recent {
        n: usize,
        response: oneshot::Sender<io::Result<Vec<AuditEntry>>>,
    },
    Clear {
        response: oneshot::Sender<io::Result<()>>,
    },
}

/// Drains every immediately available record into one append, so a burst of
/// actions costs a single open/write.
async fn audit_writer_loop(file: AuditFile, mut rx: mpsc::UnboundedReceiver<AuditCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            AuditCommand::Record(entry) => {
                let mut batch = vec![entry];
                let mut pending = None;
                loop {
                    match rx.try_recv() {
                        Ok(AuditCommand::Record(entry)) => batch.push(entry),
                        Ok(other) => {
                            pending = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                if let Err(e) = file.append(&batch) {
                    tracing::warn!("audit write failed, dropped {} records: {e}", batch.len());
                }
                if let Some(cmd) = pending {
                    handle_query(&file, cmd);
                }
            }
            other => handle_query(&file, other),
        }
    }
}

fn handle_query(file: &AuditFile, cmd: AuditCommand) {
    match cmd {
        AuditCommand::Recent { n, response } => {
            let _ = response.send(file.recent(n));
        }
        AuditCommand::Clear { response } => {
            let _ = response.send(file.clear());
        }
        AuditCommand::Record(_) => unreachable!(),
    }
}

/// Handle to the audit trail. Cloneable; all clones feed one writer task.
#[derive(Clone)]
pub struct AuditLog {
    tx: mpsc::UnboundedSender<AuditCommand>,
}

impl AuditLog {
    /// Open (or create) the audit file and spawn its writer task.
    pub fn spawn(path: &Path) -> io::Result<Self> {
        let file = AuditFile::open(path)?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(audit_writer_loop(file, rx));
        Ok(Self { tx })
    }

    /// Fire and forget. Never fails the caller.
    pub fn record(&self, action: &str, details: Option<&str>) {
        let entry = AuditEntry {
            action: action_text(action, details),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        };
        if self.tx.send(AuditCommand::Record(entry)).is_err() {
            tracing::debug!("audit writer gone, dropped {action}");
        }
    }

    /// Last `n` entries, capped at [`MAX_AUDIT_TAIL`]. Records sent before
    /// this call are included.
    pub async fn recent(&self, n: usize) -> io::Result<Vec<AuditEntry>> {
        let n = n.min(MAX_AUDIT_TAIL);
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(AuditCommand::Recent { n, response: tx })
            .map_err(|_| io::Error::other("audit writer shut down"))?;
        rx.await
            .map_err(|_| io::Error::other("audit writer dropped response"))?
    }

    pub async fn clear(&self) -> io::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(AuditCommand::Clear { response: tx })
            .map_err(|_| io::Error::other("audit writer shut down"))?;
        rx.await
            .map_err(|_| io::Error::other("audit writer dropped response"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("clinic_test_audit");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn csv_escaping() {
        assert_eq!(escape_csv("PLAIN"), "PLAIN");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(unescape_csv(&escape_csv("x, \"y\"")), "x, \"y\"");
        assert_eq!(escape_csv("a\rb"), "\"a\rb\"");
    }

    #[tokio::test]
    async fn line_breaks_stay_in_one_row() {
        let path = tmp_path("line_breaks.csv");
        let log = AuditLog::spawn(&path).unwrap();
        log.record("DOCTOR_ADDED", Some("ID 1: Ana\r\nPop, GP"));
        log.record("APPLICATION_EXITED", None);

        let recent = log.recent(10).await.unwrap();
        let actions: Vec<&str> = recent.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["DOCTOR_ADDED - ID 1: Ana  Pop, GP", "APPLICATION_EXITED"]);
    }

    #[test]
    fn file_header_created_once() {
        let path = tmp_path("header.csv");
        let file = AuditFile::open(&path).unwrap();
        file.append(&[AuditEntry { action: "A".into(), timestamp: "t1".into() }]).unwrap();
        // Reopening keeps existing rows
        let file = AuditFile::open(&path).unwrap();
        let content = fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "Action_name,Timestamp\nA,t1\n");
    }

    #[test]
    fn recent_returns_tail_and_unescapes() {
        let path = tmp_path("recent.csv");
        let file = AuditFile::open(&path).unwrap();
        let entries: Vec<AuditEntry> = (0..5)
            .map(|i| AuditEntry {
                action: format!("ACTION_{i} - detail, with comma"),
                timestamp: format!("2030-01-01 00:00:0{i}"),
            })
            .collect();
        file.append(&entries).unwrap();

        let tail = file.recent(2).unwrap();
        assert_eq!(tail, entries[3..].to_vec());
        assert_eq!(file.recent(50).unwrap().len(), 5);
    }

    #[test]
    fn clear_keeps_header() {
        let path = tmp_path("clear.csv");
        let file = AuditFile::open(&path).unwrap();
        file.append(&[AuditEntry { action: "A".into(), timestamp: "t".into() }]).unwrap();
        file.clear().unwrap();
        assert!(file.recent(10).unwrap().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "Action_name,Timestamp\n");
    }

    #[tokio::test]
    async fn log_records_in_order() {
        let path = tmp_path("log_order.csv");
        let log = AuditLog::spawn(&path).unwrap();
        log.record("APPLICATION_STARTED", None);
        log.record("APPOINTMENT_SCHEDULED", Some("ID 1"));
        log.record("APPOINTMENT_CANCELLED", Some("ID 1"));

        let recent = log.recent(10).await.unwrap();
        let actions: Vec<&str> = recent.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(
            actions,
            vec!["APPLICATION_STARTED", "APPOINTMENT_SCHEDULED - ID 1", "APPOINTMENT_CANCELLED - ID 1"]
        );

        log.clear().await.unwrap();
        assert!(log.recent(10).await.unwrap().is_empty());
    }
}
