/// Audit logging for policy application
///
/// Every apply run, successful or not, is appended as one JSON line so the
/// namespace's filter state can be traced back to the document that produced it.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Types of auditable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ApplyPolicy,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Correlates log lines from the same invocation
    pub run_id: Uuid,

    pub event_type: EventType,

    pub success: bool,

    /// Additional structured data about the event
    pub details: serde_json::Value,

    /// Error message if operation failed
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(
        run_id: Uuid,
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            run_id,
            event_type,
            success,
            details,
            error,
        }
    }
}

/// Audit log writer
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    /// Opens the audit log in the state directory, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the state directory cannot be determined or created
    pub fn new() -> std::io::Result<Self> {
        let mut log_path = crate::utils::ensure_state_dir()?.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "State directory not found")
        })?;
        log_path.push("audit.log");

        Ok(Self { log_path })
    }

    /// Uses an explicit log file.
    #[cfg(test)]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: path.into(),
        }
    }

    /// Appends an event to the audit log
    ///
    /// Events are written as JSON-lines format (one JSON object per line)
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub async fn log(&self, event: &AuditEvent) -> std::io::Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.log_path).await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_all().await?;

        Ok(())
    }

    /// Reads the most recent events, newest first
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be read
    #[cfg(test)]
    pub async fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let content = tokio::fs::read_to_string(&self.log_path).await?;

        let events: Vec<AuditEvent> = content
            .lines()
            .rev()
            .take(count)
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        Ok(events)
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

/// What was applied, where, and how far it got
#[derive(Debug, Clone)]
pub struct ApplyRecord<'a> {
    pub run_id: Uuid,
    pub namespace: &'a str,
    pub policy_path: &'a Path,
    /// `None` when the policy could not be loaded
    pub checksum: Option<&'a str>,
    pub rule_count: usize,
    /// Commands echoed, including a failing one
    pub commands_issued: usize,
    pub skipped: usize,
}

impl ApplyRecord<'_> {
    pub fn to_event(&self, error: Option<String>) -> AuditEvent {
        AuditEvent::new(
            self.run_id,
            EventType::ApplyPolicy,
            error.is_none(),
            serde_json::json!({
                "namespace": self.namespace,
                "policy_path": self.policy_path,
                "policy_sha256": self.checksum,
                "rule_count": self.rule_count,
                "commands_issued": self.commands_issued,
                "skipped": self.skipped,
            }),
            error,
        )
    }
}

/// Logs an apply run to the default audit log.
///
/// Failures to write are logged as warnings and otherwise ignored.
pub async fn log_apply(record: &ApplyRecord<'_>, error: Option<String>) {
    match AuditLog::new() {
        Ok(audit) => {
            if let Err(e) = audit.log(&record.to_event(error)).await {
                tracing::warn!("Failed to write audit log {}: {}", audit.path().display(), e);
            }
        }
        Err(e) => tracing::warn!("Audit log unavailable: {}", e),
    }
}
