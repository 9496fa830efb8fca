//! Audit-log producer interface.
//!
//! Every permission decision is emitted as one [`AuditRecord`]. The sink
//! itself (database, file, hosted collector) lives outside this crate; the
//! core is a producer only.

use crate::types::SecurityLevel;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

/// One appended audit record per permission decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Kind of action checked: "shell", "network", "filesystem".
    pub action_type: String,
    /// The subject of the check: raw command, URL, or path.
    pub action_detail: String,
    /// Whether the action was allowed to proceed without approval.
    pub allowed: bool,
    /// Active security level at decision time.
    pub security_level: SecurityLevel,
    /// Decision reason as returned to the caller.
    pub reason: String,
    /// Task that triggered the check, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// Append-only sink for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Emits audit records as structured tracing events.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        if record.allowed {
            info!(
                action_type = %record.action_type,
                detail = %record.action_detail,
                level = %record.security_level,
                reason = %record.reason,
                "audit: allowed"
            );
        } else {
            warn!(
                action_type = %record.action_type,
                detail = %record.action_detail,
                level = %record.security_level,
                reason = %record.reason,
                "audit: not allowed"
            );
        }
    }
}

/// Collects records in memory. Test helper.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit lock poisoned").clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        self.records
            .lock()
            .expect("audit lock poisoned")
            .push(record.clone());
    }
}
