//! Approval request persistence.
//!
//! The queue depends only on atomic single-row create/update semantics. Two
//! implementations: an in-memory map, and an append-only JSONL file where
//! the latest entry for an id wins on load.

use crate::error::ApprovalError;
use crate::types::{ApprovalRequest, ApprovalStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Persistence operations consumed by the approval queue.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Persist a new request. Fails if the id already exists.
    async fn create(&self, request: &ApprovalRequest) -> Result<(), ApprovalError>;

    /// Fetch a request by id.
    async fn get(&self, id: &str) -> Result<Option<ApprovalRequest>, ApprovalError>;

    /// All requests currently in `Pending` status.
    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, ApprovalError>;

    /// Transition a pending request to a terminal status. Refuses to touch a
    /// row that is already terminal.
    async fn set_status(
        &self,
        id: &str,
        status: ApprovalStatus,
        responded_at: Option<u64>,
    ) -> Result<ApprovalRequest, ApprovalError>;
}

/// In-memory store. Used by tests and short-lived embedders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, ApprovalRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for MemoryStore {
    async fn create(&self, request: &ApprovalRequest) -> Result<(), ApprovalError> {
        let mut rows = self.rows.lock().expect("store lock poisoned");
        if rows.contains_key(&request.id) {
            return Err(ApprovalError::InvalidFormat(format!(
                "duplicate approval id {}",
                request.id
            )));
        }
        rows.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ApprovalRequest>, ApprovalError> {
        let rows = self.rows.lock().expect("store lock poisoned");
        Ok(rows.get(id).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        let rows = self.rows.lock().expect("store lock poisoned");
        Ok(rows
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn set_status(
        &self,
        id: &str,
        status: ApprovalStatus,
        responded_at: Option<u64>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let mut rows = self.rows.lock().expect("store lock poisoned");
        let row = rows
            .get_mut(id)
            .ok_or_else(|| ApprovalError::NotFound(id.to_string()))?;
        if row.status.is_terminal() {
            return Err(ApprovalError::AlreadyResolved {
                id: id.to_string(),
                status: row.status,
            });
        }
        row.status = status;
        row.responded_at = responded_at;
        Ok(row.clone())
    }
}

/// Append-only JSONL store. Each line is a full [`ApprovalRequest`]; the
/// last line for an id reflects its current state.
pub struct JsonlStore {
    path: PathBuf,
    /// Serializes appends so one write is in flight at a time.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlStore {
    /// Store at `~/.local/share/warden/approvals.jsonl` (platform
    /// equivalent).
    pub fn new() -> Self {
        let path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("warden")
            .join("approvals.jsonl");
        Self::with_path(path)
    }

    /// Create with a custom file path (for testing).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, ApprovalRequest>, ApprovalError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rows = HashMap::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row: ApprovalRequest = serde_json::from_str(line).map_err(|e| {
                ApprovalError::InvalidFormat(format!("Line {}: {e}", line_num + 1))
            })?;
            rows.insert(row.id.clone(), row);
        }
        Ok(rows)
    }

    async fn append(&self, row: &ApprovalRequest) -> Result<(), ApprovalError> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let line = serde_json::to_string(row)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl Default for JsonlStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApprovalStore for JsonlStore {
    async fn create(&self, request: &ApprovalRequest) -> Result<(), ApprovalError> {
        if self.load().await?.contains_key(&request.id) {
            return Err(ApprovalError::InvalidFormat(format!(
                "duplicate approval id {}",
                request.id
            )));
        }
        self.append(request).await
    }

    async fn get(&self, id: &str) -> Result<Option<ApprovalRequest>, ApprovalError> {
        Ok(self.load().await?.remove(id))
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        Ok(self
            .load()
            .await?
            .into_values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .collect())
    }

    async fn set_status(
        &self,
        id: &str,
        status: ApprovalStatus,
        responded_at: Option<u64>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let mut row = self
            .load()
            .await?
            .remove(id)
            .ok_or_else(|| ApprovalError::NotFound(id.to_string()))?;
        if row.status.is_terminal() {
            return Err(ApprovalError::AlreadyResolved {
                id: id.to_string(),
                status: row.status,
            });
        }
        row.status = status;
        row.responded_at = responded_at;
        self.append(&row).await?;
        Ok(row)
    }
}
