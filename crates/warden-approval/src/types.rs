//! Approval request records and response classification.

use serde::{Deserialize, Serialize};
use warden_core::RiskLevel;

/// Lifecycle state of an approval request. Created `Pending`; transitions
/// exactly once to a terminal state, which is never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        self != ApprovalStatus::Pending
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Denied => "denied",
            ApprovalStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A persisted record representing one pending human-confirmation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub task_id: String,
    /// Kind of action awaiting approval: "shell", "network", "filesystem".
    pub action_type: String,
    /// The subject: raw command, URL, or path.
    pub action_detail: String,
    /// Human-readable prompt shown to the approver.
    pub description: String,
    pub risk: RiskLevel,
    pub status: ApprovalStatus,
    /// Channel the originating task came from; `None` means any channel may
    /// answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// Unix milliseconds.
    pub requested_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<u64>,
    pub expires_at: u64,
}

impl ApprovalRequest {
    pub fn is_past_due(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Caller-supplied description of the action needing approval.
#[derive(Debug, Clone, Default)]
pub struct ApprovalDetails {
    pub task_id: String,
    pub action_type: String,
    pub action_detail: String,
    pub description: String,
    pub risk: RiskLevel,
    pub channel_type: Option<String>,
    pub channel_id: Option<String>,
}

/// Resolved outcome of a [`request_approval`](crate::ApprovalQueue::request_approval) call.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub approved: bool,
    pub approval: ApprovalRequest,
}

/// Result of feeding an inbound message to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMatch {
    pub matched: bool,
    pub approval_id: Option<String>,
}

impl ResponseMatch {
    pub fn unmatched() -> Self {
        Self {
            matched: false,
            approval_id: None,
        }
    }
}

const AFFIRMATIVE: &[&str] = &[
    "yes", "y", "approve", "approved", "ok", "okay", "sure", "go ahead", "do it",
];
const NEGATIVE: &[&str] = &["no", "n", "deny", "denied", "reject", "rejected", "stop", "cancel"];

/// Classify a free-form reply. `Some(true)` approves, `Some(false)` denies,
/// `None` means the text is not an approval response at all.
pub fn classify_response(text: &str) -> Option<bool> {
    let normalized = text.trim().to_lowercase();
    if AFFIRMATIVE.contains(&normalized.as_str()) {
        Some(true)
    } else if NEGATIVE.contains(&normalized.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Current time in unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
