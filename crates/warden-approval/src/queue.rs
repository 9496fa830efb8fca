//! Asynchronous human-approval workflow.
//!
//! Two tiers of state: a fast in-process map of live waiters keyed by
//! request id, and the persisted row as the durable source of truth for
//! status. Each outstanding request owns its own timer; resolution races
//! "a matching response arrived" against "the timer fired" and exactly one
//! side wins.

use crate::error::ApprovalError;
use crate::store::ApprovalStore;
use crate::types::{
    classify_response, now_millis, ApprovalDetails, ApprovalOutcome, ApprovalRequest,
    ApprovalStatus, ResponseMatch,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Best-effort notification hook invoked when a request is created, so a
/// channel adapter can surface the prompt to a human. Failures are logged
/// and swallowed; they never block the approval.
pub type NotifyCallback =
    Box<dyn Fn(&ApprovalRequest) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// Manages the lifecycle of approval requests: persist, notify, await,
/// correlate, expire.
pub struct ApprovalQueue {
    store: Arc<dyn ApprovalStore>,
    waiters: Mutex<HashMap<String, oneshot::Sender<bool>>>,
}

impl ApprovalQueue {
    pub fn new(store: Arc<dyn ApprovalStore>) -> Self {
        Self {
            store,
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Create a pending request and wait for a human verdict or the
    /// timeout, whichever comes first. Always resolves; a timeout yields
    /// `approved: false` with status `Expired`, never an error.
    pub async fn request_approval(
        &self,
        details: ApprovalDetails,
        timeout: Duration,
        on_request: Option<NotifyCallback>,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        let now = now_millis();
        let request = ApprovalRequest {
            id: ulid::Ulid::new().to_string(),
            task_id: details.task_id,
            action_type: details.action_type,
            action_detail: details.action_detail,
            description: details.description,
            risk: details.risk,
            status: ApprovalStatus::Pending,
            channel_type: details.channel_type,
            channel_id: details.channel_id,
            requested_at: now,
            responded_at: None,
            expires_at: now + timeout.as_millis() as u64,
        };

        // Persist before anything else so the request is externally
        // queryable for its whole lifetime.
        self.store.create(&request).await?;
        info!(id = %request.id, detail = %request.action_detail, "approval requested");

        if let Some(notify) = on_request {
            if let Err(e) = notify(&request) {
                warn!(id = %request.id, error = %e, "approval notification failed");
            }
        }

        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .expect("waiter lock poisoned")
            .insert(request.id.clone(), tx);

        let approved = tokio::select! {
            verdict = rx => verdict.unwrap_or(false),
            _ = tokio::time::sleep(timeout) => {
                self.expire_waiter(&request.id).await?
            }
        };

        let approval = self
            .store
            .get(&request.id)
            .await?
            .unwrap_or(request);
        info!(id = %approval.id, status = %approval.status, "approval resolved");
        Ok(ApprovalOutcome { approved, approval })
    }

    /// Timeout path: drop the waiter and persist `Expired`. Returns the
    /// final verdict, which can still be an approval if a response landed
    /// in the same instant the timer fired.
    async fn expire_waiter(&self, id: &str) -> Result<bool, ApprovalError> {
        self.waiters
            .lock()
            .expect("waiter lock poisoned")
            .remove(id);
        match self.store.set_status(id, ApprovalStatus::Expired, None).await {
            Ok(_) => Ok(false),
            // Lost the race against a response; the persisted row decides.
            Err(ApprovalError::AlreadyResolved { status, .. }) => {
                Ok(status == ApprovalStatus::Approved)
            }
            Err(e) => Err(e),
        }
    }

    /// Feed an inbound human reply into the queue. Unrecognized text causes
    /// no state change. Among qualifying pending requests the most recently
    /// created one is resolved: a reply is assumed to address the latest
    /// prompt surfaced to the human.
    pub async fn handle_response(
        &self,
        text: &str,
        channel_type: Option<&str>,
        channel_id: Option<&str>,
    ) -> Result<ResponseMatch, ApprovalError> {
        self.expire_stale().await?;

        let Some(approved) = classify_response(text) else {
            debug!(text = %text, "response did not classify as approval or denial");
            return Ok(ResponseMatch::unmatched());
        };

        let candidate = self
            .store
            .list_pending()
            .await?
            .into_iter()
            .filter(|r| channel_matches(r, channel_type, channel_id))
            .max_by(|a, b| {
                a.requested_at
                    .cmp(&b.requested_at)
                    .then_with(|| a.id.cmp(&b.id))
            });

        let Some(candidate) = candidate else {
            return Ok(ResponseMatch::unmatched());
        };

        let status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Denied
        };
        let row = match self
            .store
            .set_status(&candidate.id, status, Some(now_millis()))
            .await
        {
            Ok(row) => row,
            // Resolved concurrently; treat the reply as consumed by nothing.
            Err(ApprovalError::AlreadyResolved { .. }) => {
                return Ok(ResponseMatch::unmatched());
            }
            Err(e) => return Err(e),
        };

        info!(id = %row.id, status = %row.status, "approval answered");
        self.resolve_waiter(&row.id, approved);
        Ok(ResponseMatch {
            matched: true,
            approval_id: Some(row.id),
        })
    }

    /// Mark every past-due pending request expired. Returns the number of
    /// rows changed. Invoked periodically by the host and opportunistically
    /// before each match attempt.
    pub async fn expire_stale(&self) -> Result<usize, ApprovalError> {
        let now = now_millis();
        let mut count = 0;
        for row in self.store.list_pending().await? {
            if !row.is_past_due(now) {
                continue;
            }
            match self
                .store
                .set_status(&row.id, ApprovalStatus::Expired, None)
                .await
            {
                Ok(_) => {
                    info!(id = %row.id, "approval expired");
                    self.resolve_waiter(&row.id, false);
                    count += 1;
                }
                Err(ApprovalError::AlreadyResolved { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    /// Pending requests, most recent first.
    pub async fn pending(&self) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        let mut rows = self.store.list_pending().await?;
        rows.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    fn resolve_waiter(&self, id: &str, approved: bool) {
        let waiter = self
            .waiters
            .lock()
            .expect("waiter lock poisoned")
            .remove(id);
        if let Some(tx) = waiter {
            // The receiver may have been dropped by a concurrent timeout.
            let _ = tx.send(approved);
        }
    }
}

fn channel_matches(
    request: &ApprovalRequest,
    channel_type: Option<&str>,
    channel_id: Option<&str>,
) -> bool {
    // A filter applies only when both the request and the call specify it;
    // either side being unset is a wildcard on that axis.
    if let (Some(want), Some(got)) = (request.channel_type.as_deref(), channel_type) {
        if want != got {
            return false;
        }
    }
    if let (Some(want), Some(got)) = (request.channel_id.as_deref(), channel_id) {
        if want != got {
            return false;
        }
    }
    true
}
