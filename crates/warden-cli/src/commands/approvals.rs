//! Inspect and resolve the persisted approval queue.

use std::sync::Arc;
use warden_approval::{ApprovalQueue, JsonlStore};

fn queue() -> ApprovalQueue {
    ApprovalQueue::new(Arc::new(JsonlStore::new()))
}

pub async fn list(json: bool) -> anyhow::Result<()> {
    let pending = queue().pending().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }
    if pending.is_empty() {
        println!("No pending approvals.");
    } else {
        for req in &pending {
            println!(
                "{} | {} | {} | {}",
                req.id, req.risk, req.action_type, req.action_detail
            );
        }
    }
    Ok(())
}

pub async fn respond(
    text: &str,
    channel_type: Option<&str>,
    channel_id: Option<&str>,
) -> anyhow::Result<()> {
    let result = queue().handle_response(text, channel_type, channel_id).await?;
    if result.matched {
        println!(
            "resolved {}",
            result.approval_id.as_deref().unwrap_or("<unknown>")
        );
    } else {
        println!("no pending approval matched");
    }
    Ok(())
}

pub async fn expire() -> anyhow::Result<()> {
    let count = queue().expire_stale().await?;
    println!("expired {count} request(s)");
    Ok(())
}
