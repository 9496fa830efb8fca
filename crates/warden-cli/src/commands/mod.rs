//! Command implementations.

pub mod approvals;
pub mod check;
pub mod run;

use std::sync::Arc;
use warden_core::{Config, SecurityCheckResult, TracingAuditSink};
use warden_policy::PermissionEngine;

pub fn build_engine(config: &Config) -> PermissionEngine {
    PermissionEngine::new(
        warden_policy::PatternSet::default(),
        config.policy.clone(),
        Arc::new(TracingAuditSink),
    )
}

pub fn print_check(result: &SecurityCheckResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}: {}", decision_label(result), result.reason);
    }
    Ok(())
}

fn decision_label(result: &SecurityCheckResult) -> &'static str {
    use warden_core::SecurityDecision;
    match result.decision {
        SecurityDecision::Allow => "allowed",
        SecurityDecision::Deny => "denied",
        SecurityDecision::NeedsApproval => "needs approval",
    }
}
