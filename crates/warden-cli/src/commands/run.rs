//! Evaluate a command and execute it in the sandbox when permitted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use warden_approval::{ApprovalDetails, ApprovalQueue, MemoryStore, NotifyCallback};
use warden_core::{Config, SecurityDecision, SecurityLevel};
use warden_sandbox::{SandboxOptions, SandboxResult};

pub struct RunOptions {
    pub cwd: Option<String>,
    pub timeout: Option<u64>,
    pub json: bool,
}

/// Returns the process exit code `warden run` should terminate with.
pub async fn run(
    raw: &str,
    level: SecurityLevel,
    config: &Config,
    options: RunOptions,
) -> anyhow::Result<i32> {
    let engine = super::build_engine(config);
    let parsed = warden_policy::parse(raw);
    let result = engine.check_command(&parsed, level, &config.binaries, None);

    match result.decision {
        SecurityDecision::Deny => {
            super::print_check(&result, options.json)?;
            return Ok(1);
        }
        SecurityDecision::NeedsApproval => {
            if !prompt_for_approval(raw, &result.reason, &result.risk, config).await? {
                eprintln!("not approved: {raw}");
                return Ok(1);
            }
        }
        SecurityDecision::Allow => {}
    }

    // The sandbox takes a discrete argument vector; there is no shell to
    // interpret pipes or redirection.
    if !parsed.pipes.is_empty() || parsed.has_redirects {
        eprintln!("pipelines and redirection are not supported by the sandbox");
        return Ok(1);
    }
    if parsed.binary.is_empty() {
        eprintln!("nothing to run");
        return Ok(1);
    }

    let sandbox_options = SandboxOptions {
        cwd: options
            .cwd
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))),
        timeout: Duration::from_secs(options.timeout.unwrap_or(config.sandbox_timeout_secs)),
        env_overrides: Default::default(),
    };
    let outcome = warden_sandbox::run(&parsed.binary, &parsed.args, &sandbox_options).await;
    report(&outcome, options.json)
}

/// Interactive approval: print the request, then classify a single line
/// read from stdin. Silence past the configured timeout counts as a denial.
async fn prompt_for_approval(
    raw: &str,
    reason: &str,
    risk: &warden_core::RiskLevel,
    config: &Config,
) -> anyhow::Result<bool> {
    let queue = Arc::new(ApprovalQueue::new(Arc::new(MemoryStore::new())));

    let reader = {
        let queue = queue.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match queue.handle_response(&line, None, None).await {
                    Ok(m) if m.matched => break,
                    Ok(_) => eprintln!("please answer yes or no"),
                    Err(e) => {
                        debug!(error = %e, "response handling failed");
                        break;
                    }
                }
            }
        })
    };

    let notify: NotifyCallback = Box::new(move |req| {
        eprintln!("approval required [{}]: {}", req.risk, req.action_detail);
        eprintln!("  reason: {}", req.description);
        eprint!("approve? [yes/no] ");
        Ok(())
    });

    let details = ApprovalDetails {
        task_id: String::new(),
        action_type: "shell".to_string(),
        action_detail: raw.to_string(),
        description: reason.to_string(),
        risk: *risk,
        channel_type: None,
        channel_id: None,
    };
    let outcome = queue
        .request_approval(
            details,
            Duration::from_secs(config.approval_timeout_secs),
            Some(notify),
        )
        .await?;
    reader.abort();
    Ok(outcome.approved)
}

fn report(outcome: &SandboxResult, json: bool) -> anyhow::Result<i32> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        if !outcome.stdout.is_empty() {
            print!("{}", outcome.stdout);
        }
        if !outcome.stderr.is_empty() {
            eprint!("{}", outcome.stderr);
        }
        if let Some(err) = &outcome.spawn_error {
            eprintln!("failed to start: {err}");
        }
        if outcome.timed_out {
            eprintln!("timed out");
        }
    }
    Ok(match outcome.exit_code {
        Some(code) => code,
        None => 1,
    })
}
