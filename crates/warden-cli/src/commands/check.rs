//! Dry-run policy evaluation commands.
//!
//! Exit codes are scriptable: 0 allow, 2 needs approval, 3 deny.

use warden_core::{Config, SecurityCheckResult, SecurityDecision, SecurityLevel};

pub fn command(raw: &str, level: SecurityLevel, config: &Config, json: bool) -> anyhow::Result<i32> {
    let engine = super::build_engine(config);
    let parsed = warden_policy::parse(raw);
    let result = engine.check_command(&parsed, level, &config.binaries, None);
    super::print_check(&result, json)?;
    Ok(exit_code(&result))
}

pub fn url(raw: &str, level: SecurityLevel, config: &Config, json: bool) -> anyhow::Result<i32> {
    let engine = super::build_engine(config);
    let result = engine.check_domain(raw, level, &config.domains, None);
    super::print_check(&result, json)?;
    Ok(exit_code(&result))
}

pub fn path(raw: &str, level: SecurityLevel, config: &Config, json: bool) -> anyhow::Result<i32> {
    let engine = super::build_engine(config);
    let result = engine.check_file_path(raw, level, &config.directories, None);
    super::print_check(&result, json)?;
    Ok(exit_code(&result))
}

fn exit_code(result: &SecurityCheckResult) -> i32 {
    match result.decision {
        SecurityDecision::Allow => 0,
        SecurityDecision::NeedsApproval => 2,
        SecurityDecision::Deny => 3,
    }
}
