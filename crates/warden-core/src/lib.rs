//! warden-core: Shared security types, policy configuration, and audit.

pub mod audit;
pub mod config;
mod error;
pub mod types;

pub use audit::{AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use config::{
    BinaryAllowlist, Config, ConfigStore, DirectoryRules, DomainMode, DomainRules, LevelPolicy,
    PathMode, PolicyTable, ShellMode,
};
pub use error::WardenError;
pub use types::{RiskLevel, SecurityCheckResult, SecurityDecision, SecurityLevel};
