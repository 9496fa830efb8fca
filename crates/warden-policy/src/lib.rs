//! warden-policy: Command parsing, threat detection, and the permission engine.

pub mod engine;
mod error;
pub mod parser;
pub mod patterns;

pub use engine::PermissionEngine;
pub use error::PolicyError;
pub use parser::{parse, ParsedCommand};
pub use patterns::{default_rules, DangerousPattern, PatternRule, PatternSet};
