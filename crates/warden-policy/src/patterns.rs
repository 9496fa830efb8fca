//! Fixed deny-list of dangerous command patterns.
//!
//! Patterns run against the raw command text, not the parsed form, since
//! parsing can be evaded. Any hit is an unconditional deny at every security
//! level.

use crate::error::PolicyError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use warden_core::RiskLevel;

/// Serializable pattern rule, injected at engine construction so tests can
/// substitute rule sets without global mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    pub severity: RiskLevel,
    pub description: String,
}

impl PatternRule {
    fn new(pattern: &str, severity: RiskLevel, description: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            severity,
            description: description.to_string(),
        }
    }
}

/// A compiled deny-list entry.
#[derive(Debug, Clone)]
pub struct DangerousPattern {
    regex: Regex,
    pub severity: RiskLevel,
    pub description: String,
}

impl DangerousPattern {
    pub fn is_match(&self, raw: &str) -> bool {
        self.regex.is_match(raw)
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// Ordered, immutable set of dangerous patterns. First match wins.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<DangerousPattern>,
}

impl PatternSet {
    /// Compile a rule list into a pattern set.
    pub fn from_rules(rules: &[PatternRule]) -> Result<Self, PolicyError> {
        let patterns = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|regex| DangerousPattern {
                        regex,
                        severity: rule.severity,
                        description: rule.description.clone(),
                    })
                    .map_err(|source| PolicyError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The first matching pattern, in list order.
    pub fn first_match(&self, raw: &str) -> Option<&DangerousPattern> {
        self.patterns.iter().find(|p| p.is_match(raw))
    }

    /// All matching patterns, for audit purposes.
    pub fn matches(&self, raw: &str) -> Vec<&DangerousPattern> {
        self.patterns.iter().filter(|p| p.is_match(raw)).collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        DEFAULT_SET.clone()
    }
}

/// The built-in rule list. Ordered roughly by severity.
pub fn default_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new(
            r"\brm\s+(-\S+\s+)*-[a-zA-Z]*[rR][a-zA-Z]*(\s+-{1,2}\S+)*\s+(/|/\*|~|~/|\$HOME)(\s+-{1,2}\S+)*\s*($|;|&|\|)",
            RiskLevel::Critical,
            "recursive deletion of root or home",
        ),
        PatternRule::new(
            r":\s*\(\s*\)\s*\{\s*:\s*\|\s*:\s*&\s*\}",
            RiskLevel::Critical,
            "fork bomb",
        ),
        PatternRule::new(
            r"(^\s*|[|;&]\s*|sudo\s+)mkfs(\.[a-z0-9]+)?\b",
            RiskLevel::Critical,
            "filesystem format",
        ),
        PatternRule::new(
            r"\bdd\b[^|;]*\bof=/dev/",
            RiskLevel::Critical,
            "raw write to block device",
        ),
        PatternRule::new(
            r">\s*/dev/sd[a-z]",
            RiskLevel::Critical,
            "redirect onto block device",
        ),
        PatternRule::new(
            r"\b(curl|wget)\b[^|;]*\|\s*(sudo\s+)?(ba|z|fi|da)?sh\b",
            RiskLevel::Critical,
            "fetch remote script piped to shell",
        ),
        PatternRule::new(
            r"\bbase64\b[^|;]*(-d|--decode)[^|;]*\|\s*(ba|z)?sh\b",
            RiskLevel::High,
            "decoded payload piped to shell",
        ),
        PatternRule::new(
            r"(^\s*|[|;&]\s*|sudo\s+)((shutdown|reboot|poweroff|halt)\b|init\s+0\b)",
            RiskLevel::High,
            "system shutdown or reboot",
        ),
        PatternRule::new(
            r"\bchmod\s+(-[a-zA-Z]+\s+)*0?777\s+/\s*($|;|&|\|)",
            RiskLevel::High,
            "world-writable root filesystem",
        ),
    ]
}

static DEFAULT_SET: Lazy<PatternSet> = Lazy::new(|| {
    PatternSet::from_rules(&default_rules()).expect("built-in patterns must compile")
});
