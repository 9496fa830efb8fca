//! Shared security decision types.

use serde::{Deserialize, Serialize};

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityDecision {
    /// The action may proceed without human involvement.
    Allow,
    /// The action is forbidden at the active security level.
    Deny,
    /// The action must be confirmed by a human before proceeding.
    NeedsApproval,
}

/// Risk classification attached to checks, patterns, and approval requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Result of a single permission check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityCheckResult {
    /// The decision for this action.
    pub decision: SecurityDecision,
    /// Human-readable explanation, suitable for audit and user display.
    pub reason: String,
    /// Risk classification of the action.
    pub risk: RiskLevel,
}

impl SecurityCheckResult {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            decision: SecurityDecision::Allow,
            reason: reason.into(),
            risk: RiskLevel::Low,
        }
    }

    pub fn deny(reason: impl Into<String>, risk: RiskLevel) -> Self {
        Self {
            decision: SecurityDecision::Deny,
            reason: reason.into(),
            risk,
        }
    }

    pub fn needs_approval(reason: impl Into<String>, risk: RiskLevel) -> Self {
        Self {
            decision: SecurityDecision::NeedsApproval,
            reason: reason.into(),
            risk,
        }
    }

    /// Whether the decision permits execution without approval.
    pub fn is_allowed(&self) -> bool {
        self.decision == SecurityDecision::Allow
    }
}

/// Security tier controlling how permissive the policy engine is.
///
/// Ordered from most to least restrictive; configured externally and passed
/// by value into every check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum SecurityLevel {
    /// Level 1: no shell, no network.
    Paranoid = 1,
    /// Level 2: fixed allowlist only, everything else denied.
    Restricted = 2,
    /// Level 3: allowlist runs, unknown binaries ask a human.
    #[default]
    Standard = 3,
    /// Level 4: wide allowlist, fewer approvals.
    Trusted = 4,
    /// Level 5: only dangerous patterns are denied.
    Unrestricted = 5,
}

impl SecurityLevel {
    /// All levels in ascending order of permissiveness.
    pub const ALL: [SecurityLevel; 5] = [
        SecurityLevel::Paranoid,
        SecurityLevel::Restricted,
        SecurityLevel::Standard,
        SecurityLevel::Trusted,
        SecurityLevel::Unrestricted,
    ];

    /// Numeric tier, 1 through 5.
    pub fn tier(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = crate::WardenError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SecurityLevel::Paranoid),
            2 => Ok(SecurityLevel::Restricted),
            3 => Ok(SecurityLevel::Standard),
            4 => Ok(SecurityLevel::Trusted),
            5 => Ok(SecurityLevel::Unrestricted),
            other => Err(crate::WardenError::Other(format!(
                "security level must be 1-5, got {other}"
            ))),
        }
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(SecurityLevel::Paranoid < SecurityLevel::Standard);
        assert!(SecurityLevel::Trusted < SecurityLevel::Unrestricted);
    }

    #[test]
    fn test_level_from_u8() {
        assert_eq!(SecurityLevel::try_from(1).unwrap(), SecurityLevel::Paranoid);
        assert_eq!(
            SecurityLevel::try_from(5).unwrap(),
            SecurityLevel::Unrestricted
        );
        assert!(SecurityLevel::try_from(0).is_err());
        assert!(SecurityLevel::try_from(6).is_err());
    }

    #[test]
    fn test_level_serde_kebab_case() {
        let json = serde_json::to_string(&SecurityLevel::Standard).unwrap();
        assert_eq!(json, "\"standard\"");
        let parsed: SecurityLevel = serde_json::from_str("\"unrestricted\"").unwrap();
        assert_eq!(parsed, SecurityLevel::Unrestricted);
    }

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Critical);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }
}
