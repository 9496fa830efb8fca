use crate::types::SecurityLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// How shell commands are treated at a given security level, once the
/// dangerous-pattern and sudo/substitution gates have already passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShellMode {
    /// Every shell command is denied.
    DenyAll,
    /// Allowlisted binaries run; everything else is denied.
    AllowlistOnly,
    /// Allowlisted binaries run; everything else asks a human.
    AllowlistWithApproval,
    /// Base + extended allowlist run; everything else asks a human.
    WideAllowlist,
    /// Anything that survived the pattern gate runs.
    PatternsOnly,
}

/// How non-allowlisted public hosts are treated at a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainMode {
    /// All network access is denied.
    DenyAll,
    /// Allowlisted hosts pass; everything else asks a human.
    ApproveUnlisted,
    /// Any public host passes.
    AllowUnlisted,
}

/// How file paths outside the granted directory set are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathMode {
    /// All filesystem access is denied.
    DenyAll,
    /// Granted directories pass; everything else is denied.
    GrantedOnly,
    /// Granted directories pass; everything else asks a human.
    ApproveUngranted,
    /// Any non-blocked path passes.
    AllowUngranted,
}

/// Per-level policy row consulted by the permission engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelPolicy {
    pub shell: ShellMode,
    pub domains: DomainMode,
    pub paths: PathMode,
    /// Maximum number of distinct shell permissions a caller (e.g. an
    /// installed skill) may be granted at this level. `None` = unlimited.
    /// Enforced by the caller, not the engine.
    pub max_shell_grants: Option<usize>,
    /// Maximum number of distinct directories a caller may touch.
    pub max_directories: Option<usize>,
}

/// The five-tier policy ladder as data, one row per [`SecurityLevel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyTable {
    pub paranoid: LevelPolicy,
    pub restricted: LevelPolicy,
    pub standard: LevelPolicy,
    pub trusted: LevelPolicy,
    pub unrestricted: LevelPolicy,
    /// Commands carrying substitution/expansion are denied below this level.
    pub substitution_threshold: SecurityLevel,
    /// sudo/doas is denied below this level.
    pub sudo_threshold: SecurityLevel,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            paranoid: LevelPolicy {
                shell: ShellMode::DenyAll,
                domains: DomainMode::DenyAll,
                paths: PathMode::DenyAll,
                max_shell_grants: Some(0),
                max_directories: Some(0),
            },
            restricted: LevelPolicy {
                shell: ShellMode::AllowlistOnly,
                domains: DomainMode::ApproveUnlisted,
                paths: PathMode::GrantedOnly,
                max_shell_grants: Some(0),
                max_directories: Some(1),
            },
            standard: LevelPolicy {
                shell: ShellMode::AllowlistWithApproval,
                domains: DomainMode::ApproveUnlisted,
                paths: PathMode::ApproveUngranted,
                max_shell_grants: Some(3),
                max_directories: Some(3),
            },
            trusted: LevelPolicy {
                shell: ShellMode::WideAllowlist,
                domains: DomainMode::AllowUnlisted,
                paths: PathMode::ApproveUngranted,
                max_shell_grants: Some(10),
                max_directories: Some(10),
            },
            unrestricted: LevelPolicy {
                shell: ShellMode::PatternsOnly,
                domains: DomainMode::AllowUnlisted,
                paths: PathMode::AllowUngranted,
                max_shell_grants: None,
                max_directories: None,
            },
            substitution_threshold: SecurityLevel::Trusted,
            sudo_threshold: SecurityLevel::Unrestricted,
        }
    }
}

impl PolicyTable {
    /// Look up the policy row for a level.
    pub fn level(&self, level: SecurityLevel) -> &LevelPolicy {
        match level {
            SecurityLevel::Paranoid => &self.paranoid,
            SecurityLevel::Restricted => &self.restricted,
            SecurityLevel::Standard => &self.standard,
            SecurityLevel::Trusted => &self.trusted,
            SecurityLevel::Unrestricted => &self.unrestricted,
        }
    }

    pub fn max_shell_grants(&self, level: SecurityLevel) -> Option<usize> {
        self.level(level).max_shell_grants
    }

    pub fn max_directories(&self, level: SecurityLevel) -> Option<usize> {
        self.level(level).max_directories
    }
}

/// Binaries permitted to run without approval, in two tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryAllowlist {
    /// Available from level 2 upward.
    pub base: Vec<String>,
    /// Additionally available at level 4.
    pub extended: Vec<String>,
}

impl Default for BinaryAllowlist {
    fn default() -> Self {
        let base = [
            "ls", "cat", "head", "tail", "wc", "grep", "find", "which", "pwd", "echo", "date",
            "whoami", "env", "stat", "file", "sort", "uniq", "cut", "tr", "git", "du", "df",
            "ps", "uname",
        ];
        let extended = [
            "cargo", "npm", "node", "python3", "make", "rustc", "curl", "wget", "tar", "gzip",
            "sed", "awk", "docker", "kubectl",
        ];
        Self {
            base: base.iter().map(|s| s.to_string()).collect(),
            extended: extended.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BinaryAllowlist {
    /// Whether `binary` is on the base allowlist, or the extended one when
    /// `wide` is set. Paths are reduced to their file name first, so
    /// `/bin/ls` matches `ls`.
    pub fn contains(&self, binary: &str, wide: bool) -> bool {
        let name = std::path::Path::new(binary)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.base.iter().any(|b| b == &name) {
            return true;
        }
        wide && self.extended.iter().any(|b| b == &name)
    }
}

/// Curated hosts that skip approval at levels 2-3.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainRules {
    pub allowlist: Vec<String>,
}

impl DomainRules {
    /// Exact host match, or suffix match for allowlisted parent domains
    /// (`github.com` covers `api.github.com`).
    pub fn is_allowlisted(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.allowlist.iter().any(|d| {
            let d = d.to_ascii_lowercase();
            host == d || host.ends_with(&format!(".{d}"))
        })
    }
}

/// Directory grants and blocked prefixes for file path checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryRules {
    /// Directories the caller has been granted. Prefix match.
    pub granted: Vec<String>,
    /// Always-denied prefixes. `~` expands to the home directory.
    pub blocked: Vec<String>,
}

impl Default for DirectoryRules {
    fn default() -> Self {
        let blocked = [
            "/etc", "/sys", "/proc", "/boot", "/root", "~/.ssh", "~/.gnupg", "~/.aws",
            "~/.config/gcloud",
        ];
        Self {
            granted: Vec::new(),
            blocked: blocked.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Serialized settings from ~/.warden/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub security_level: SecurityLevel,
    pub policy: PolicyTable,
    pub binaries: BinaryAllowlist,
    pub domains: DomainRules,
    pub directories: DirectoryRules,
    /// Seconds a pending approval waits before expiring.
    pub approval_timeout_secs: u64,
    /// Hard timeout for sandboxed commands.
    pub sandbox_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::Standard,
            policy: PolicyTable::default(),
            binaries: BinaryAllowlist::default(),
            domains: DomainRules::default(),
            directories: DirectoryRules::default(),
            approval_timeout_secs: 300,
            sandbox_timeout_secs: 120,
        }
    }
}

/// Helper struct for storing the location to read/write global settings
pub struct ConfigStore {
    path: PathBuf,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".warden");
        path.push("config.json");
        Self { path }
    }

    /// Create with an explicit path (for testing).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the user's saved config, or fallback to Default
    pub fn load(&self) -> Config {
        if let Ok(content) = fs::read_to_string(&self.path) {
            if let Ok(config) = serde_json::from_str(&content) {
                return config;
            }
        }
        Config::default()
    }

    /// Save the user's config back to disk
    pub fn save(&self, config: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)
    }
}
