//! CLI argument and command definitions.

use clap::{Parser, Subcommand};
use warden_core::{Config, SecurityLevel};

#[derive(Parser)]
#[command(name = "warden", version, about = "Security policy engine for agent actions")]
pub struct Cli {
    /// Security level to evaluate against (1-5 or a level name).
    #[arg(long, value_parser = parse_level, global = true)]
    pub level: Option<SecurityLevel>,

    /// Emit results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// CLI flag wins over the configured level.
    pub fn resolve_level(&self, config: &Config) -> SecurityLevel {
        self.level.unwrap_or(config.security_level)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a shell command against the policy without running it.
    Check {
        /// The command line to evaluate.
        command: String,
    },

    /// Evaluate a URL against the domain policy.
    CheckUrl {
        /// The URL or host to evaluate.
        url: String,
    },

    /// Evaluate a filesystem path against the directory policy.
    CheckPath {
        /// The path to evaluate.
        path: String,
    },

    /// Evaluate a command and, if permitted, run it in the sandbox.
    Run {
        /// The command line to evaluate and run.
        command: String,

        /// Working directory for the command.
        #[arg(long)]
        cwd: Option<String>,

        /// Execution timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Manage pending approval requests.
    Approvals {
        #[command(subcommand)]
        action: ApprovalAction,
    },
}

#[derive(Subcommand)]
pub enum ApprovalAction {
    /// List pending approval requests.
    List,

    /// Feed a human reply to the pending queue.
    Respond {
        /// The reply text, e.g. "yes" or "deny".
        text: String,

        /// Only match requests raised on this channel type.
        #[arg(long)]
        channel_type: Option<String>,

        /// Only match requests raised on this channel id.
        #[arg(long)]
        channel_id: Option<String>,
    },

    /// Expire past-due pending requests.
    Expire,
}

fn parse_level(value: &str) -> Result<SecurityLevel, String> {
    if let Ok(n) = value.parse::<u8>() {
        return SecurityLevel::try_from(n).map_err(|e| e.to_string());
    }
    match value.to_ascii_lowercase().as_str() {
        "paranoid" => Ok(SecurityLevel::Paranoid),
        "restricted" => Ok(SecurityLevel::Restricted),
        "standard" => Ok(SecurityLevel::Standard),
        "trusted" => Ok(SecurityLevel::Trusted),
        "unrestricted" => Ok(SecurityLevel::Unrestricted),
        other => Err(format!(
            "unknown security level '{other}' (expected 1-5 or paranoid|restricted|standard|trusted|unrestricted)"
        )),
    }
}
