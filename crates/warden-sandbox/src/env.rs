//! Sanitized environment construction for spawned processes.
//!
//! The ambient environment of the agent process routinely carries API keys
//! and tokens. Spawned commands start from an explicit allowlist of inherited
//! variables instead of the full environment.

use std::collections::HashMap;

/// Variables inherited from the parent process when present.
const INHERITED_VARS: &[&str] = &[
    "PATH", "HOME", "LANG", "LC_ALL", "LC_CTYPE", "TZ", "TERM", "USER", "SHELL", "TMPDIR",
];

/// Build the environment for a sandboxed process: allowlisted inherited
/// variables first, then caller overrides on top.
pub fn sanitized_env(overrides: &HashMap<String, String>) -> HashMap<String, String> {
    let mut env = HashMap::new();
    for name in INHERITED_VARS {
        if let Ok(value) = std::env::var(name) {
            env.insert(name.to_string(), value);
        }
    }
    for (name, value) in overrides {
        env.insert(name.clone(), value.clone());
    }
    env
}
