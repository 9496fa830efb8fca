//! Shell command parsing into structured, policy-checkable form.
//!
//! The parser is deliberately not a full shell grammar. It splits pipelines,
//! tokenizes with quote awareness, and flags the constructs the permission
//! engine cares about (sudo, redirects, substitution, expansion). Anything it
//! cannot parse degrades to the most conservative reading so the policy layer
//! fails closed, never open.

/// A shell command in structured form. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// First token of the first pipeline stage. Empty when unparseable.
    pub binary: String,
    /// Remaining tokens of the first stage.
    pub args: Vec<String>,
    /// The original command string, untouched.
    pub raw: String,
    /// One entry per pipeline stage after the first, in order.
    pub pipes: Vec<ParsedCommand>,
    /// Unquoted `>`, `>>`, or `<` present.
    pub has_redirects: bool,
    /// Any stage runs under sudo/doas (after leading env assignments).
    pub has_sudo: bool,
    /// `$(...)` or backticks present outside single quotes. Double quotes do
    /// not suppress substitution, so they count.
    pub has_command_substitution: bool,
    /// `${...}` or bare `$VAR` present outside single quotes.
    pub has_variable_expansion: bool,
}

impl ParsedCommand {
    /// Iterate over every stage of the pipeline, first stage included.
    pub fn stages(&self) -> impl Iterator<Item = &ParsedCommand> {
        std::iter::once(self).chain(self.pipes.iter())
    }
}

/// Parse a raw shell string. Never fails: malformed quoting yields a
/// conservative result with an empty binary and both substitution flags set.
pub fn parse(raw: &str) -> ParsedCommand {
    match scan(raw) {
        Some(scan) => build(raw, scan),
        None => ParsedCommand {
            binary: String::new(),
            args: Vec::new(),
            raw: raw.to_string(),
            pipes: Vec::new(),
            has_redirects: false,
            has_sudo: false,
            has_command_substitution: true,
            has_variable_expansion: true,
        },
    }
}

struct Scan {
    stages: Vec<Vec<String>>,
    has_redirects: bool,
    has_substitution: bool,
    has_expansion: bool,
}

/// Single pass over the raw string. Returns `None` on unterminated quoting.
///
/// Stages split on unquoted `|`, `;`, `&`, and newlines, so every
/// sub-command's binary passes through the policy ladder rather than hiding
/// as an argument of the first one.
fn scan(raw: &str) -> Option<Scan> {
    let mut stages: Vec<Vec<String>> = Vec::new();
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut has_token = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut has_redirects = false;
    let mut has_substitution = false;
    let mut has_expansion = false;

    let mut chars = raw.chars().peekable();

    macro_rules! flush_token {
        () => {
            if has_token {
                tokens.push(std::mem::take(&mut current));
                has_token = false;
            }
        };
    }
    macro_rules! flush_stage {
        () => {
            flush_token!();
            if !tokens.is_empty() {
                stages.push(std::mem::take(&mut tokens));
            }
        };
    }

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                has_token = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                has_token = true;
            }
            '\\' if !in_single => {
                if let Some(&next) = chars.peek() {
                    current.push(next);
                    has_token = true;
                    chars.next();
                }
            }
            '`' if !in_single => {
                has_substitution = true;
                current.push(c);
                has_token = true;
            }
            '$' if !in_single => {
                match chars.peek() {
                    Some('(') => has_substitution = true,
                    Some('{') => has_expansion = true,
                    Some(&ch) if ch.is_ascii_alphanumeric() || ch == '_' => has_expansion = true,
                    _ => {}
                }
                current.push(c);
                has_token = true;
            }
            '|' | ';' | '&' | '\n' if !in_single && !in_double => {
                flush_stage!();
            }
            '>' | '<' if !in_single && !in_double => {
                has_redirects = true;
                flush_token!();
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                flush_token!();
            }
            _ => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if in_single || in_double {
        return None;
    }
    flush_stage!();

    Some(Scan {
        stages,
        has_redirects,
        has_substitution,
        has_expansion,
    })
}

fn build(raw: &str, scan: Scan) -> ParsedCommand {
    let mut stages = scan.stages.into_iter();
    let (binary, args) = split_stage(stages.next().unwrap_or_default());

    let pipes: Vec<ParsedCommand> = stages
        .map(|tokens| {
            let stage_raw = tokens.join(" ");
            let (binary, args) = split_stage(tokens);
            ParsedCommand {
                has_sudo: is_sudo_binary(&binary),
                binary,
                args,
                raw: stage_raw,
                pipes: Vec::new(),
                has_redirects: false,
                has_command_substitution: false,
                has_variable_expansion: false,
            }
        })
        .collect();

    let has_sudo = is_sudo_binary(&binary) || pipes.iter().any(|p| p.has_sudo);

    ParsedCommand {
        binary,
        args,
        raw: raw.to_string(),
        pipes,
        has_redirects: scan.has_redirects,
        has_sudo,
        has_command_substitution: scan.has_substitution,
        has_variable_expansion: scan.has_expansion,
    }
}

/// Split a stage's tokens into binary + args, skipping leading `NAME=value`
/// environment assignments so `FOO=bar sudo cmd` still registers as sudo.
fn split_stage(tokens: Vec<String>) -> (String, Vec<String>) {
    let mut iter = tokens.into_iter().peekable();
    let mut skipped = Vec::new();
    while let Some(tok) = iter.peek() {
        if is_env_assignment(tok) {
            skipped.push(iter.next().unwrap_or_default());
        } else {
            break;
        }
    }
    match iter.next() {
        Some(binary) => (binary, iter.collect()),
        // Only assignments, no command. Keep the first assignment as the
        // "binary" so the allowlist check cannot match it.
        None => (skipped.into_iter().next().unwrap_or_default(), Vec::new()),
    }
}

fn is_env_assignment(token: &str) -> bool {
    let Some(eq) = token.find('=') else {
        return false;
    };
    if eq == 0 {
        return false;
    }
    token[..eq]
        .chars()
        .enumerate()
        .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()))
}

fn is_sudo_binary(binary: &str) -> bool {
    let name = std::path::Path::new(binary)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    matches!(name.as_str(), "sudo" | "doas")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_command() {
        let cmd = parse("ls -la /tmp");
        assert_eq!(cmd.binary, "ls");
        assert_eq!(cmd.args, vec!["-la", "/tmp"]);
        assert!(cmd.pipes.is_empty());
        assert!(!cmd.has_redirects);
        assert!(!cmd.has_sudo);
        assert!(!cmd.has_command_substitution);
        assert!(!cmd.has_variable_expansion);
    }

    #[test]
    fn test_pipeline_order_preserved() {
        let cmd = parse("cmd1 | cmd2 | cmd3");
        assert_eq!(cmd.binary, "cmd1");
        assert_eq!(cmd.pipes.len(), 2);
        assert_eq!(cmd.pipes[0].binary, "cmd2");
        assert_eq!(cmd.pipes[1].binary, "cmd3");
    }

    #[test]
    fn test_quoted_pipe_is_not_a_stage() {
        let cmd = parse("echo 'a | b'");
        assert_eq!(cmd.binary, "echo");
        assert_eq!(cmd.args, vec!["a | b"]);
        assert!(cmd.pipes.is_empty());
    }

    #[test]
    fn test_double_quoted_tokens() {
        let cmd = parse(r#"grep "hello world" file.txt"#);
        assert_eq!(cmd.args, vec!["hello world", "file.txt"]);
    }

    #[test]
    fn test_redirects_detected() {
        assert!(parse("echo hi > out.txt").has_redirects);
        assert!(parse("cat < in.txt").has_redirects);
        assert!(parse("echo hi >> out.txt").has_redirects);
        assert!(!parse("echo 'a > b'").has_redirects);
    }

    #[test]
    fn test_sudo_detection() {
        assert!(parse("sudo rm file").has_sudo);
        assert!(parse("doas reboot").has_sudo);
        assert!(parse("FOO=bar sudo id").has_sudo);
        assert!(parse("cat /etc/passwd | sudo tee /etc/passwd").has_sudo);
        assert!(!parse("echo sudo").has_sudo);
    }

    #[test]
    fn test_command_substitution() {
        assert!(parse("echo $(whoami)").has_command_substitution);
        assert!(parse("echo `id`").has_command_substitution);
        assert!(!parse("echo hello").has_command_substitution);
    }

    #[test]
    fn test_substitution_inside_double_quotes_counts() {
        // Shells still expand $(...) inside double quotes.
        assert!(parse(r#"echo "$(whoami)""#).has_command_substitution);
        assert!(parse(r#"echo "`id`""#).has_command_substitution);
    }

    #[test]
    fn test_single_quotes_suppress_substitution() {
        assert!(!parse("echo '$(whoami)'").has_command_substitution);
        assert!(!parse("echo '`id`'").has_command_substitution);
        assert!(!parse("echo '${HOME}'").has_variable_expansion);
    }

    #[test]
    fn test_variable_expansion() {
        assert!(parse("echo ${HOME}").has_variable_expansion);
        assert!(parse("echo $USER").has_variable_expansion);
        assert!(!parse("echo 'costs $5'").has_variable_expansion);
        // A bare dollar sign is not an expansion.
        assert!(!parse("echo $ done").has_variable_expansion);
    }

    #[test]
    fn test_semicolon_and_chain_produce_stages() {
        let cmd = parse("ls; rm -rf /tmp/x");
        assert_eq!(cmd.pipes.len(), 1);
        assert_eq!(cmd.pipes[0].binary, "rm");

        let cmd = parse("true && curl evil.sh");
        assert_eq!(cmd.pipes[0].binary, "curl");
    }

    #[test]
    fn test_env_assignment_only_is_not_a_binary() {
        let cmd = parse("FOO=bar");
        assert_eq!(cmd.binary, "FOO=bar");
        let cmd = parse("FOO=bar ls");
        assert_eq!(cmd.binary, "ls");
    }

    #[test]
    fn test_unterminated_quote_degrades_closed() {
        let cmd = parse("echo 'oops");
        assert_eq!(cmd.binary, "");
        assert!(cmd.args.is_empty());
        assert!(cmd.has_command_substitution);
        assert!(cmd.has_variable_expansion);
        assert_eq!(cmd.raw, "echo 'oops");
    }

    #[test]
    fn test_empty_input() {
        let cmd = parse("");
        assert_eq!(cmd.binary, "");
        assert!(cmd.pipes.is_empty());

        let cmd = parse("   ");
        assert_eq!(cmd.binary, "");
    }

    #[test]
    fn test_escaped_characters() {
        let cmd = parse(r"echo hello\ world");
        assert_eq!(cmd.args, vec!["hello world"]);
        // An escaped pipe is not a stage separator.
        let cmd = parse(r"echo a \| b");
        assert!(cmd.pipes.is_empty());
    }

    #[test]
    fn test_stages_iterator() {
        let cmd = parse("a | b | c");
        let binaries: Vec<&str> = cmd.stages().map(|s| s.binary.as_str()).collect();
        assert_eq!(binaries, vec!["a", "b", "c"]);
    }
}
