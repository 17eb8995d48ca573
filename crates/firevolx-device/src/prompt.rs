//! Prompt patterns and output cleanup for interactive shells.

use std::sync::LazyLock;

use regex::Regex;

/// Shell prompt: a trailing `$`, `#` or `>` followed by optional whitespace.
pub const DEFAULT_SHELL_PROMPT: &str = r"[$#>]\s*$";

static SHELL_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_SHELL_PROMPT).expect("valid shell prompt pattern"));

pub(crate) static LOGIN_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(login|username)[: ]*$").expect("valid login pattern"));

pub(crate) static PASSWORD_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)password[: ]*$").expect("valid password pattern"));

pub(crate) static LOGIN_FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(login incorrect|authentication fail|access denied)")
        .expect("valid login failure pattern")
});

/// The default shell prompt pattern.
#[must_use]
pub fn default_shell_prompt() -> Regex {
    SHELL_PROMPT.clone()
}

/// Turn the raw transcript of one command into its output.
///
/// Normalizes line endings, drops the echoed command line and the trailing
/// prompt line.
#[must_use]
pub fn clean_exec_output(raw: &str, command: &str, prompt: &Regex) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "");
    let mut lines: Vec<&str> = normalized.split('\n').collect();

    let command = command.trim();
    if !command.is_empty() && lines.first().is_some_and(|l| l.trim_end().ends_with(command)) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| prompt.is_match(l)) {
        lines.pop();
    }

    lines.join("\n").trim_end_matches('\n').to_string()
}
