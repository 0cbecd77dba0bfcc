//! Command allowlisting for the `run_command` tool.
//!
//! Only the command head (first whitespace-separated word) is checked.
//! An empty allowlist allows everything; the default configuration ships
//! a safe-commands list.

/// A set of permitted command heads.
#[derive(Debug, Clone, Default)]
pub struct CommandAllowlist {
    allowed: Vec<String>,
}

impl CommandAllowlist {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// Allow everything.
    pub fn permissive() -> Self {
        Self { allowed: Vec::new() }
    }

    /// Whether `command` may run. Checks the base command only.
    pub fn is_allowed(&self, command: &str) -> bool {
        if self.allowed.is_empty() {
            return true;
        }

        let base_cmd = command.split_whitespace().next().unwrap_or("").trim();
        self.allowed.iter().any(|a| a == base_cmd)
    }

    /// The base command of an input, for error messages.
    pub fn base_command(command: &str) -> &str {
        command.split_whitespace().next().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_check() {
        let list = CommandAllowlist::new(vec!["ls".into(), "cat".into(), "git".into()]);
        assert!(list.is_allowed("ls -la"));
        assert!(list.is_allowed("cat file.txt"));
        assert!(list.is_allowed("git status"));
        assert!(!list.is_allowed("rm -rf /"));
        assert!(!list.is_allowed("sudo something"));
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let list = CommandAllowlist::permissive();
        assert!(list.is_allowed("anything goes"));
    }

    #[test]
    fn empty_command_not_allowed() {
        let list = CommandAllowlist::new(vec!["ls".into()]);
        assert!(!list.is_allowed(""));
        assert!(!list.is_allowed("   "));
    }

    #[test]
    fn base_command_extraction() {
        assert_eq!(CommandAllowlist::base_command("git status --short"), "git");
        assert_eq!(CommandAllowlist::base_command(""), "");
    }
}
