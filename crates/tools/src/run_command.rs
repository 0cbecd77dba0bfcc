//! run_command: execute a shell command with safety constraints.
//!
//! Commands are checked against the policy allowlist, run inside the
//! projects root (or a working directory under it), and bounded by the
//! policy timeout. A nonzero exit is reported as an execution failure with
//! the captured output; the caller decides whether that ends the turn.

use codevox_core::error::ToolError;
use codevox_core::tool::{ToolDefinition, ToolOutcome};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{ToolPolicy, require_str, resolve};
use codevox_security::CommandAllowlist;

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "run_command".into(),
        description: "Execute safe system commands only (version checks, directory listings, \
                      git, package-manager reads). Dangerous operations are blocked."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "working_directory": {
                    "type": "string",
                    "description": "Directory to run in, relative to the projects root (optional)"
                }
            },
            "required": ["command"]
        }),
    }
}

pub(crate) async fn execute(
    policy: &ToolPolicy,
    arguments: &serde_json::Value,
) -> Result<ToolOutcome, ToolError> {
    let command = require_str(arguments, "command")?;

    if !policy.allowlist.is_allowed(command) {
        return Err(ToolError::CommandNotAllowed(
            CommandAllowlist::base_command(command).into(),
        ));
    }

    let cwd = match arguments.get("working_directory").and_then(|v| v.as_str()) {
        Some(dir) => {
            let resolved = resolve(policy, dir)?;
            if !resolved.is_dir() {
                return Err(ToolError::NotFound(dir.into()));
            }
            resolved
        }
        None => policy.root.clone(),
    };

    debug!(command = %command, cwd = %cwd.display(), "Executing command");

    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    };
    cmd.current_dir(&cwd).kill_on_drop(true);

    let timeout_secs = policy.command_timeout.as_secs();
    let output = tokio::time::timeout(policy.command_timeout, cmd.output())
        .await
        .map_err(|_| {
            warn!(command = %command, timeout_secs, "Command timed out");
            ToolError::Timeout {
                tool_name: "run_command".into(),
                timeout_secs,
            }
        })?
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: "run_command".into(),
            reason: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        warn!(command = %command, exit_code = code, "Command failed");
        return Err(ToolError::ExecutionFailed {
            tool_name: "run_command".into(),
            reason: format!("exit code {code}\n{stdout}\n{stderr}").trim().to_string(),
        });
    }

    let result_text = if stderr.is_empty() {
        stdout
    } else {
        format!("{stdout}\n[stderr]: {stderr}")
    };

    Ok(ToolOutcome::success(
        "run_command",
        result_text.trim().to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy() -> (tempfile::TempDir, ToolPolicy) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ai_projects");
        std::fs::create_dir_all(&root).unwrap();
        (dir, ToolPolicy::new(root))
    }

    #[test]
    fn tool_definition() {
        let def = definition();
        assert_eq!(def.name, "run_command");
        assert_eq!(def.parameters["required"], serde_json::json!(["command"]));
    }

    #[tokio::test]
    async fn execute_echo() {
        let (_guard, policy) = policy();
        let outcome = execute(&policy, &serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.output.contains("hello"));
    }

    #[tokio::test]
    async fn runs_in_projects_root_by_default() {
        let (_guard, policy) = policy();
        std::fs::write(policy.root.join("marker.txt"), "x").unwrap();

        let outcome = execute(&policy, &serde_json::json!({"command": "ls"}))
            .await
            .unwrap();
        assert!(outcome.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn working_directory_is_honored() {
        let (_guard, policy) = policy();
        std::fs::create_dir_all(policy.root.join("sub")).unwrap();
        std::fs::write(policy.root.join("sub/inner.txt"), "x").unwrap();

        let outcome = execute(
            &policy,
            &serde_json::json!({"command": "ls", "working_directory": "sub"}),
        )
        .await
        .unwrap();
        assert!(outcome.output.contains("inner.txt"));
    }

    #[tokio::test]
    async fn missing_working_directory_is_not_found() {
        let (_guard, policy) = policy();
        let err = execute(
            &policy,
            &serde_json::json!({"command": "ls", "working_directory": "nope"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn blocked_command() {
        let (_guard, policy) = policy();
        let policy = policy.with_allowlist(CommandAllowlist::new(vec!["ls".into()]));
        let err = execute(&policy, &serde_json::json!({"command": "rm -rf /"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::CommandNotAllowed(_)));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let (_guard, policy) = policy();
        let err = execute(&policy, &serde_json::json!({"command": "sh -c 'exit 3'"}))
            .await
            .unwrap_err();
        match err {
            ToolError::ExecutionFailed { reason, .. } => assert!(reason.contains("exit code 3")),
            other => panic!("Expected ExecutionFailed, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_enforced() {
        let (_guard, policy) = policy();
        let policy = policy.with_command_timeout(Duration::from_millis(200));
        let err = execute(&policy, &serde_json::json!({"command": "sleep 5"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_command_fails_fast() {
        let (_guard, policy) = policy();
        let err = execute(&policy, &serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn escaping_working_directory_rejected() {
        let (_guard, policy) = policy();
        let err = execute(
            &policy,
            &serde_json::json!({"command": "ls", "working_directory": "../.."}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::PathEscape { .. }));
    }
}
