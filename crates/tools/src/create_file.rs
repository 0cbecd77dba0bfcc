//! create_file: write a new file, creating project folders as needed.

use codevox_core::error::ToolError;
use codevox_core::tool::{ToolDefinition, ToolOutcome};

use crate::{ToolPolicy, require_str, resolve};

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "create_file".into(),
        description: "Create a new file with specified content. Parent folders are created \
                      automatically. Paths are relative to the projects root."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path where the file should be created"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["file_path", "content"]
        }),
    }
}

pub(crate) async fn execute(
    policy: &ToolPolicy,
    arguments: &serde_json::Value,
) -> Result<ToolOutcome, ToolError> {
    let file_path = require_str(arguments, "file_path")?;
    let content = require_str(arguments, "content")?;

    let resolved = resolve(policy, file_path)?;

    if !policy.allow_overwrite && resolved.exists() {
        return Err(ToolError::AlreadyExists(file_path.into()));
    }

    if let Some(parent) = resolved.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "create_file".into(),
                reason: format!("failed to create directory: {e}"),
            })?;
    }

    tokio::fs::write(&resolved, content)
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: "create_file".into(),
            reason: e.to_string(),
        })?;

    Ok(ToolOutcome::success(
        "create_file",
        format!("File '{file_path}' created successfully."),
    ))
}
