//! write_file: overwrite an existing file's content.
//!
//! The target must already exist; this is what distinguishes it from
//! `create_file`, which is additive.

use codevox_core::error::ToolError;
use codevox_core::tool::{ToolDefinition, ToolOutcome};

use crate::{ToolPolicy, require_str, resolve};

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "write_file".into(),
        description: "Write/update content in an existing file. Overwrites existing content; \
                      fails if the file does not exist yet."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to write to"
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

    if !resolved.is_file() {
        return Err(ToolError::NotFound(file_path.into()));
    }

    tokio::fs::write(&resolved, content)
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: "write_file".into(),
            reason: e.to_string(),
        })?;

    Ok(ToolOutcome::success(
        "write_file",
        format!("File '{file_path}' updated successfully."),
    ))
}
