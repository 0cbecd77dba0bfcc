//! read_file: return a file's contents as text.

use codevox_core::error::ToolError;
use codevox_core::tool::{ToolDefinition, ToolOutcome};

use crate::{ToolPolicy, require_str, resolve};

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "read_file".into(),
        description: "Read the contents of an existing file. Paths are relative to the \
                      projects root."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to read"
                }
            },
            "required": ["file_path"]
        }),
    }
}

pub(crate) async fn execute(
    policy: &ToolPolicy,
    arguments: &serde_json::Value,
) -> Result<ToolOutcome, ToolError> {
    let file_path = require_str(arguments, "file_path")?;
    let resolved = resolve(policy, file_path)?;

    let bytes = tokio::fs::read(&resolved).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolError::NotFound(file_path.into())
        } else {
            ToolError::ExecutionFailed {
                tool_name: "read_file".into(),
                reason: e.to_string(),
            }
        }
    })?;

    let content = String::from_utf8(bytes).map_err(|_| ToolError::DecodeError(file_path.into()))?;

    Ok(ToolOutcome::success("read_file", content))
}
