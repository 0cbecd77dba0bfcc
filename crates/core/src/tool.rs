//! Tool domain types: the closed set of operations the agent can take.
//!
//! The tool set is a closed, explicitly enumerated variant set rather than
//! an open registry of callables. Adding a tool means adding a `ToolName`
//! variant, its schema, and a dispatch arm; nothing is looked up by
//! reflection at runtime.

use serde::{Deserialize, Serialize};

/// The fixed catalog of tool names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    CreateFile,
    ReadFile,
    WriteFile,
    AnalyzeCode,
    RunCommand,
}

impl ToolName {
    /// Every tool, in catalog order.
    pub const ALL: [ToolName; 5] = [
        ToolName::CreateFile,
        ToolName::ReadFile,
        ToolName::WriteFile,
        ToolName::AnalyzeCode,
        ToolName::RunCommand,
    ];

    /// Resolve a model-supplied name. `None` means unknown tool.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create_file" => Some(ToolName::CreateFile),
            "read_file" => Some(ToolName::ReadFile),
            "write_file" => Some(ToolName::WriteFile),
            "analyze_code" => Some(ToolName::AnalyzeCode),
            "run_command" => Some(ToolName::RunCommand),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CreateFile => "create_file",
            ToolName::ReadFile => "read_file",
            ToolName::WriteFile => "write_file",
            ToolName::AnalyzeCode => "analyze_code",
            ToolName::RunCommand => "run_command",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to execute a tool, as decoded from a plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute (unvalidated model output)
    pub name: String,

    /// Arguments as a JSON object keyed by parameter name
    pub arguments: serde_json::Value,
}

/// The outcome of executing one tool call.
///
/// Never mutated after creation; appended to the turn's record list and
/// fed back to the model as an observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Which tool ran
    pub tool: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content (or failure description)
    pub output: String,

    /// Optional structured data (e.g. analysis metrics)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutcome {
    pub fn success(tool: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(tool: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            success: false,
            output: output.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A tool definition: name, description, and JSON Schema for its arguments.
///
/// Rendered into the system prompt and served from the gateway's
/// `tools/list` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}
