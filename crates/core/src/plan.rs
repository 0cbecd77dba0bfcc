//! PlanStep: the structured decision the model emits on every loop turn.
//!
//! The model replies with exactly one JSON object per call:
//!
//! ```json
//! { "step": "plan",   "content": "..." }
//! { "step": "tool",   "tool": "create_file", "arguments": { ... } }
//! { "step": "output", "content": "..." }
//! ```
//!
//! The reply is untrusted input. Parsing fails closed: anything that does
//! not deserialize into a valid step becomes a `MalformedOutput` value the
//! loop can recover from, never a panic.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// One structured decision from the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum PlanStep {
    /// An intermediate reasoning step. Recorded, then the loop continues.
    Plan { content: String },

    /// A request to execute a tool with JSON-object arguments.
    #[serde(rename = "tool")]
    ToolCall {
        tool: String,
        #[serde(default)]
        arguments: serde_json::Value,
    },

    /// The final answer. Terminates the loop successfully.
    #[serde(rename = "output")]
    FinalAnswer { content: String },
}

impl PlanStep {
    /// Parse a raw model reply into a plan step.
    ///
    /// Tolerates a surrounding markdown code fence (models add them even
    /// when told not to), nothing else.
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let trimmed = strip_code_fence(raw.trim());
        serde_json::from_str(trimmed).map_err(|e| {
            ProviderError::MalformedOutput(format!("{e}; raw reply: {}", truncate(raw, 200)))
        })
    }

    /// The `response_format` payload sent with every model call so the
    /// reply is constrained to this shape.
    pub fn response_format() -> serde_json::Value {
        serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": "plan_step",
                "schema": {
                    "type": "object",
                    "properties": {
                        "step": {
                            "type": "string",
                            "enum": ["plan", "tool", "output"],
                            "description": "The kind of step to take next"
                        },
                        "content": {
                            "type": "string",
                            "description": "Reasoning text (plan) or the final answer (output)"
                        },
                        "tool": {
                            "type": "string",
                            "description": "Name of the tool to call (tool step only)"
                        },
                        "arguments": {
                            "type": "object",
                            "description": "Arguments for the tool call, keyed by parameter name"
                        }
                    },
                    "required": ["step"]
                }
            }
        })
    }
}

fn strip_code_fence(s: &str) -> &str {
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plan_step() {
        let step = PlanStep::parse(r#"{"step": "plan", "content": "think first"}"#).unwrap();
        assert_eq!(
            step,
            PlanStep::Plan {
                content: "think first".into()
            }
        );
    }

    #[test]
    fn parse_tool_step() {
        let step = PlanStep::parse(
            r#"{"step": "tool", "tool": "read_file", "arguments": {"file_path": "main.py"}}"#,
        )
        .unwrap();
        match step {
            PlanStep::ToolCall { tool, arguments } => {
                assert_eq!(tool, "read_file");
                assert_eq!(arguments["file_path"], "main.py");
            }
            other => panic!("Expected ToolCall, got: {other:?}"),
        }
    }

    #[test]
    fn parse_output_step() {
        let step = PlanStep::parse(r#"{"step": "output", "content": "Done."}"#).unwrap();
        assert_eq!(
            step,
            PlanStep::FinalAnswer {
                content: "Done.".into()
            }
        );
    }

    #[test]
    fn parse_tolerates_code_fence() {
        let raw = "```json\n{\"step\": \"output\", \"content\": \"Done.\"}\n```";
        let step = PlanStep::parse(raw).unwrap();
        assert!(matches!(step, PlanStep::FinalAnswer { .. }));
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = PlanStep::parse("I think we should create a file").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedOutput(_)));
    }

    #[test]
    fn parse_rejects_unknown_step() {
        let err = PlanStep::parse(r#"{"step": "dance", "content": "?"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedOutput(_)));
    }

    #[test]
    fn malformed_error_truncates_long_replies() {
        let raw = "x".repeat(1000);
        let err = PlanStep::parse(&raw).unwrap_err();
        let msg = err.to_string();
        assert!(msg.len() < 500);
    }

    #[test]
    fn tool_arguments_default_to_null() {
        let step = PlanStep::parse(r#"{"step": "tool", "tool": "read_file"}"#).unwrap();
        match step {
            PlanStep::ToolCall { arguments, .. } => assert!(arguments.is_null()),
            other => panic!("Expected ToolCall, got: {other:?}"),
        }
    }

    #[test]
    fn response_format_names_all_steps() {
        let fmt = PlanStep::response_format();
        let steps = fmt["json_schema"]["schema"]["properties"]["step"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(steps.len(), 3);
    }
}
