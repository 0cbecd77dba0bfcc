//! analyze_code: structural metrics for a source file.
//!
//! Naive textual pattern search, not a parser: line counts plus
//! function/class/import counts by per-language line prefixes, with the
//! language detected from the file extension. Read-only and idempotent.

use codevox_core::error::ToolError;
use codevox_core::tool::{ToolDefinition, ToolOutcome};

use crate::{ToolPolicy, require_str, resolve};

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "analyze_code".into(),
        description: "Analyze code structure and provide feedback including line count, \
                      imports, functions, and classes."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the code file to analyze"
                }
            },
            "required": ["file_path"]
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Python,
    Rust,
    JavaScript,
    TypeScript,
    Html,
    Css,
    Unknown,
}

impl Language {
    fn from_extension(path: &str) -> Self {
        match path.rsplit('.').next().unwrap_or("") {
            "py" => Language::Python,
            "rs" => Language::Rust,
            "js" | "jsx" | "mjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "html" | "htm" => Language::Html,
            "css" => Language::Css,
            _ => Language::Unknown,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Rust => "Rust",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::Unknown => "Unknown",
        }
    }

    fn is_function(&self, trimmed: &str) -> bool {
        match self {
            Language::Python => trimmed.starts_with("def ") || trimmed.starts_with("async def "),
            Language::Rust => {
                trimmed.starts_with("fn ")
                    || trimmed.starts_with("pub fn ")
                    || trimmed.starts_with("async fn ")
                    || trimmed.starts_with("pub async fn ")
            }
            Language::JavaScript | Language::TypeScript => {
                trimmed.starts_with("function ")
                    || trimmed.starts_with("async function ")
                    || trimmed.contains("=> ")
            }
            Language::Html | Language::Css => false,
            Language::Unknown => {
                trimmed.starts_with("def ")
                    || trimmed.starts_with("fn ")
                    || trimmed.starts_with("function ")
            }
        }
    }

    fn is_class(&self, trimmed: &str) -> bool {
        match self {
            Language::Python => trimmed.starts_with("class "),
            Language::Rust => {
                trimmed.starts_with("struct ")
                    || trimmed.starts_with("pub struct ")
                    || trimmed.starts_with("enum ")
                    || trimmed.starts_with("pub enum ")
            }
            Language::JavaScript | Language::TypeScript => trimmed.starts_with("class "),
            Language::Html | Language::Css => false,
            Language::Unknown => trimmed.starts_with("class "),
        }
    }

    fn is_import(&self, trimmed: &str) -> bool {
        match self {
            Language::Python => trimmed.starts_with("import ") || trimmed.starts_with("from "),
            Language::Rust => trimmed.starts_with("use "),
            Language::JavaScript | Language::TypeScript => trimmed.starts_with("import "),
            Language::Html | Language::Css => false,
            Language::Unknown => trimmed.starts_with("import "),
        }
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
                tool_name: "analyze_code".into(),
                reason: e.to_string(),
            }
        }
    })?;
    let content = String::from_utf8(bytes).map_err(|_| ToolError::DecodeError(file_path.into()))?;

    let language = Language::from_extension(file_path);

    let mut total_lines = 0usize;
    let mut non_blank_lines = 0usize;
    let mut functions = 0usize;
    let mut classes = 0usize;
    let mut imports = 0usize;

    for line in content.lines() {
        total_lines += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        non_blank_lines += 1;
        if language.is_function(trimmed) {
            functions += 1;
        }
        if language.is_class(trimmed) {
            classes += 1;
        }
        if language.is_import(trimmed) {
            imports += 1;
        }
    }

    let mut analysis = format!("Code Analysis for '{file_path}':\n");
    analysis.push_str(&format!("- Language: {}\n", language.name()));
    analysis.push_str(&format!("- Total lines: {total_lines}\n"));
    analysis.push_str(&format!("- Non-blank lines: {non_blank_lines}\n"));
    analysis.push_str(&format!("- Imports: {imports}\n"));
    analysis.push_str(&format!("- Functions: {functions}\n"));
    analysis.push_str(&format!("- Classes: {classes}\n"));

    Ok(
        ToolOutcome::success("analyze_code", analysis).with_data(serde_json::json!({
            "language": language.name(),
            "total_lines": total_lines,
            "non_blank_lines": non_blank_lines,
            "imports": imports,
            "functions": functions,
            "classes": classes,
        })),
    )
}
