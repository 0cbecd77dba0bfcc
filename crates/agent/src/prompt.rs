//! System prompt construction.
//!
//! The system message carries the whole contract with the model: the
//! step-by-step protocol, the strict JSON reply format, the tool catalog,
//! and where generated files belong for the current request.

use codevox_classifier::ProjectSpec;
use codevox_core::tool::ToolDefinition;

/// Build the system prompt for one request.
pub fn build_system_prompt(definitions: &[ToolDefinition], project: &ProjectSpec) -> String {
    let mut tool_lines = String::new();
    for def in definitions {
        let params: Vec<String> = def.parameters["properties"]
            .as_object()
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default();
        tool_lines.push_str(&format!(
            "- {}({}): {}\n",
            def.name,
            params.join(", "),
            def.description
        ));
    }

    format!(
        r#"You are an expert AI coding assistant that helps with programming tasks using step-by-step reasoning.
You work in plan, tool, and output steps. First plan what needs to be done; the plan can take
multiple steps. You can call tools from the list of available tools. After every tool step, wait
for the observe message containing the tool's output. Once enough planning and tool work has been
done, give an output.

Rules:
- Reply with exactly one JSON object per message, nothing else.
- Only take one step at a time.
- The sequence of steps is: the user's request, then plan (possibly repeated), then tool calls as
  needed, and finally output, which is shown to the user.
- Think step by step about coding problems.
- Consider best practices, error handling, and code quality.

Reply format, one of:
{{ "step": "plan", "content": "<your reasoning>" }}
{{ "step": "tool", "tool": "<tool name>", "arguments": {{ "<param>": "<value>" }} }}
{{ "step": "output", "content": "<the final answer for the user>" }}

Available tools:
{tool_lines}
File paths are relative to the projects root. For this request the detected project type is
'{category}' and generated files belong in the '{target}' folder, for example
'{target}/index.html'."#,
        category = project.category,
        target = project.target_directory.display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use codevox_classifier::classify;
    use std::path::Path;

    fn definitions() -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "create_file".into(),
            description: "Create a new file.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["file_path", "content"]
            }),
        }]
    }

    #[test]
    fn prompt_lists_tools_and_folder() {
        let project = classify("Create a calculator app", Path::new("ai_projects"));
        let prompt = build_system_prompt(&definitions(), &project);

        assert!(prompt.contains("create_file(content, file_path)") || prompt.contains("create_file(file_path, content)"));
        assert!(prompt.contains("'calculator'"));
        assert!(prompt.contains("ai_projects/calculator_app"));
        assert!(prompt.contains("\"step\": \"output\""));
    }

    #[test]
    fn prompt_mentions_one_step_at_a_time() {
        let project = classify("make a blog", Path::new("ai_projects"));
        let prompt = build_system_prompt(&definitions(), &project);
        assert!(prompt.contains("one step at a time"));
    }
}
