//! `codevox ask`: one-shot or interactive assistant session.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use codevox_agent::{AgentRunner, TurnStatus};
use codevox_config::AppConfig;
use codevox_core::message::Conversation;
use codevox_providers::OpenAiCompatProvider;
use codevox_security::CommandAllowlist;
use codevox_tools::{ToolCatalog, ToolPolicy};

pub async fn run(
    message: Option<String>,
    model_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    let Some(api_key) = config.api_key.clone() else {
        eprintln!(
            "No API key configured. Set {} (or {}) or add api_key to {}.",
            codevox_config::API_KEY_ENV,
            codevox_config::OPENAI_API_KEY_ENV,
            AppConfig::config_path().display()
        );
        std::process::exit(1);
    };

    let policy = ToolPolicy::new(&config.projects_root)
        .with_overwrite(config.tools.allow_overwrite)
        .with_command_timeout(Duration::from_secs(config.tools.command_timeout_secs))
        .with_allowlist(CommandAllowlist::new(config.tools.allowed_commands.clone()));
    let catalog = Arc::new(ToolCatalog::new(policy)?);

    let provider = Arc::new(OpenAiCompatProvider::new(
        "openai",
        &config.api_url,
        api_key,
    ));
    let model = model_override.unwrap_or_else(|| config.default_model.clone());
    let runner = AgentRunner::new(provider, catalog, model, config.default_temperature)
        .with_max_steps(config.max_steps);

    let mut conversation = Conversation::new();

    if let Some(message) = message {
        run_turn(&runner, &message, &mut conversation).await;
        return Ok(());
    }

    // Interactive session. Each turn reuses the accumulated history.
    println!("codevox interactive session. Empty line or Ctrl-D to exit.");
    let stdin = std::io::stdin();
    loop {
        print!("Type your query: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            break;
        }

        run_turn(&runner, query, &mut conversation).await;
    }

    Ok(())
}

async fn run_turn(runner: &AgentRunner, query: &str, conversation: &mut Conversation) {
    match runner.run(query, conversation).await {
        Ok(result) => {
            for outcome in &result.tool_outcomes {
                let marker = if outcome.success { "ok" } else { "failed" };
                println!("[tool {marker}] {}: {}", outcome.tool, first_line(&outcome.output));
            }
            if result.status == TurnStatus::StepBudgetExceeded {
                eprintln!("(step budget exhausted)");
            }
            println!("{}", result.answer);
        }
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
