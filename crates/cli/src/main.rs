//! codevox CLI: the main entry point.
//!
//! Commands:
//! - `ask`    - One-shot question or interactive text session
//! - `serve`  - Start the HTTP gateway
//! - `tools`  - List the tool catalog
//! - `doctor` - Diagnose configuration health
//!
//! Voice capture is handled by an external speech-to-text collaborator;
//! the CLI takes typed input and behaves identically from there on.

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "codevox",
    about = "codevox - a voice/text-driven coding assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the assistant to do something
    Ask {
        /// Send a single request instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Override the configured model
        #[arg(long)]
        model: Option<String>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the available tools
    Tools,

    /// Diagnose configuration health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Ask { message, model } => commands::ask::run(message, model).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Tools => commands::tools_cmd::run()?,
        Commands::Doctor => commands::doctor::run()?,
    }

    Ok(())
}
