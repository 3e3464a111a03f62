//! splforge CLI: the main entry point.
//!
//! Commands:
//! - `compile`: Compile an SPL document and print the chain descriptor
//! - `run`: Compile, bind, and execute a chain, streaming envelopes
//! - `config`: Print the default, current, or path of the configuration

use clap::{Parser, Subcommand, ValueEnum};
use splforge_config::AgentKind;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "splforge",
    about = "splforge: compile and run SPL prompt chains",
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

#[derive(Clone, Copy, ValueEnum)]
enum AgentType {
    /// One streamed model call per model statement
    Tool,
    /// Model statements may call catalog APIs as tools
    Mag,
}

impl From<AgentType> for AgentKind {
    fn from(value: AgentType) -> Self {
        match value {
            AgentType::Tool => AgentKind::Tool,
            AgentType::Mag => AgentKind::Mag,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an SPL document and print the chain descriptor
    Compile {
        /// Path to the SPL document (JSON)
        document: PathBuf,

        /// Override the document's agent type
        #[arg(long, value_enum)]
        agent_type: Option<AgentType>,
    },

    /// Run an SPL document against a resource catalog
    Run {
        /// Path to the SPL document (JSON)
        document: PathBuf,

        /// Path to the catalog file with `apis` and `knowledge_bases`
        #[arg(short, long)]
        catalog: PathBuf,

        /// The user request
        #[arg(short, long)]
        query: String,

        /// Memory file read before the run and written back after it
        #[arg(short, long)]
        memory: Option<PathBuf>,

        /// Override the document's agent type
        #[arg(long, value_enum)]
        agent_type: Option<AgentType>,
    },

    /// Configuration commands (prints the default TOML without an action)
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the loaded configuration
    Show,
    /// Check the configuration and report problems
    Validate,
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only JSON.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Compile {
            document,
            agent_type,
        } => commands::compile::run(&document, agent_type.map(Into::into)).await?,
        Commands::Run {
            document,
            catalog,
            query,
            memory,
            agent_type,
        } => {
            commands::run::run(commands::run::RunArgs {
                document,
                catalog,
                query,
                memory,
                agent_type: agent_type.map(Into::into),
            })
            .await?
        }
        Commands::Config { action } => match action {
            None => commands::config_cmd::default_toml(),
            Some(ConfigAction::Show) => commands::config_cmd::show()?,
            Some(ConfigAction::Validate) => commands::config_cmd::validate()?,
            Some(ConfigAction::Path) => commands::config_cmd::path(),
        },
    }

    Ok(())
}
