mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mcpbridge")]
#[command(about = "Editor-embedded IPC bridge: MCP front end and local test harnesses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP-facing front end over stdio
    Serve {
        /// Optional TOML settings file overlaying environment variables
        #[arg(short, long)]
        settings: Option<String>,
    },

    /// Run a standalone editor-bridge stand-in for local testing
    Host {
        /// Port to listen on (0 picks an ephemeral port)
        #[arg(short, long, default_value_t = 0)]
        port: u16,
    },

    /// Run the editor-bridge stand-in and simulate periodic domain reloads
    Dev {
        /// Port to listen on (0 picks an ephemeral port)
        #[arg(short, long, default_value_t = 0)]
        port: u16,

        /// Seconds between simulated domain reloads
        #[arg(short, long, default_value_t = 30)]
        reload_every_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { settings } => {
            commands::serve::execute(settings.as_deref()).await?;
        }
        Commands::Host { port } => {
            commands::host::execute(port).await?;
        }
        Commands::Dev { port, reload_every_secs } => {
            commands::dev::execute(port, Duration::from_secs(reload_every_secs)).await?;
        }
    }

    Ok(())
}
