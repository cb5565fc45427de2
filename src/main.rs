use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "mini-notion")]
#[command(version, about = "Templates and structured notes over a JSON API")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file
    #[arg(long, global = true, default_value = mini_notion::config::CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to serve on (overrides config and API_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path (overrides config and DATABASE_PATH)
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (bind 0.0.0.0, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and schema, then exit
    Init {
        /// Database path (overrides config and DATABASE_PATH)
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// View or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default mini-notion.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { port, db_path, dev } => {
            cmd::cmd_serve(&cli, *port, db_path.clone(), *dev).await?
        }
        Commands::Init { db_path } => cmd::cmd_init(&cli, db_path.clone())?,
        Commands::Config { command } => cmd::cmd_config(&cli, command.clone())?,
    }

    Ok(())
}
