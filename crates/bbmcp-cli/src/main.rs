//! bbmcp CLI - MCP server for Bitbucket Server pull requests.

use std::sync::Arc;

use anyhow::Context;
use bbmcp_bitbucket::BitbucketClient;
use bbmcp_core::config::{ENV_PASSWORD, ENV_TOKEN};
use bbmcp_core::{Config, RemoteCredential};
use bbmcp_mcp::McpServer;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bbmcp")]
#[command(author, version, about = "MCP server for Bitbucket Server pull requests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server on stdin/stdout
    Serve,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set a value, e.g. `bitbucket.url https://bitbucket.example.com`
    Set {
        /// Config key (bitbucket.url or bitbucket.username)
        key: String,
        /// New value
        value: String,
    },

    /// Print a single value
    Get {
        /// Config key (bitbucket.url or bitbucket.username)
        key: String,
    },

    /// Show current configuration
    Show,
}

const CONFIG_KEYS: &[&str] = &["bitbucket.url", "bitbucket.username"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Stdout carries protocol frames, so logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Serve) => serve().await?,
        Some(Commands::Config { command }) => configure(command)?,
        None => {
            println!("bbmcp - MCP server for Bitbucket Server pull requests");
            println!("Run with --help for usage information");
        }
    }

    Ok(())
}

async fn serve() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let credential =
        RemoteCredential::from_env(&config).context("Failed to resolve Bitbucket credentials")?;

    tracing::info!(base_url = credential.base_url.as_str(), "Using Bitbucket Server");

    let client = BitbucketClient::new(credential)?;
    let server = McpServer::new(Arc::new(client));
    server.run().await?;

    Ok(())
}

fn configure(command: ConfigCommands) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    match command {
        ConfigCommands::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("Set {} = {}", key, value);
        }
        ConfigCommands::Get { key } => match config.get(&key)? {
            Some(value) => println!("{}", value),
            None => println!("{} is not set", key),
        },
        ConfigCommands::Show => {
            println!("Config file: {}", Config::config_path()?.display());
            for key in CONFIG_KEYS {
                let value = config.get(key)?;
                println!("{} = {}", key, value.as_deref().unwrap_or("<unset>"));
            }
            println!("Secrets are read from {} or {}", ENV_TOKEN, ENV_PASSWORD);
        }
    }

    Ok(())
}
