//! priorender CLI — the main entry point.
//!
//! Commands:
//! - `render`  — Render a JSON prompt tree within a token budget
//! - `models`  — List model presets
//! - `config`  — Show, locate, create or validate the config file

use clap::{Parser, Subcommand};

mod commands;

use commands::render::RenderArgs;

#[derive(Parser)]
#[command(
    name = "priorender",
    about = "priorender — fit priority-annotated prompts into a token budget",
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
    /// Render a prompt tree (JSON) at the lowest cutoff that fits
    Render(RenderArgs),

    /// List model presets (built-in and from config)
    Models,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
    /// Check the config file and report problems
    Validate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing. Logs go to stderr so stdout carries only the prompt.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render(args) => commands::render::run(args)?,
        Commands::Models => commands::models::run()?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path()?,
            ConfigAction::Init => commands::config_cmd::init()?,
            ConfigAction::Validate => commands::config_cmd::validate()?,
        },
    }

    Ok(())
}
