//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use inkpost_core::config::{self, BACKEND_URL_ENV};
use inkpost_core::logging;

mod commands;

#[derive(Parser)]
#[command(name = "inkpost")]
#[command(version = "0.1")]
#[command(about = "Read the blog and sign in from your terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides [backend] base_url)
    #[arg(long, global = true, env = BACKEND_URL_ENV, value_name = "URL")]
    backend_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sign in with Google
    Login,
    /// Sign out (remove the stored session)
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show a post and the recent articles
    Post {
        /// Slug of the post to show
        #[arg(value_name = "SLUG")]
        slug: String,
    },
    /// List recent posts
    Recent,
    /// About this blog
    About,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults (for xtask)
    Generate,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = config::Config::load().context("load config")?;

    if let Some(url) = cli.backend_url.as_deref() {
        config.backend.override_url = Some(url.to_string());
    }

    let _log_guard = match logging::init(&config.log, &config::paths::logs_dir()) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    match cli.command {
        Commands::Login => commands::auth::login(&config).await,
        Commands::Logout => commands::auth::logout(),
        Commands::Whoami => commands::auth::whoami(),
        Commands::Post { slug } => commands::posts::show(&config, &slug).await,
        Commands::Recent => commands::posts::recent(&config).await,
        Commands::About => {
            commands::about::show();
            Ok(())
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
        },
    }
}
