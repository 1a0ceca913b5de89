use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "siteblock", version, about = "SiteBlock CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fully blocked sites
    Block {
        #[command(subcommand)]
        action: commands::block::BlockAction,
    },
    /// Daily time limits
    Limit {
        #[command(subcommand)]
        action: commands::limit::LimitAction,
    },
    /// Check whether a URL would be blocked right now
    Check {
        /// URL to check
        url: String,
    },
    /// Password and security question management
    Password {
        #[command(subcommand)]
        action: commands::password::PasswordAction,
    },
    /// Clear all stored rules, usage and credentials
    Reset {
        /// Confirm clearing everything
        #[arg(long)]
        yes: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Feed a recorded browser session through the tracker and gate
    Replay {
        /// JSON script of tabs and timestamped events
        file: std::path::PathBuf,
        /// Run against an in-memory copy of the store
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SITEBLOCK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Block { action } => commands::block::run(action).await,
        Commands::Limit { action } => commands::limit::run(action).await,
        Commands::Check { url } => commands::check::run(&url).await,
        Commands::Password { action } => commands::password::run(action).await,
        Commands::Reset { yes } => commands::reset(yes).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Replay { file, dry_run } => commands::replay::run(&file, dry_run).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
