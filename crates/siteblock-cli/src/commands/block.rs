use clap::Subcommand;
use siteblock_core::{rules, store};

use super::{open_store, CliResult};

#[derive(Subcommand)]
pub enum BlockAction {
    /// Block a domain or path (e.g. "example.com", "youtube.com/shorts")
    Add {
        /// Site or URL to block
        site: String,
    },
    /// Unblock a site (requires the password)
    Remove {
        site: String,
        #[arg(long)]
        password: String,
    },
    /// List blocked sites
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(action: BlockAction) -> CliResult {
    let (_, store) = open_store()?;
    match action {
        BlockAction::Add { site } => {
            let site = rules::add_blocked_site(&store, &site).await?;
            println!("blocked: {site}");
        }
        BlockAction::Remove { site, password } => {
            rules::remove_blocked_site(&store, &site, &password).await?;
            println!("unblocked: {site}");
        }
        BlockAction::List { json } => {
            let sites = store::load_blocked_sites(&store).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sites)?);
            } else if sites.is_empty() {
                println!("No blocked websites");
            } else {
                for site in &sites {
                    println!("{site}");
                }
            }
        }
    }
    Ok(())
}
