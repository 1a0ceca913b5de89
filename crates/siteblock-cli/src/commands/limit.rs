use chrono::Utc;
use clap::Subcommand;
use siteblock_core::rules;
use siteblock_core::usage::local_day;

use super::{open_store, CliResult};

#[derive(Subcommand)]
pub enum LimitAction {
    /// Give a site a daily time budget
    Add {
        site: String,
        /// Minutes per day
        #[arg(allow_negative_numbers = true)]
        minutes: i64,
    },
    /// Remove a site's time limit (requires the password)
    Remove {
        site: String,
        #[arg(long)]
        password: String,
    },
    /// List time limits with today's usage
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(action: LimitAction) -> CliResult {
    let (_, store) = open_store()?;
    match action {
        LimitAction::Add { site, minutes } => {
            let site = rules::add_time_limit(&store, &site, minutes).await?;
            println!("limited: {site} ({minutes} min/day)");
        }
        LimitAction::Remove { site, password } => {
            rules::remove_time_limit(&store, &site, &password).await?;
            println!("limit removed: {site}");
        }
        LimitAction::List { json } => {
            let summary = rules::usage_summary(&store, local_day(&Utc::now())).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else if summary.is_empty() {
                println!("No time-limited websites");
            } else {
                for s in &summary {
                    println!(
                        "{}: {} min limit, {} min used, {} min left",
                        s.url, s.limit_minutes, s.used_minutes, s.remaining_minutes
                    );
                }
            }
        }
    }
    Ok(())
}
