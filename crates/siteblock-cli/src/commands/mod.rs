pub mod block;
pub mod check;
pub mod config;
pub mod limit;
pub mod password;
pub mod replay;

use siteblock_core::{credentials, Config, SqliteStore};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the persistent store named by the current configuration.
pub fn open_store() -> Result<(Config, SqliteStore), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = SqliteStore::open(&config.database_path()?)?;
    Ok((config, store))
}

pub async fn reset(yes: bool) -> CliResult {
    if !yes {
        return Err("refusing to clear all data without --yes".into());
    }
    let (_, store) = open_store()?;
    credentials::reset_all(&store).await?;
    println!("all data cleared");
    Ok(())
}
