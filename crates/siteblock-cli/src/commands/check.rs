use chrono::Utc;
use siteblock_core::usage::local_day;
use siteblock_core::{block_page_url, decision, BlockNotice, CheckBlockResponse};

use super::{open_store, CliResult};

/// Print the `checkBlock` answer for `url`, then the redirect target and the
/// block page text when it is denied.
pub async fn run(url: &str) -> CliResult {
    let (config, store) = open_store()?;
    let decision = decision::evaluate(&store, url, local_day(&Utc::now())).await?;
    let response = CheckBlockResponse::from(&decision);
    println!("{}", serde_json::to_string(&response)?);

    if let Some(reason) = decision.reason() {
        let target = block_page_url(&config.block_page.url, reason, decision.limit(), url);
        let notice = BlockNotice {
            reason,
            limit: decision.limit(),
            original_url: url.to_string(),
        };
        println!("redirect: {target}");
        println!("{}", notice.title());
        println!("{}", notice.message());
    }
    Ok(())
}
