//! Replays a recorded browser session.
//!
//! Script format:
//!
//! ```json
//! {
//!   "tabs": [{ "id": 1, "windowId": 1, "url": "https://social.com", "active": true }],
//!   "steps": [
//!     { "at": "2026-10-15T09:00:00Z", "event": { "type": "tabActivated", "tabId": 1 } },
//!     { "at": "2026-10-15T09:00:30Z", "tab": { "id": 2, "windowId": 1, "url": "https://docs.rs", "active": true },
//!       "event": { "type": "tabActivated", "tabId": 2 } }
//!   ]
//! }
//! ```
//!
//! A step's `tab` is applied to the tab table before its event is handled.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siteblock_core::host::HostAction;
use siteblock_core::store::{self, UsageStore};
use siteblock_core::usage::local_day;
use siteblock_core::{rules, Background, BrowserEvent, MemoryHost, MemoryStore, Tab, UsageSummary};
use tracing::info;

use super::{open_store, CliResult};

#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default)]
    tabs: Vec<Tab>,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    at: DateTime<Utc>,
    #[serde(default)]
    tab: Option<Tab>,
    #[serde(default)]
    event: Option<BrowserEvent>,
}

#[derive(Debug, Serialize)]
struct Report {
    steps: usize,
    actions: Vec<HostAction>,
    usage: Vec<UsageSummary>,
}

async fn copy_rules(from: &dyn UsageStore, to: &dyn UsageStore) -> siteblock_core::Result<()> {
    store::save_blocked_sites(to, &store::load_blocked_sites(from).await?).await?;
    store::save_time_limits(to, &store::load_time_limits(from).await?).await?;
    store::save_usage(to, &store::load_usage(from).await?).await?;
    Ok(())
}

pub async fn run(path: &Path, dry_run: bool) -> CliResult {
    let content = std::fs::read_to_string(path)?;
    let script: Script = serde_json::from_str(&content)?;

    let (config, persistent) = open_store()?;
    let store: Arc<dyn UsageStore> = if dry_run {
        let memory: Arc<dyn UsageStore> = Arc::new(MemoryStore::new());
        copy_rules(&persistent, memory.as_ref()).await?;
        memory
    } else {
        Arc::new(persistent)
    };

    let host = Arc::new(MemoryHost::new());
    for tab in script.tabs {
        host.upsert(tab)?;
    }

    let mut background = Background::new(store.clone(), host.clone(), &config);
    let mut last = Utc::now();
    for step in &script.steps {
        if let Some(tab) = &step.tab {
            host.upsert(tab.clone())?;
        }
        if let Some(event) = &step.event {
            background.handle(event.clone(), step.at).await?;
            if let BrowserEvent::TabRemoved { tab_id } = event {
                host.remove(*tab_id)?;
            }
        }
        last = step.at;
    }
    background.shutdown(last).await;
    info!(steps = script.steps.len(), dry_run, "replay finished");

    let report = Report {
        steps: script.steps.len(),
        actions: host.take_actions()?,
        usage: rules::usage_summary(store.as_ref(), local_day(&last)).await?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
