//! Browser tab/window seam.
//!
//! The tracker and gate never talk to a browser directly. They go through
//! [`TabHost`], which a real extension bridge implements. [`MemoryHost`] is an
//! in-memory tab table used by tests and by the CLI replay command.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

pub type TabId = u32;
pub type WindowId = u32;

/// Top-level frame id for navigation events.
pub const MAIN_FRAME: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    #[serde(default)]
    pub window_id: WindowId,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

#[async_trait]
pub trait TabHost: Send + Sync {
    async fn tab(&self, tab_id: TabId) -> Result<Option<Tab>>;

    /// The active tab of `window_id`, if the window exists.
    async fn active_tab(&self, window_id: WindowId) -> Result<Option<Tab>>;

    async fn query_tabs(&self) -> Result<Vec<Tab>>;

    async fn reload(&self, tab_id: TabId) -> Result<()>;

    /// Point the tab at a different URL.
    async fn redirect(&self, tab_id: TabId, url: &str) -> Result<()>;
}

/// Something a [`MemoryHost`] was asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostAction {
    Reload { tab_id: TabId },
    Redirect { tab_id: TabId, url: String },
}

#[derive(Debug, Default)]
struct TabTable {
    tabs: BTreeMap<TabId, Tab>,
    actions: Vec<HostAction>,
}

/// In-memory tab table that records reloads and redirects.
#[derive(Debug, Default)]
pub struct MemoryHost {
    inner: Mutex<TabTable>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut TabTable) -> T) -> Result<T> {
        let mut table = self
            .inner
            .lock()
            .map_err(|_| CoreError::Host("tab table lock poisoned".into()))?;
        Ok(f(&mut table))
    }

    /// Insert or replace a tab. An active tab deactivates its window siblings.
    pub fn upsert(&self, tab: Tab) -> Result<()> {
        self.with(|t| {
            if tab.active {
                for other in t.tabs.values_mut() {
                    if other.window_id == tab.window_id {
                        other.active = false;
                    }
                }
            }
            t.tabs.insert(tab.id, tab);
        })
    }

    pub fn activate(&self, tab_id: TabId) -> Result<()> {
        let tab = self.with(|t| t.tabs.get(&tab_id).cloned())?;
        match tab {
            Some(tab) => self.upsert(Tab { active: true, ..tab }),
            None => Err(CoreError::Host(format!("no tab {tab_id}"))),
        }
    }

    pub fn set_url(&self, tab_id: TabId, url: &str) -> Result<()> {
        self.with(|t| {
            if let Some(tab) = t.tabs.get_mut(&tab_id) {
                tab.url = Some(url.to_string());
            }
        })
    }

    pub fn remove(&self, tab_id: TabId) -> Result<()> {
        self.with(|t| {
            t.tabs.remove(&tab_id);
        })
    }

    /// Drain the recorded reloads and redirects.
    pub fn take_actions(&self) -> Result<Vec<HostAction>> {
        self.with(|t| std::mem::take(&mut t.actions))
    }
}

#[async_trait]
impl TabHost for MemoryHost {
    async fn tab(&self, tab_id: TabId) -> Result<Option<Tab>> {
        self.with(|t| t.tabs.get(&tab_id).cloned())
    }

    async fn active_tab(&self, window_id: WindowId) -> Result<Option<Tab>> {
        self.with(|t| {
            t.tabs
                .values()
                .find(|tab| tab.window_id == window_id && tab.active)
                .cloned()
        })
    }

    async fn query_tabs(&self) -> Result<Vec<Tab>> {
        self.with(|t| t.tabs.values().cloned().collect())
    }

    async fn reload(&self, tab_id: TabId) -> Result<()> {
        self.with(|t| t.actions.push(HostAction::Reload { tab_id }))
    }

    async fn redirect(&self, tab_id: TabId, url: &str) -> Result<()> {
        self.with(|t| {
            if let Some(tab) = t.tabs.get_mut(&tab_id) {
                tab.url = Some(url.to_string());
            }
            t.actions.push(HostAction::Redirect {
                tab_id,
                url: url.to_string(),
            });
        })
    }
}
