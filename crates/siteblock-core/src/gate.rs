//! Navigation interception and the block-page contract.
//!
//! Top-level navigations are checked before they commit; denied ones are
//! redirected to the block page with `reason`, `limit` and the original
//! `url` in the query string. Loaded pages can ask the same question through
//! [`NavigationGate::check`] in case a navigation slipped past (for example a
//! same-document navigation).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::decision::{self, BlockReason, Decision};
use crate::error::Result;
use crate::host::{TabHost, TabId, MAIN_FRAME};
use crate::store::UsageStore;
use crate::usage::local_day;

/// Answer to a `checkBlock` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckBlockResponse {
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<BlockReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl From<&Decision> for CheckBlockResponse {
    fn from(d: &Decision) -> Self {
        Self {
            blocked: d.is_blocked(),
            reason: d.reason(),
            limit: d.limit(),
        }
    }
}

/// Build the block-page URL for a denied navigation.
///
/// `limit` is only included for time-exceeded blocks. A query already on
/// `base` is extended rather than replaced.
pub fn block_page_url(base: &str, reason: BlockReason, limit: Option<u32>, original: &str) -> String {
    let sep = match base.find('?') {
        None => "?",
        Some(_) if base.ends_with('?') || base.ends_with('&') => "",
        Some(_) => "&",
    };
    let mut out = format!("{base}{sep}reason={}", reason.as_str());
    if let (BlockReason::TimeExceeded, Some(limit)) = (reason, limit) {
        out.push_str(&format!("&limit={limit}"));
    }
    out.push_str("&url=");
    out.push_str(&urlencoding::encode(original));
    out
}

/// What the block page displays, recovered from its own URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockNotice {
    pub reason: BlockReason,
    pub limit: Option<u32>,
    pub original_url: String,
}

impl BlockNotice {
    /// Parse a block-page URL. Unknown or missing reasons read as a full block.
    pub fn parse(block_url: &str) -> Option<Self> {
        let parsed = Url::parse(block_url).ok()?;
        let mut reason = BlockReason::FullyBlocked;
        let mut limit = None;
        let mut original_url = String::new();
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "reason" => reason = BlockReason::parse(&value).unwrap_or(BlockReason::FullyBlocked),
                "limit" => limit = value.parse().ok(),
                "url" => original_url = value.into_owned(),
                _ => {}
            }
        }
        Some(Self {
            reason,
            limit,
            original_url,
        })
    }

    pub fn title(&self) -> &'static str {
        match self.reason {
            BlockReason::TimeExceeded => "Time Limit Exceeded",
            BlockReason::FullyBlocked => "Website Blocked",
        }
    }

    pub fn message(&self) -> String {
        match self.reason {
            BlockReason::TimeExceeded => {
                let mut msg = String::from("You have reached your daily time limit for this website.");
                if let Some(limit) = self.limit {
                    msg.push_str(&format!(
                        "\nDaily Limit: {limit} minutes\nStatus: Limit reached for today\nThis website will be accessible again tomorrow."
                    ));
                }
                msg
            }
            BlockReason::FullyBlocked => {
                "This website has been blocked by your website blocker.".to_string()
            }
        }
    }
}

pub struct NavigationGate {
    store: Arc<dyn UsageStore>,
    host: Arc<dyn TabHost>,
    block_page: String,
}

impl NavigationGate {
    pub fn new(store: Arc<dyn UsageStore>, host: Arc<dyn TabHost>, block_page: impl Into<String>) -> Self {
        Self {
            store,
            host,
            block_page: block_page.into(),
        }
    }

    pub fn block_page(&self) -> &str {
        &self.block_page
    }

    async fn evaluate(&self, url: &str) -> Result<Decision> {
        decision::evaluate(self.store.as_ref(), url, local_day(&chrono::Utc::now())).await
    }

    fn redirect_for(&self, decision: &Decision, url: &str) -> Option<String> {
        decision
            .reason()
            .map(|reason| block_page_url(&self.block_page, reason, decision.limit(), url))
    }

    /// Handle a before-navigate event. Subframes are ignored. Returns the
    /// redirect target when the navigation was denied.
    pub async fn on_before_navigate(&self, tab_id: TabId, frame_id: u32, url: &str) -> Result<Option<String>> {
        if frame_id != MAIN_FRAME {
            return Ok(None);
        }
        let decision = self.evaluate(url).await?;
        let Some(target) = self.redirect_for(&decision, url) else {
            return Ok(None);
        };
        info!(tab_id, url, reason = ?decision.reason(), "navigation blocked");
        self.host.redirect(tab_id, &target).await?;
        Ok(Some(target))
    }

    /// Side-effect-free query used by loaded pages.
    pub async fn check(&self, url: &str) -> Result<CheckBlockResponse> {
        Ok(CheckBlockResponse::from(&self.evaluate(url).await?))
    }

    /// Where a loaded page at `page_url` should send itself, if it is blocked.
    pub async fn self_check(&self, page_url: &str) -> Result<Option<String>> {
        let decision = self.evaluate(page_url).await?;
        Ok(self.redirect_for(&decision, page_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostAction, MemoryHost};
    use crate::rules::{BlockRule, TimeLimitRule};
    use crate::store::{self, MemoryStore};
    use crate::usage::{UsageMap, UsageRecord};
    use chrono::Utc;

    const BASE: &str = "siteblock://blocked";

    async fn gate() -> (Arc<MemoryStore>, Arc<MemoryHost>, NavigationGate) {
        let store = Arc::new(MemoryStore::new());
        store::save_blocked_sites(store.as_ref(), &[BlockRule::new("example.com")])
            .await
            .unwrap();
        store::save_time_limits(store.as_ref(), &[TimeLimitRule::new("social.com", 10)])
            .await
            .unwrap();
        let host = Arc::new(MemoryHost::new());
        let gate = NavigationGate::new(store.clone(), host.clone(), BASE);
        (store, host, gate)
    }

    #[test]
    fn redirect_url_encodes_original() {
        let url = block_page_url(BASE, BlockReason::FullyBlocked, None, "https://example.com/a?b=c&d");
        assert_eq!(
            url,
            "siteblock://blocked?reason=fully-blocked&url=https%3A%2F%2Fexample.com%2Fa%3Fb%3Dc%26d"
        );
    }

    #[test]
    fn redirect_extends_existing_query() {
        let base = "chrome-extension://abc/blocked.html?theme=dark";
        let url = block_page_url(base, BlockReason::TimeExceeded, Some(5), "https://social.com");
        assert_eq!(
            url,
            "chrome-extension://abc/blocked.html?theme=dark&reason=time-exceeded&limit=5&url=https%3A%2F%2Fsocial.com"
        );
        assert_eq!(url.matches('?').count(), 1);

        let notice = BlockNotice::parse(&url).unwrap();
        assert_eq!(notice.reason, BlockReason::TimeExceeded);
        assert_eq!(notice.original_url, "https://social.com");

        let url = block_page_url("siteblock://blocked?", BlockReason::FullyBlocked, None, "https://x.com");
        assert!(url.starts_with("siteblock://blocked?reason=fully-blocked&url="));
    }

    #[test]
    fn limit_only_for_time_exceeded() {
        let url = block_page_url(BASE, BlockReason::TimeExceeded, Some(10), "https://social.com");
        assert!(url.starts_with("siteblock://blocked?reason=time-exceeded&limit=10&url="));
        let url = block_page_url(BASE, BlockReason::FullyBlocked, Some(10), "https://x.com");
        assert!(!url.contains("limit="));
    }

    #[test]
    fn notice_round_trips_through_redirect() {
        let original = "https://social.com/feed?x=1 2";
        let url = block_page_url(BASE, BlockReason::TimeExceeded, Some(10), original);
        let notice = BlockNotice::parse(&url).unwrap();
        assert_eq!(notice.reason, BlockReason::TimeExceeded);
        assert_eq!(notice.limit, Some(10));
        assert_eq!(notice.original_url, original);
        assert_eq!(notice.title(), "Time Limit Exceeded");
        assert!(notice.message().contains("10 minutes"));
    }

    #[tokio::test]
    async fn subframes_are_ignored() {
        let (_, host, gate) = gate().await;
        let out = gate
            .on_before_navigate(1, 7, "https://example.com")
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(host.take_actions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blocked_main_frame_is_redirected() {
        let (_, host, gate) = gate().await;
        let target = gate
            .on_before_navigate(4, MAIN_FRAME, "https://www.example.com/x")
            .await
            .unwrap()
            .unwrap();
        assert!(target.contains("reason=fully-blocked"));
        assert_eq!(
            host.take_actions().unwrap(),
            vec![HostAction::Redirect { tab_id: 4, url: target }]
        );
    }

    #[tokio::test]
    async fn time_limited_with_budget_is_allowed() {
        let (_, host, gate) = gate().await;
        assert!(gate
            .on_before_navigate(1, MAIN_FRAME, "https://social.com")
            .await
            .unwrap()
            .is_none());
        assert!(host.take_actions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn check_reports_exceeded_budget() {
        let (store, _, gate) = gate().await;
        let mut usage = UsageMap::new();
        usage.insert(
            "social.com".into(),
            UsageRecord::new(local_day(&Utc::now()), 700),
        );
        store::save_usage(store.as_ref(), &usage).await.unwrap();

        let resp = gate.check("https://social.com").await.unwrap();
        assert_eq!(
            resp,
            CheckBlockResponse {
                blocked: true,
                reason: Some(BlockReason::TimeExceeded),
                limit: Some(10)
            }
        );
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            serde_json::json!({"blocked": true, "reason": "time-exceeded", "limit": 10})
        );
        assert!(gate.self_check("https://social.com").await.unwrap().is_some());
        assert!(gate.self_check("https://rust-lang.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let (store, _, gate) = gate().await;
        store.set_offline(true);
        assert!(gate.check("https://example.com").await.is_err());
        assert!(gate
            .on_before_navigate(1, MAIN_FRAME, "https://example.com")
            .await
            .is_err());
    }
}
