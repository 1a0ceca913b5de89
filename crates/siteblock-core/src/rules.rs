//! Block and time-limit rules, and the operations that edit the rule lists.
//!
//! Rule lists are only ever changed here. Adding requires a password to be
//! configured; removing requires the password itself.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials;
use crate::error::{Result, RuleError};
use crate::matcher;
use crate::store::{self, UsageStore};
use crate::usage::{fresh_for, UsageMap};

/// A pattern that fully blocks matching navigations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockRule(String);

impl BlockRule {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn pattern(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, url: &str) -> bool {
        matcher::matches(url, &self.0)
    }
}

impl std::fmt::Display for BlockRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pattern with a daily budget in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLimitRule {
    pub url: String,
    pub limit: u32,
}

impl TimeLimitRule {
    pub fn new(url: impl Into<String>, limit: u32) -> Self {
        Self {
            url: url.into(),
            limit,
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        matcher::matches(url, &self.url)
    }

    pub fn limit_secs(&self) -> u64 {
        u64::from(self.limit) * 60
    }
}

/// Canonical form of a user-entered site.
///
/// Drops the scheme and a leading `www.`. A path is kept only when there is
/// something after the first `/`; a single trailing `/` is removed.
pub fn normalize_site(input: &str) -> Result<String, RuleError> {
    let mut site = input.trim();
    site = site
        .strip_prefix("https://")
        .or_else(|| site.strip_prefix("http://"))
        .unwrap_or(site);
    site = matcher::strip_www(site);

    if site.contains('/') {
        let trimmed = site.strip_suffix('/').unwrap_or(site);
        if trimmed.split('/').nth(1).is_some_and(|p| !p.is_empty()) {
            return Ok(trimmed.to_string());
        }
    }

    let domain = site.split('/').next().unwrap_or_default();
    if domain.is_empty() {
        return Err(RuleError::EmptySite);
    }
    Ok(domain.to_string())
}

/// Append a block rule. Returns the normalized pattern that was stored.
pub async fn add_blocked_site(store: &dyn UsageStore, input: &str) -> Result<String> {
    credentials::require_password_set(store).await?;
    let site = normalize_site(input)?;

    let mut sites = store::load_blocked_sites(store).await?;
    if sites.iter().any(|s| s.pattern() == site) {
        return Err(RuleError::AlreadyBlocked(site).into());
    }
    sites.push(BlockRule::new(site.clone()));
    store::save_blocked_sites(store, &sites).await?;
    debug!(site = %site, "block rule added");
    Ok(site)
}

/// Append a time-limit rule. Returns the normalized pattern that was stored.
pub async fn add_time_limit(store: &dyn UsageStore, input: &str, minutes: i64) -> Result<String> {
    credentials::require_password_set(store).await?;
    let site = normalize_site(input)?;
    let limit = u32::try_from(minutes)
        .ok()
        .filter(|m| *m >= 1)
        .ok_or(RuleError::InvalidLimit(minutes))?;

    let mut rules = store::load_time_limits(store).await?;
    if rules.iter().any(|r| r.url == site) {
        return Err(RuleError::AlreadyTimeLimited(site).into());
    }
    rules.push(TimeLimitRule::new(site.clone(), limit));
    store::save_time_limits(store, &rules).await?;
    debug!(site = %site, limit, "time limit added");
    Ok(site)
}

pub async fn remove_blocked_site(store: &dyn UsageStore, site: &str, password: &str) -> Result<()> {
    credentials::verify_password(store, password).await?;
    let mut sites = store::load_blocked_sites(store).await?;
    let before = sites.len();
    sites.retain(|s| s.pattern() != site);
    if sites.len() == before {
        return Err(RuleError::NotFound(site.to_string()).into());
    }
    store::save_blocked_sites(store, &sites).await?;
    debug!(site, "block rule removed");
    Ok(())
}

pub async fn remove_time_limit(store: &dyn UsageStore, site: &str, password: &str) -> Result<()> {
    credentials::verify_password(store, password).await?;
    let mut rules = store::load_time_limits(store).await?;
    let before = rules.len();
    rules.retain(|r| r.url != site);
    if rules.len() == before {
        return Err(RuleError::NotFound(site.to_string()).into());
    }
    store::save_time_limits(store, &rules).await?;
    debug!(site, "time limit removed");
    Ok(())
}

/// Today's budget state for one time-limit rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub url: String,
    pub limit_minutes: u32,
    pub used_minutes: u64,
    pub remaining_minutes: u64,
}

pub fn summarize(rules: &[TimeLimitRule], usage: &UsageMap, today: NaiveDate) -> Vec<UsageSummary> {
    rules
        .iter()
        .map(|rule| {
            let used_minutes = fresh_for(usage.get(&rule.url), today) / 60;
            UsageSummary {
                url: rule.url.clone(),
                limit_minutes: rule.limit,
                used_minutes,
                remaining_minutes: u64::from(rule.limit).saturating_sub(used_minutes),
            }
        })
        .collect()
}

pub async fn usage_summary(store: &dyn UsageStore, today: NaiveDate) -> Result<Vec<UsageSummary>> {
    let rules = store::load_time_limits(store).await?;
    let usage = store::load_usage(store).await?;
    Ok(summarize(&rules, &usage, today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, CoreError};
    use crate::store::MemoryStore;
    use crate::usage::UsageRecord;

    async fn store_with_password() -> MemoryStore {
        let store = MemoryStore::new();
        credentials::set_password(&store, "hunter2", "hunter2", "pet", "Rex")
            .await
            .unwrap();
        store
    }

    #[test]
    fn normalize_strips_scheme_and_www() {
        assert_eq!(normalize_site("  https://www.example.com  ").unwrap(), "example.com");
        assert_eq!(normalize_site("http://example.com/").unwrap(), "example.com");
        assert_eq!(normalize_site("example.com").unwrap(), "example.com");
    }

    #[test]
    fn normalize_keeps_meaningful_paths() {
        assert_eq!(
            normalize_site("https://reddit.com/r/rust/").unwrap(),
            "reddit.com/r/rust"
        );
        assert_eq!(normalize_site("youtube.com/shorts").unwrap(), "youtube.com/shorts");
    }

    #[test]
    fn normalize_rejects_empty() {
        assert_eq!(normalize_site("   "), Err(RuleError::EmptySite));
        assert_eq!(normalize_site("https://"), Err(RuleError::EmptySite));
    }

    #[tokio::test]
    async fn adding_requires_password() {
        let store = MemoryStore::new();
        let err = add_blocked_site(&store, "example.com").await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::NoPassword)));
    }

    #[tokio::test]
    async fn duplicate_block_is_rejected() {
        let store = store_with_password().await;
        add_blocked_site(&store, "example.com").await.unwrap();
        let err = add_blocked_site(&store, "https://www.example.com/")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Rule(RuleError::AlreadyBlocked(_))));
        assert_eq!(store::load_blocked_sites(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_limits_are_rejected() {
        let store = store_with_password().await;
        for bad in [0, -3] {
            let err = add_time_limit(&store, "x.com", bad).await.unwrap_err();
            assert!(matches!(err, CoreError::Rule(RuleError::InvalidLimit(_))));
        }
        assert!(store::load_time_limits(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn removal_checks_password() {
        let store = store_with_password().await;
        add_blocked_site(&store, "example.com").await.unwrap();

        let err = remove_blocked_site(&store, "example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::IncorrectPassword)));

        remove_blocked_site(&store, "example.com", "hunter2")
            .await
            .unwrap();
        assert!(store::load_blocked_sites(&store).await.unwrap().is_empty());

        let err = remove_blocked_site(&store, "example.com", "hunter2")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Rule(RuleError::NotFound(_))));
    }

    #[test]
    fn summary_ignores_stale_usage() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let yesterday = today.pred_opt().unwrap();
        let rules = vec![TimeLimitRule::new("a.com", 10), TimeLimitRule::new("b.com", 5)];
        let mut usage = UsageMap::new();
        usage.insert("a.com".into(), UsageRecord::new(today, 190));
        usage.insert("b.com".into(), UsageRecord::new(yesterday, 9_999));

        let summary = summarize(&rules, &usage, today);
        assert_eq!(summary[0].used_minutes, 3);
        assert_eq!(summary[0].remaining_minutes, 7);
        assert_eq!(summary[1].used_minutes, 0);
        assert_eq!(summary[1].remaining_minutes, 5);
    }
}
