//! Blocking decisions.
//!
//! Evaluation is a pure read: load a [`RuleSnapshot`] from the store, then
//! [`decide`] against it. Full blocks are checked before time limits, and
//! within each list the first matching rule wins.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rules::{BlockRule, TimeLimitRule};
use crate::store::{self, UsageStore, BLOCKED_SITES, TIME_LIMITED_SITES, TIME_USAGE};
use crate::usage::{fresh_for, UsageMap};

/// Outcome of evaluating one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    FullyBlocked,
    TimeExceeded { limit: u32 },
    /// Budget left; the caller should start tracking against `site_key`.
    TimeLimitedActive { site_key: String, limit: u32 },
    Allowed,
}

/// Why a navigation was denied. Serialized as the block page's `reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockReason {
    FullyBlocked,
    TimeExceeded,
}

impl BlockReason {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockReason::FullyBlocked => "fully-blocked",
            BlockReason::TimeExceeded => "time-exceeded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fully-blocked" => Some(BlockReason::FullyBlocked),
            "time-exceeded" => Some(BlockReason::TimeExceeded),
            _ => None,
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Decision {
    pub fn is_blocked(&self) -> bool {
        self.reason().is_some()
    }

    pub fn reason(&self) -> Option<BlockReason> {
        match self {
            Decision::FullyBlocked => Some(BlockReason::FullyBlocked),
            Decision::TimeExceeded { .. } => Some(BlockReason::TimeExceeded),
            _ => None,
        }
    }

    /// Daily limit, for time-exceeded decisions only.
    pub fn limit(&self) -> Option<u32> {
        match self {
            Decision::TimeExceeded { limit } => Some(*limit),
            _ => None,
        }
    }
}

/// Everything [`decide`] reads, captured at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSnapshot {
    pub blocked: Vec<BlockRule>,
    pub time_limits: Vec<TimeLimitRule>,
    pub usage: UsageMap,
}

impl RuleSnapshot {
    /// Reads all three keys in a single store call.
    pub async fn load(store: &dyn UsageStore) -> Result<Self> {
        let mut values = store
            .get(&[BLOCKED_SITES, TIME_LIMITED_SITES, TIME_USAGE])
            .await?;
        Ok(Self {
            blocked: store::decode(&mut values, BLOCKED_SITES)?,
            time_limits: store::decode(&mut values, TIME_LIMITED_SITES)?,
            usage: store::decode(&mut values, TIME_USAGE)?,
        })
    }
}

pub fn decide(url: &str, snapshot: &RuleSnapshot, today: NaiveDate) -> Decision {
    if snapshot.blocked.iter().any(|rule| rule.matches(url)) {
        return Decision::FullyBlocked;
    }

    let Some(rule) = snapshot.time_limits.iter().find(|rule| rule.matches(url)) else {
        return Decision::Allowed;
    };

    let used = fresh_for(snapshot.usage.get(&rule.url), today);
    if used >= rule.limit_secs() {
        Decision::TimeExceeded { limit: rule.limit }
    } else {
        Decision::TimeLimitedActive {
            site_key: rule.url.clone(),
            limit: rule.limit,
        }
    }
}

/// Load current state and decide. Store failures propagate.
pub async fn evaluate(store: &dyn UsageStore, url: &str, today: NaiveDate) -> Result<Decision> {
    let snapshot = RuleSnapshot::load(store).await?;
    Ok(decide(url, &snapshot, today))
}
