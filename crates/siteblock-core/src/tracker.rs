//! Active-time tracking for time-limited sites.
//!
//! The tracker is a wall-clock state machine with no internal timer: every
//! operation takes `now`, and the caller drives [`Tracker::tick`] on a fixed
//! interval.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Tracking -> (tick: flush, stay Tracking) -> Idle
//! ```
//!
//! Only the foreground tab accrues time, so at most one session exists.
//! Starting a session always ends the previous one first.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::decision::{self, Decision};
use crate::error::Result;
use crate::host::{TabHost, TabId};
use crate::matcher;
use crate::store::{self, UsageStore};
use crate::usage::{add_usage, local_day};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerState {
    Idle,
    Tracking,
}

/// An in-progress accrual interval for one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSession {
    pub tab_id: TabId,
    pub url: String,
    /// The matched time-limit rule's `url`.
    pub site_key: String,
    pub started_at: DateTime<Utc>,
}

impl TrackingSession {
    /// Whole seconds elapsed since `started_at`, never negative.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.started_at).num_seconds().max(0) as u64
    }
}

/// Result of writing elapsed time to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    pub site_key: String,
    pub seconds: u64,
    /// Today's total for `site_key` after this flush.
    pub total: u64,
    /// Tabs reloaded because the budget is now spent.
    pub reloaded: Vec<TabId>,
}

pub struct Tracker {
    store: Arc<dyn UsageStore>,
    host: Arc<dyn TabHost>,
    sessions: HashMap<TabId, TrackingSession>,
}

impl Tracker {
    pub fn new(store: Arc<dyn UsageStore>, host: Arc<dyn TabHost>) -> Self {
        Self {
            store,
            host,
            sessions: HashMap::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TrackerState {
        if self.sessions.is_empty() {
            TrackerState::Idle
        } else {
            TrackerState::Tracking
        }
    }

    pub fn session(&self, tab_id: TabId) -> Option<&TrackingSession> {
        self.sessions.get(&tab_id)
    }

    /// The single active session, if any.
    pub fn active_session(&self) -> Option<&TrackingSession> {
        self.sessions.values().next()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// End any current session, then begin tracking `tab_id` if `url` is
    /// under a time limit with budget left.
    pub async fn start(
        &mut self,
        tab_id: TabId,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<&TrackingSession>> {
        self.stop_all(now).await;

        let decision = decision::evaluate(self.store.as_ref(), url, local_day(&now)).await?;
        let Decision::TimeLimitedActive { site_key, .. } = decision else {
            return Ok(None);
        };

        debug!(tab_id, site = %site_key, "tracking started");
        self.sessions.insert(
            tab_id,
            TrackingSession {
                tab_id,
                url: url.to_string(),
                site_key,
                started_at: now,
            },
        );
        Ok(self.sessions.get(&tab_id))
    }

    /// End every session, flushing its elapsed time.
    pub async fn stop_all(&mut self, now: DateTime<Utc>) -> Vec<Flush> {
        let sessions: Vec<TrackingSession> = self.sessions.drain().map(|(_, s)| s).collect();
        let mut flushed = Vec::new();
        for session in sessions {
            if let Some(f) = self.finish(session, now).await {
                flushed.push(f);
            }
        }
        flushed
    }

    /// End the session for a closed tab, if it has one.
    pub async fn stop_tab(&mut self, tab_id: TabId, now: DateTime<Utc>) -> Option<Flush> {
        let session = self.sessions.remove(&tab_id)?;
        self.finish(session, now).await
    }

    /// Periodic flush. Sessions stay open; each start time advances by exactly
    /// the seconds written so sub-second remainders carry into the next tick.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Vec<Flush> {
        let due: Vec<(TabId, TrackingSession, u64)> = self
            .sessions
            .values()
            .filter_map(|s| {
                let secs = s.elapsed_secs(now);
                (secs > 0).then(|| (s.tab_id, s.clone(), secs))
            })
            .collect();

        let mut flushed = Vec::new();
        for (tab_id, session, secs) in due {
            match self.flush(&session, secs, now).await {
                Ok(Some(f)) => flushed.push(f),
                Ok(None) => {}
                Err(e) => warn!(tab_id, site = %session.site_key, error = %e, "periodic flush failed"),
            }
            if let Some(s) = self.sessions.get_mut(&tab_id) {
                s.started_at += Duration::seconds(secs as i64);
            }
        }
        flushed
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn finish(&self, session: TrackingSession, now: DateTime<Utc>) -> Option<Flush> {
        let secs = session.elapsed_secs(now);
        debug!(tab_id = session.tab_id, site = %session.site_key, secs, "tracking stopped");
        if secs == 0 {
            return None;
        }
        match self.flush(&session, secs, now).await {
            Ok(f) => f,
            Err(e) => {
                warn!(tab_id = session.tab_id, site = %session.site_key, error = %e, "flush failed");
                None
            }
        }
    }

    /// Add `secs` to the session's usage record, then reload matching tabs if
    /// the budget is now spent.
    async fn flush(
        &self,
        session: &TrackingSession,
        secs: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<Flush>> {
        let store = self.store.as_ref();
        let today = local_day(&now);

        let rules = store::load_time_limits(store).await?;
        if !rules.iter().any(|r| r.url == session.site_key) {
            debug!(site = %session.site_key, secs, "rule removed, dropping tracked time");
            return Ok(None);
        }

        let mut usage = store::load_usage(store).await?;
        let total = add_usage(&mut usage, &session.site_key, today, secs);
        store::save_usage(store, &usage).await?;
        debug!(site = %session.site_key, secs, total, "usage flushed");

        let mut reloaded = Vec::new();
        if let Decision::TimeExceeded { limit } =
            decision::evaluate(store, &session.url, today).await?
        {
            for tab in self.host.query_tabs().await? {
                let Some(url) = tab.url.as_deref() else {
                    continue;
                };
                if matcher::matches(url, &session.site_key) {
                    self.host.reload(tab.id).await?;
                    reloaded.push(tab.id);
                }
            }
            info!(site = %session.site_key, limit, tabs = reloaded.len(), "time limit reached, reloading tabs");
        }

        Ok(Some(Flush {
            site_key: session.site_key.clone(),
            seconds: secs,
            total,
            reloaded,
        }))
    }
}
