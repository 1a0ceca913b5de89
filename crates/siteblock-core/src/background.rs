//! Event dispatcher that owns the tracker and the navigation gate.
//!
//! All browser events and page requests go through one [`Background`], one at
//! a time, so the tracker's session map has a single writer. [`Background::run`]
//! drives it from a channel alongside the periodic flush timer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::events::{BrowserEvent, Inbound, Request};
use crate::gate::{CheckBlockResponse, NavigationGate};
use crate::host::TabHost;
use crate::store::UsageStore;
use crate::tracker::{Flush, Tracker};

pub struct Background {
    host: Arc<dyn TabHost>,
    tracker: Tracker,
    gate: NavigationGate,
    flush_interval: Duration,
}

impl Background {
    pub fn new(store: Arc<dyn UsageStore>, host: Arc<dyn TabHost>, config: &Config) -> Self {
        Self {
            tracker: Tracker::new(store.clone(), host.clone()),
            gate: NavigationGate::new(store, host.clone(), config.block_page.url.clone()),
            host,
            flush_interval: config.flush_interval(),
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn gate(&self) -> &NavigationGate {
        &self.gate
    }

    /// Apply one browser event at wall-clock `now`.
    pub async fn handle(&mut self, event: BrowserEvent, now: DateTime<Utc>) -> Result<()> {
        match event {
            BrowserEvent::TabActivated { tab_id } => {
                match self.host.tab(tab_id).await?.and_then(|t| t.url) {
                    Some(url) => {
                        self.tracker.start(tab_id, &url, now).await?;
                    }
                    None => {
                        self.tracker.stop_all(now).await;
                    }
                }
            }
            BrowserEvent::TabUpdated { tab_id, url: Some(url) } => {
                // Background tabs accrue nothing; an unknown tab is taken at its word.
                let active = self
                    .host
                    .tab(tab_id)
                    .await?
                    .map_or(true, |t| t.active);
                if active {
                    self.tracker.start(tab_id, &url, now).await?;
                } else {
                    debug!(tab_id, "ignoring url change in background tab");
                }
            }
            BrowserEvent::TabUpdated { url: None, .. } => {}
            BrowserEvent::WindowFocusChanged { window_id: None } => {
                self.tracker.stop_all(now).await;
            }
            BrowserEvent::WindowFocusChanged {
                window_id: Some(window_id),
            } => {
                let active = self.host.active_tab(window_id).await?;
                match active.and_then(|t| t.url.map(|url| (t.id, url))) {
                    Some((tab_id, url)) => {
                        self.tracker.start(tab_id, &url, now).await?;
                    }
                    None => {
                        self.tracker.stop_all(now).await;
                    }
                }
            }
            BrowserEvent::TabRemoved { tab_id } => {
                self.tracker.stop_tab(tab_id, now).await;
            }
            BrowserEvent::BeforeNavigate {
                tab_id,
                frame_id,
                url,
            } => {
                self.gate.on_before_navigate(tab_id, frame_id, &url).await?;
            }
            BrowserEvent::Tick => {
                self.tracker.tick(now).await;
            }
        }
        Ok(())
    }

    /// Flush and close every open session.
    pub async fn shutdown(&mut self, now: DateTime<Utc>) -> Vec<Flush> {
        self.tracker.stop_all(now).await
    }

    pub async fn handle_request(&self, request: Request) -> Result<CheckBlockResponse> {
        match request {
            Request::CheckBlock { url } => self.gate.check(&url).await,
        }
    }

    /// Process inbound traffic until the channel closes, flushing tracked time
    /// every `flush_interval`. Open sessions are flushed on exit.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Inbound>) -> Self {
        let mut flush_timer = interval(self.flush_interval);
        flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        flush_timer.tick().await;

        info!(
            flush_interval_secs = self.flush_interval.as_secs(),
            "background loop started"
        );

        loop {
            tokio::select! {
                biased;

                // Polled first so a steady event stream cannot starve it.
                _ = flush_timer.tick() => {
                    self.tracker.tick(Utc::now()).await;
                }

                inbound = rx.recv() => {
                    match inbound {
                        Some(Inbound::Event(event)) => {
                            if let Err(e) = self.handle(event.clone(), Utc::now()).await {
                                warn!(?event, error = %e, "event handling failed");
                            }
                        }
                        Some(Inbound::Request { request, reply }) => {
                            let result = self.handle_request(request).await;
                            if reply.send(result).is_err() {
                                debug!("requester went away before reply");
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        self.shutdown(Utc::now()).await;
        info!("background loop stopped");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryHost, Tab};
    use crate::rules::TimeLimitRule;
    use crate::store::{self, MemoryStore};
    use crate::tracker::TrackerState;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    async fn setup() -> (Arc<MemoryStore>, Arc<MemoryHost>, Background) {
        let store = Arc::new(MemoryStore::new());
        store::save_time_limits(store.as_ref(), &[TimeLimitRule::new("social.com", 10)])
            .await
            .unwrap();
        let host = Arc::new(MemoryHost::new());
        for (id, window_id, url, active) in [
            (1, 1, "https://social.com", true),
            (2, 1, "https://docs.rs", false),
            (3, 2, "https://social.com/x", true),
        ] {
            host.upsert(Tab {
                id,
                window_id,
                url: Some(url.into()),
                active,
            })
            .unwrap();
        }
        let bg = Background::new(store.clone(), host.clone(), &Config::default());
        (store, host, bg)
    }

    async fn used(store: &MemoryStore) -> u64 {
        store::load_usage(store)
            .await
            .unwrap()
            .get("social.com")
            .map(|r| r.seconds)
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn switching_tabs_moves_tracking() {
        let (store, host, mut bg) = setup().await;
        bg.handle(BrowserEvent::TabActivated { tab_id: 1 }, t(0)).await.unwrap();
        assert_eq!(bg.tracker().state(), TrackerState::Tracking);

        host.activate(2).unwrap();
        bg.handle(BrowserEvent::TabActivated { tab_id: 2 }, t(12)).await.unwrap();
        assert_eq!(bg.tracker().state(), TrackerState::Idle);
        assert_eq!(used(&store).await, 12);
    }

    #[tokio::test]
    async fn losing_window_focus_stops_tracking() {
        let (store, _, mut bg) = setup().await;
        bg.handle(BrowserEvent::WindowFocusChanged { window_id: Some(2) }, t(0))
            .await
            .unwrap();
        assert_eq!(bg.tracker().active_session().unwrap().tab_id, 3);

        bg.handle(BrowserEvent::WindowFocusChanged { window_id: None }, t(8))
            .await
            .unwrap();
        assert_eq!(bg.tracker().state(), TrackerState::Idle);
        assert_eq!(used(&store).await, 8);
    }

    #[tokio::test]
    async fn background_tab_url_change_is_ignored() {
        let (_, _, mut bg) = setup().await;
        bg.handle(
            BrowserEvent::TabUpdated {
                tab_id: 2,
                url: Some("https://social.com".into()),
            },
            t(0),
        )
        .await
        .unwrap();
        assert_eq!(bg.tracker().state(), TrackerState::Idle);
    }

    #[tokio::test]
    async fn closing_tracked_tab_flushes() {
        let (store, _, mut bg) = setup().await;
        bg.handle(BrowserEvent::TabActivated { tab_id: 1 }, t(0)).await.unwrap();
        bg.handle(BrowserEvent::Tick, t(5)).await.unwrap();
        bg.handle(BrowserEvent::TabRemoved { tab_id: 1 }, t(7)).await.unwrap();
        assert_eq!(used(&store).await, 7);
        assert_eq!(bg.tracker().state(), TrackerState::Idle);
    }

    #[tokio::test]
    async fn run_answers_requests_and_stops_on_close() {
        let (_, _, bg) = setup().await;
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(bg.run(rx));

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        tx.send(Inbound::Request {
            request: Request::CheckBlock {
                url: "https://social.com".into(),
            },
            reply: reply_tx,
        })
        .await
        .unwrap();
        let resp = reply_rx.await.unwrap().unwrap();
        assert!(!resp.blocked);

        drop(tx);
        let bg = handle.await.unwrap();
        assert_eq!(bg.tracker().state(), TrackerState::Idle);
    }

    async fn spawn_fast_flush() -> (
        Arc<MemoryStore>,
        mpsc::Sender<Inbound>,
        tokio::task::JoinHandle<Background>,
    ) {
        let (store, host, _) = setup().await;
        let mut config = Config::default();
        config.tracking.flush_interval_secs = 1;
        let bg = Background::new(store.clone(), host, &config);
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(bg.run(rx));
        (store, tx, handle)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_flushes_on_timer_and_on_close() {
        let (store, tx, handle) = spawn_fast_flush().await;
        tx.send(BrowserEvent::TabActivated { tab_id: 1 }.into())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let while_running = used(&store).await;
        assert!(while_running >= 1, "no periodic flush, got {while_running}s");

        drop(tx);
        let bg = handle.await.unwrap();
        assert_eq!(bg.tracker().state(), TrackerState::Idle);
        let after_close = used(&store).await;
        assert!(after_close >= 2, "got {after_close}s");
        assert!(after_close >= while_running);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn steady_event_stream_does_not_starve_flush() {
        let (store, tx, handle) = spawn_fast_flush().await;
        tx.send(BrowserEvent::TabActivated { tab_id: 1 }.into())
            .await
            .unwrap();

        let noise = tx.clone();
        let producer = tokio::spawn(async move {
            let until = tokio::time::Instant::now() + Duration::from_millis(2500);
            while tokio::time::Instant::now() < until {
                // Background-tab updates are ignored by the tracker.
                let event = BrowserEvent::TabUpdated {
                    tab_id: 2,
                    url: Some("https://docs.rs".into()),
                };
                if noise.send(event.into()).await.is_err() {
                    break;
                }
            }
        });
        producer.await.unwrap();

        assert!(used(&store).await >= 1);
        drop(tx);
        handle.await.unwrap();
    }
}
