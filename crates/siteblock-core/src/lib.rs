//! # SiteBlock Core Library
//!
//! The blocking-decision and time-tracking engine behind the SiteBlock
//! website blocker. The browser is reached only through traits, so the same
//! engine runs inside an extension bridge, the CLI, or tests.
//!
//! ## Architecture
//!
//! - **Matcher**: pure URL-to-pattern matching (domain or path rules)
//! - **Decision Engine**: classifies a URL against rules and today's usage
//! - **Time Tracker**: single foreground-tab session, periodic flushes, reload
//!   of tabs once a budget is spent
//! - **Navigation Gate**: redirects denied top-level navigations to the block page
//! - **Background**: event loop owning the tracker and gate
//! - **Storage**: async key-value [`UsageStore`] with memory and SQLite backends
//!
//! ## Key Components
//!
//! - [`decision::evaluate`]: blocking decision for one URL
//! - [`Tracker`]: active-time accounting
//! - [`NavigationGate`]: navigation interception and page self-checks
//! - [`Background`]: event dispatcher and run loop
//! - [`Config`]: application configuration

pub mod background;
pub mod config;
pub mod credentials;
pub mod decision;
pub mod error;
pub mod events;
pub mod gate;
pub mod host;
pub mod matcher;
pub mod rules;
pub mod store;
pub mod tracker;
pub mod usage;

pub use background::Background;
pub use config::Config;
pub use decision::{decide, evaluate, BlockReason, Decision, RuleSnapshot};
pub use error::{AuthError, ConfigError, CoreError, Result, RuleError, StoreError};
pub use events::{BrowserEvent, Inbound, Request};
pub use gate::{block_page_url, BlockNotice, CheckBlockResponse, NavigationGate};
pub use host::{MemoryHost, Tab, TabHost, TabId, WindowId};
pub use matcher::matches;
pub use rules::{BlockRule, TimeLimitRule, UsageSummary};
pub use store::{MemoryStore, SqliteStore, UsageStore};
pub use tracker::{Flush, Tracker, TrackerState, TrackingSession};
pub use usage::{fresh_for, UsageMap, UsageRecord};
