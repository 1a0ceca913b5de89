//! Async key-value persistence for rules, usage and credentials.
//!
//! The core only needs `get`/`set`/`clear` over JSON values. Two backends are
//! provided: [`MemoryStore`] for tests and embedding, and [`SqliteStore`] for
//! the CLI. Typed access to the well-known keys lives in the free functions
//! below so every backend shares the same decoding rules.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::rules::{BlockRule, TimeLimitRule};
use crate::usage::UsageMap;

pub const BLOCKED_SITES: &str = "blockedSites";
pub const TIME_LIMITED_SITES: &str = "timeLimitedSites";
pub const TIME_USAGE: &str = "timeUsage";
pub const PASSWORD_HASH: &str = "passwordHash";
pub const SECURITY_QUESTION: &str = "securityQuestion";
pub const SECURITY_ANSWER_HASH: &str = "securityAnswerHash";

/// Storage backend consumed by the core.
///
/// `get` returns only the keys that exist. `set` merges the given entries
/// into the store; keys not mentioned are left untouched.
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    async fn set(&self, values: Map<String, Value>) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}

/// Decodes `key` out of a `get` result, treating a missing or null value as
/// the type's default.
pub(crate) fn decode<T: DeserializeOwned + Default>(
    values: &mut Map<String, Value>,
    key: &str,
) -> Result<T, StoreError> {
    match values.remove(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v).map_err(|e| StoreError::Malformed {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

async fn load<T: DeserializeOwned + Default>(store: &dyn UsageStore, key: &str) -> Result<T> {
    let mut values = store.get(&[key]).await?;
    Ok(decode(&mut values, key)?)
}

async fn save<T: Serialize + ?Sized>(store: &dyn UsageStore, key: &str, value: &T) -> Result<()> {
    let mut values = Map::new();
    values.insert(key.to_string(), serde_json::to_value(value)?);
    store.set(values).await?;
    Ok(())
}

pub async fn load_blocked_sites(store: &dyn UsageStore) -> Result<Vec<BlockRule>> {
    load(store, BLOCKED_SITES).await
}

pub async fn save_blocked_sites(store: &dyn UsageStore, sites: &[BlockRule]) -> Result<()> {
    save(store, BLOCKED_SITES, sites).await
}

pub async fn load_time_limits(store: &dyn UsageStore) -> Result<Vec<TimeLimitRule>> {
    load(store, TIME_LIMITED_SITES).await
}

pub async fn save_time_limits(store: &dyn UsageStore, rules: &[TimeLimitRule]) -> Result<()> {
    save(store, TIME_LIMITED_SITES, rules).await
}

pub async fn load_usage(store: &dyn UsageStore) -> Result<UsageMap> {
    load(store, TIME_USAGE).await
}

pub async fn save_usage(store: &dyn UsageStore, usage: &UsageMap) -> Result<()> {
    save(store, TIME_USAGE, usage).await
}

pub(crate) async fn load_string(store: &dyn UsageStore, key: &str) -> Result<Option<String>> {
    load(store, key).await
}
