//! Cache Utilities
//!
//! Key normalization and generation, pattern invalidation and bulk warm-up.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::Cache;

// == Normalize Key ==
/// Lower-cases the key and replaces every character outside `[a-z0-9-_]` with `-`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' | '_' => c,
            _ => '-',
        })
        .collect()
}

// == Generate Key ==
/// Builds `prefix:name1:value1|name2:value2` with parameters sorted by name,
/// so the same parameter set always yields the same key.
///
/// With no parameters the key is the prefix alone.
pub fn generate_key<I, K, V>(prefix: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Display,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .map(|(name, value)| (name.into(), value.to_string()))
        .collect();

    if sorted.is_empty() {
        return prefix.to_string();
    }

    let joined = sorted
        .iter()
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join("|");
    format!("{prefix}:{joined}")
}

// == Invalidate Pattern ==
/// Deletes every key in the cache matching `pattern`. Returns the number removed.
pub async fn invalidate_pattern(cache: &Cache, pattern: &Regex) -> usize {
    let removed = cache.remove_where(|key| pattern.is_match(key)).await;
    debug!(pattern = %pattern, removed, "Invalidated keys by pattern");
    removed
}

// == Warm Up ==
type Fetcher<V> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<V>> + Send>;

/// A key to pre-populate and the fetcher producing its value.
pub struct WarmUpEntry<V> {
    key: String,
    ttl: Option<Duration>,
    fetcher: Fetcher<V>,
}

impl<V> WarmUpEntry<V> {
    pub fn new<F, Fut>(key: impl Into<String>, fetcher: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        Self {
            key: key.into(),
            ttl: None,
            fetcher: Box::new(move || fetcher().boxed()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Outcome counts of a [`warm_up`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmUpReport {
    /// Keys fetched and stored
    pub loaded: usize,
    /// Keys already present, before fetching or at store time
    pub skipped: usize,
    /// Keys whose fetcher or store failed
    pub failed: usize,
}

enum Outcome {
    Loaded,
    Skipped,
    Failed,
}

/// Fetches and stores every entry not already present, running all fetchers
/// concurrently. A failing fetcher is logged and does not affect the others.
///
/// Values are stored only if the key is still absent when the fetch completes.
pub async fn warm_up<V>(cache: &Cache, entries: Vec<WarmUpEntry<V>>) -> WarmUpReport
where
    V: Serialize + Send + 'static,
{
    let tasks = entries.into_iter().map(|entry| async move {
        let WarmUpEntry { key, ttl, fetcher } = entry;

        if cache.has(&key).await {
            debug!(key = %key, "Warm-up skipped, key already cached");
            return Outcome::Skipped;
        }

        let value = match fetcher().await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Warm-up fetch failed");
                return Outcome::Failed;
            }
        };

        match cache.set_if_absent(&key, &value, ttl).await {
            Ok(true) => Outcome::Loaded,
            Ok(false) => {
                debug!(key = %key, "Warm-up result discarded, key filled concurrently");
                Outcome::Skipped
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Warm-up store failed");
                Outcome::Failed
            }
        }
    });

    let mut report = WarmUpReport::default();
    for outcome in join_all(tasks).await {
        match outcome {
            Outcome::Loaded => report.loaded += 1,
            Outcome::Skipped => report.skipped += 1,
            Outcome::Failed => report.failed += 1,
        }
    }

    info!(
        loaded = report.loaded,
        skipped = report.skipped,
        failed = report.failed,
        "Cache warm-up finished"
    );
    report
}
