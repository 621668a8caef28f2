//! Memoization Wrapper
//!
//! Caches the results of an async function by name and serialized arguments.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::error::Result;

type Gate = Arc<tokio::sync::Mutex<()>>;
type Gates = Mutex<HashMap<String, Gate>>;

/// Membership of one call in the per-key gate map.
///
/// Dropping it, on return, cancellation or panic, removes the key's gate once
/// no other call holds it. Gate clones and drops happen under the map lock.
struct Flight<'a> {
    gates: &'a Gates,
    key: String,
    gate: Gate,
}

impl<'a> Flight<'a> {
    fn join(gates: &'a Gates, key: &str) -> Self {
        let gate = gates.lock().entry(key.to_string()).or_default().clone();
        Self {
            gates,
            key: key.to_string(),
            gate,
        }
    }

    fn gate(&self) -> &tokio::sync::Mutex<()> {
        &self.gate
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock();
        drop(std::mem::take(&mut self.gate));
        if gates
            .get(&self.key)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&self.key);
        }
    }
}

// == Memoized ==
/// An async function whose results are cached under `"<name>:<json args>"`.
///
/// Concurrent calls with the same arguments are serialized so the function
/// body runs at most once per key while the result is cached.
pub struct Memoized<F> {
    cache: Cache,
    name: String,
    func: F,
    ttl: Option<Duration>,
    inflight: Arc<Gates>,
}

impl<F> Memoized<F> {
    pub fn new(cache: Cache, name: impl Into<String>, func: F) -> Self {
        Self {
            cache,
            name: name.into(),
            func,
            ttl: None,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// TTL of cached results; the cache's `max_age` when unset.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Cache key of a call with `args`.
    pub fn key_for<A: Serialize>(&self, args: &A) -> Result<String> {
        Ok(format!("{}:{}", self.name, serde_json::to_string(args)?))
    }

    // == Call ==
    /// Returns the cached result for `args`, running the function on a miss.
    ///
    /// Arguments that cannot be serialized bypass the cache.
    pub async fn call<A, R, Fut>(&self, args: A) -> R
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = R>,
        A: Serialize,
        R: Serialize + DeserializeOwned,
    {
        let key = match self.key_for(&args) {
            Ok(key) => key,
            Err(e) => {
                warn!(function = %self.name, error = %e, "Arguments not serializable, bypassing cache");
                return (self.func)(args).await;
            }
        };

        if let Some(hit) = self.cache.get::<R>(&key).await {
            return hit;
        }

        let flight = Flight::join(&self.inflight, &key);
        let _turn = flight.gate().lock().await;

        // Another caller may have filled the key while we waited
        if self.cache.has(&key).await {
            if let Some(hit) = self.cache.get::<R>(&key).await {
                return hit;
            }
        }

        debug!(function = %self.name, key = %key, "Memoization miss, invoking function");
        let result = (self.func)(args).await;

        if let Err(e) = self.cache.set(&key, &result, self.ttl).await {
            warn!(function = %self.name, error = %e, "Failed to cache function result");
        }

        result
    }
}
