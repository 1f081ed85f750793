//! Per-model cache front end: settings, lookup/save and statistics.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::entry::CacheEntry;
use super::key::{compute_key, CacheKey};
use super::model::CachedModel;
use super::store::{store, try_load};
use crate::types::config::{CacheSettings, StoreErrorPolicy};
use crate::types::values::ValueMap;
use crate::ModelCacheResult;

/// Result of checking the cache before computing.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Caching is off; nothing was hashed or read.
    Disabled,
    /// A stored entry exists for the key.
    Hit { key: CacheKey, entry: CacheEntry },
    /// No entry yet; compute, then save under `key`.
    Miss { key: CacheKey },
}

/// How an evaluation obtained its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Caching disabled, outputs computed.
    Uncached,
    /// Outputs read from the cache.
    Loaded,
    /// Outputs computed after a miss. `stored` is false only when a write
    /// failure was downgraded to a warning.
    Computed { stored: bool },
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Uncached => write!(f, "uncached"),
            Outcome::Loaded => write!(f, "loaded"),
            Outcome::Computed { stored: true } => write!(f, "computed"),
            Outcome::Computed { stored: false } => write!(f, "computed (not stored)"),
        }
    }
}

/// Outputs of one evaluation and where they came from.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub entry: CacheEntry,
    pub outcome: Outcome,
    /// Key of the evaluation, `None` when caching is disabled.
    pub key: Option<CacheKey>,
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Lookups answered from disk.
    pub hits: u64,

    /// Lookups that found nothing.
    pub misses: u64,

    /// Entries written.
    pub stores: u64,

    /// Writes that failed under the warn policy.
    pub store_failures: u64,
}

impl CacheStats {
    /// Calculates the hit rate.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Disk cache bound to one set of [`CacheSettings`].
///
/// Shareable across threads; all state lives on disk apart from the
/// counters.
pub struct ResultCache {
    settings: CacheSettings,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    store_failures: AtomicU64,
}

impl ResultCache {
    /// Creates a cache. Nothing is created on disk until the first store.
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
        }
    }

    /// Creates a cache using a model's own settings.
    pub fn for_model<M: CachedModel + ?Sized>(model: &M) -> Self {
        Self::new(model.cache_settings().clone())
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enable_caching
    }

    pub fn cache_dir(&self) -> &Path {
        &self.settings.cache_dir
    }

    /// Checks for a stored result of `config` evaluated at these inputs.
    pub fn lookup<C: Serialize + ?Sized>(
        &self,
        config: &C,
        inputs: &ValueMap,
        discrete_inputs: &ValueMap,
    ) -> ModelCacheResult<Lookup> {
        if !self.is_enabled() {
            return Ok(Lookup::Disabled);
        }

        let key = compute_key(config, inputs, discrete_inputs)?;
        match try_load(self.cache_dir(), &key)? {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Lookup::Hit { key, entry })
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(Lookup::Miss { key })
            }
        }
    }

    /// Stores a freshly computed entry.
    ///
    /// Returns `Ok(false)` when caching is disabled, or when the write
    /// failed and the policy is [`StoreErrorPolicy::Warn`].
    pub fn save(&self, key: &CacheKey, entry: &CacheEntry) -> ModelCacheResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        match store(self.cache_dir(), key, entry) {
            Ok(()) => {
                self.stores.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(e) if e.is_storage() && self.settings.on_store_error == StoreErrorPolicy::Warn => {
                self.store_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, error = %e, "cache write failed, continuing without it");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Evaluates `model`, serving the outputs from the cache when possible.
    ///
    /// A hit skips `compute`. A miss computes, then stores the outputs.
    /// Any cache error aborts the evaluation.
    pub fn evaluate<M: CachedModel + ?Sized>(
        &self,
        model: &M,
        inputs: &ValueMap,
        discrete_inputs: &ValueMap,
    ) -> ModelCacheResult<Evaluation> {
        let lookup = if self.is_enabled() {
            let config = model.cache_config()?;
            self.lookup(&config, inputs, discrete_inputs)?
        } else {
            Lookup::Disabled
        };

        match lookup {
            Lookup::Disabled => {
                let entry = model.compute(inputs, discrete_inputs)?;
                Ok(Evaluation {
                    entry,
                    outcome: Outcome::Uncached,
                    key: None,
                })
            }
            Lookup::Hit { key, entry } => {
                tracing::debug!(model = model.name(), key = %key, "outputs loaded from cache");
                Ok(Evaluation {
                    entry,
                    outcome: Outcome::Loaded,
                    key: Some(key),
                })
            }
            Lookup::Miss { key } => {
                let entry = model.compute(inputs, discrete_inputs)?;
                let stored = self.save(&key, &entry)?;
                tracing::debug!(model = model.name(), key = %key, stored, "outputs computed");
                Ok(Evaluation {
                    entry,
                    outcome: Outcome::Computed { stored },
                    key: Some(key),
                })
            }
        }
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::values::Value;
    use crate::ModelCacheError;
    use serde_json::json;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct Doubler {
        config: serde_json::Value,
        settings: CacheSettings,
        calls: Cell<u32>,
    }

    impl Doubler {
        fn new(settings: CacheSettings) -> Self {
            Self {
                config: json!({"factor": 2.0}),
                settings,
                calls: Cell::new(0),
            }
        }
    }

    impl CachedModel for Doubler {
        type Config = serde_json::Value;

        fn name(&self) -> &str {
            "doubler"
        }

        fn config(&self) -> &Self::Config {
            &self.config
        }

        fn cache_settings(&self) -> &CacheSettings {
            &self.settings
        }

        fn compute(&self, inputs: &ValueMap, _: &ValueMap) -> ModelCacheResult<CacheEntry> {
            self.calls.set(self.calls.get() + 1);
            let x = inputs["x"].as_f64().unwrap_or_default();
            Ok(CacheEntry::default().with_output("y", 2.0 * x))
        }
    }

    fn inputs(x: f64) -> ValueMap {
        let mut map = ValueMap::new();
        map.insert("x".into(), Value::Float(x));
        map
    }

    #[test]
    fn test_second_evaluation_is_loaded() {
        let dir = TempDir::new().unwrap();
        let model = Doubler::new(CacheSettings::enabled(dir.path()));
        let cache = ResultCache::for_model(&model);

        let first = cache.evaluate(&model, &inputs(3.0), &ValueMap::new()).unwrap();
        let second = cache.evaluate(&model, &inputs(3.0), &ValueMap::new()).unwrap();

        assert_eq!(first.outcome, Outcome::Computed { stored: true });
        assert_eq!(second.outcome, Outcome::Loaded);
        assert_eq!(second.entry.outputs["y"], Value::Float(6.0));
        assert_eq!(first.key, second.key);
        assert_eq!(model.calls.get(), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.stores), (1, 1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_disabled_cache_never_touches_disk() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("cache");
        let model = Doubler::new(CacheSettings::disabled(&cache_dir));
        let cache = ResultCache::for_model(&model);

        for _ in 0..3 {
            let eval = cache.evaluate(&model, &inputs(1.0), &ValueMap::new()).unwrap();
            assert_eq!(eval.outcome, Outcome::Uncached);
            assert!(eval.key.is_none());
        }

        assert_eq!(model.calls.get(), 3);
        assert!(!cache_dir.exists());
        assert_eq!(
            cache.lookup(&json!({}), &inputs(1.0), &ValueMap::new()).unwrap(),
            Lookup::Disabled
        );
    }

    #[test]
    fn test_corrupt_entry_aborts_evaluation() {
        let dir = TempDir::new().unwrap();
        let model = Doubler::new(CacheSettings::enabled(dir.path()));
        let cache = ResultCache::for_model(&model);

        let key = cache
            .evaluate(&model, &inputs(2.0), &ValueMap::new())
            .unwrap()
            .key
            .unwrap();
        std::fs::write(dir.path().join(key.file_name()), b"garbage").unwrap();

        let err = cache
            .evaluate(&model, &inputs(2.0), &ValueMap::new())
            .unwrap_err();
        assert!(matches!(err, ModelCacheError::Corruption { .. }));
        assert_eq!(model.calls.get(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_store_error_policy() {
        let dir = TempDir::new().unwrap();
        // a regular file where the cache directory should be
        let blocker = dir.path().join("cache");
        std::fs::write(&blocker, b"").unwrap();

        let failing = Doubler::new(CacheSettings::enabled(&blocker));
        let err = ResultCache::for_model(&failing)
            .evaluate(&failing, &inputs(1.0), &ValueMap::new())
            .unwrap_err();
        assert!(err.is_storage());

        let warning = Doubler::new(
            CacheSettings::enabled(blocker.join("nested"))
                .with_store_error_policy(StoreErrorPolicy::Warn),
        );
        let cache = ResultCache::for_model(&warning);
        let eval = cache
            .evaluate(&warning, &inputs(1.0), &ValueMap::new())
            .unwrap();
        assert_eq!(eval.outcome, Outcome::Computed { stored: false });
        assert_eq!(eval.entry.outputs["y"], Value::Float(2.0));
        assert_eq!(cache.stats().store_failures, 1);
    }
}
