//! Contract between a cached model and the cache.

use serde::Serialize;

use super::entry::CacheEntry;
use super::key::canonical_config;
use crate::types::config::CacheSettings;
use crate::types::values::ValueMap;
use crate::ModelCacheResult;

/// A model whose evaluations can be served from the disk cache.
///
/// The host engine calls [`ResultCache::evaluate`](super::ResultCache::evaluate)
/// instead of `compute` directly; the cache never runs a model on its own.
pub trait CachedModel {
    /// Fully resolved configuration of the model.
    type Config: Serialize;

    /// Model name used in log events.
    fn name(&self) -> &str;

    fn config(&self) -> &Self::Config;

    fn cache_settings(&self) -> &CacheSettings;

    /// Configuration as it gets hashed into the cache key.
    ///
    /// Override to add values derived during setup that affect outputs but
    /// are not part of [`Self::Config`].
    fn cache_config(&self) -> ModelCacheResult<serde_json::Value> {
        canonical_config(self.config())
    }

    /// Runs the expensive computation.
    fn compute(&self, inputs: &ValueMap, discrete_inputs: &ValueMap) -> ModelCacheResult<CacheEntry>;
}
