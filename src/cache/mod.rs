//! Configuration-keyed disk cache for model results.
//!
//! An evaluation is identified by a [`CacheKey`]: a SHA-256 digest of the
//! model configuration (minus the cache settings) and its current inputs.
//! Results are stored as one JSON file per key and never evicted.
//!
//! ```rust,ignore
//! use modelcache::cache::ResultCache;
//!
//! let cache = ResultCache::for_model(&model);
//! let eval = cache.evaluate(&model, &inputs, &discrete_inputs)?;
//! println!("{} via {}", eval.entry.outputs.len(), eval.outcome);
//! ```

mod entry;
mod finite;
mod key;
mod model;
mod result_cache;
mod store;

pub use entry::CacheEntry;
pub use key::{canonical_config, compute_key, CacheKey, CACHE_SETTING_FIELDS};
pub use model::CachedModel;
pub use result_cache::{CacheStats, Evaluation, Lookup, Outcome, ResultCache};
pub use store::{
    entry_path, list_entries, store, try_load, verify_dir, CorruptEntry, EntryInfo, VerifyReport,
};
