//! # modelcache
//!
//! Configuration-keyed disk cache for expensive techno-economic plant
//! sub-models (wake models, hybrid plant simulations, process models).
//!
//! A model evaluation is keyed by a digest of its configuration and input
//! values. When the same evaluation comes up again, in this process or in
//! another one sharing the cache directory, its outputs are read back from
//! disk instead of being recomputed.
//!
//! ## Modules
//!
//! - [`cache`] - Keys, entries, the on-disk store and [`ResultCache`](cache::ResultCache)
//! - [`models`] - Reference plant models implementing [`CachedModel`](cache::CachedModel)
//! - [`cli`] - Command line interface
//! - [`types`] - Configuration, errors and value types

pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod models;
pub mod types;

pub use types::config::Config;
pub use types::errors::{ModelCacheError, ModelCacheResult};
