//! Shared types for modelcache.

pub mod config;
pub mod errors;
pub mod values;
