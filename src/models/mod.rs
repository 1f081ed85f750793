//! Plant sub-models served through the cache.
//!
//! - [`PowerCurveWindPlant`] - wind farm output from a tabulated power curve

mod wind;

pub use wind::{PowerCurve, PowerCurveWindConfig, PowerCurveWindPlant, WIND_SPEED_INPUT};
