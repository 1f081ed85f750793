//! Wind plant performance from a tabulated turbine power curve.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::{canonical_config, CacheEntry, CachedModel};
use crate::types::config::CacheSettings;
use crate::types::values::{NumericArray, Value, ValueMap};
use crate::{ModelCacheError, ModelCacheResult};

/// Input holding the hub-height wind speed time series (m/s).
pub const WIND_SPEED_INPUT: &str = "wind_speed";

/// Turbine power curve: power (kW) at each tabulated wind speed (m/s).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerCurve {
    pub wind_speeds: Vec<f64>,
    pub power_kw: Vec<f64>,
}

impl PowerCurve {
    /// Power at `wind_speed`, linearly interpolated. Zero outside the table.
    pub fn power_at(&self, wind_speed: f64) -> f64 {
        let speeds = &self.wind_speeds;
        let (Some(&first), Some(&last)) = (speeds.first(), speeds.last()) else {
            return 0.0;
        };
        if wind_speed < first || wind_speed > last {
            return 0.0;
        }

        let upper = speeds.partition_point(|&s| s < wind_speed);
        if upper == 0 {
            return self.power_kw[0];
        }
        let (x0, x1) = (speeds[upper - 1], speeds[upper]);
        let (y0, y1) = (self.power_kw[upper - 1], self.power_kw[upper]);
        y0 + (y1 - y0) * (wind_speed - x0) / (x1 - x0)
    }

    /// Rated power: the curve maximum.
    pub fn rating_kw(&self) -> f64 {
        self.power_kw.iter().copied().fold(0.0, f64::max)
    }

    fn validate(&self) -> ModelCacheResult<()> {
        if self.wind_speeds.is_empty() {
            return Err(ModelCacheError::config("power curve is empty"));
        }
        if self.wind_speeds.len() != self.power_kw.len() {
            return Err(ModelCacheError::config(format!(
                "power curve has {} wind speeds but {} power values",
                self.wind_speeds.len(),
                self.power_kw.len()
            )));
        }
        if self.wind_speeds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ModelCacheError::config(
                "power curve wind speeds must be strictly increasing",
            ));
        }
        if self
            .wind_speeds
            .iter()
            .chain(&self.power_kw)
            .any(|v| !v.is_finite())
        {
            return Err(ModelCacheError::config("power curve values must be finite"));
        }
        if self.power_kw.iter().any(|&p| p < 0.0) {
            return Err(ModelCacheError::config("power curve values must be >= 0"));
        }
        Ok(())
    }
}

/// Configuration of [`PowerCurveWindPlant`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerCurveWindConfig {
    /// Number of turbines in the farm.
    pub num_turbines: u32,

    pub power_curve: PowerCurve,

    /// Non-wake losses in percent, between 0 and 100.
    #[serde(default)]
    pub operational_losses: f64,

    #[serde(flatten)]
    pub cache: CacheSettings,
}

impl PowerCurveWindConfig {
    /// Loads the configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> ModelCacheResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Wind farm whose output is the turbine power curve applied to the wind
/// speed series, scaled by turbine count and operational losses.
#[derive(Debug, Clone)]
pub struct PowerCurveWindPlant {
    config: PowerCurveWindConfig,
    rating_kw: f64,
}

impl PowerCurveWindPlant {
    /// Validates the configuration and builds the model.
    pub fn new(config: PowerCurveWindConfig) -> ModelCacheResult<Self> {
        if config.num_turbines == 0 {
            return Err(ModelCacheError::config("num_turbines must be greater than 0"));
        }
        if !(0.0..=100.0).contains(&config.operational_losses) {
            return Err(ModelCacheError::config(format!(
                "operational_losses must be within [0, 100], got {}",
                config.operational_losses
            )));
        }
        config.power_curve.validate()?;

        let rating_kw = config.power_curve.rating_kw();
        Ok(Self { config, rating_kw })
    }

    /// Rated power of one turbine (kW).
    pub fn turbine_rating_kw(&self) -> f64 {
        self.rating_kw
    }

    /// Builds the model inputs for a wind speed series.
    pub fn inputs(wind_speed: Vec<f64>) -> ValueMap {
        let mut inputs = ValueMap::new();
        inputs.insert(WIND_SPEED_INPUT.to_string(), Value::array(wind_speed));
        inputs
    }
}

impl CachedModel for PowerCurveWindPlant {
    type Config = PowerCurveWindConfig;

    fn name(&self) -> &str {
        "power_curve_wind_plant"
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn cache_settings(&self) -> &CacheSettings {
        &self.config.cache
    }

    fn cache_config(&self) -> ModelCacheResult<serde_json::Value> {
        let mut config = canonical_config(&self.config)?;
        if let serde_json::Value::Object(map) = &mut config {
            map.insert(
                "wind_turbine_size_kw".to_string(),
                serde_json::json!(self.rating_kw),
            );
        }
        Ok(config)
    }

    fn compute(&self, inputs: &ValueMap, _discrete_inputs: &ValueMap) -> ModelCacheResult<CacheEntry> {
        let wind_speed = inputs
            .get(WIND_SPEED_INPUT)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ModelCacheError::config(format!("missing array input '{}'", WIND_SPEED_INPUT))
            })?;
        if let Some(i) = wind_speed.data().iter().position(|ws| !ws.is_finite()) {
            return Err(ModelCacheError::config(format!(
                "{}[{}] must be finite, got {}",
                WIND_SPEED_INPUT,
                i,
                wind_speed.data()[i]
            )));
        }

        let n_turbines = f64::from(self.config.num_turbines);
        let efficiency = (100.0 - self.config.operational_losses) / 100.0;

        let gen: Vec<f64> = wind_speed
            .data()
            .iter()
            .map(|&ws| self.config.power_curve.power_at(ws) * n_turbines * efficiency)
            .collect();

        let total_capacity = n_turbines * self.rating_kw;
        let total_produced: f64 = gen.iter().sum();
        let max_production = total_capacity * gen.len() as f64;
        let capacity_factor = if max_production > 0.0 {
            total_produced / max_production
        } else {
            0.0
        };

        let electricity_out = NumericArray::new(wind_speed.shape().to_vec(), gen)?;

        Ok(CacheEntry::default()
            .with_output("electricity_out", electricity_out)
            .with_output("total_capacity", total_capacity)
            .with_output("total_electricity_produced", total_produced)
            .with_output("capacity_factor", capacity_factor))
    }
}
