//! Persisted result bundles.

use serde::{Deserialize, Serialize};

use crate::types::values::{ensure_finite_map, Value, ValueMap};
use crate::ModelCacheResult;

/// Outputs of one successful model evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Numeric and array outputs, by name.
    pub outputs: ValueMap,

    /// Discrete outputs, by name.
    #[serde(default)]
    pub discrete_outputs: ValueMap,
}

impl CacheEntry {
    /// Bundles already computed outputs.
    pub fn from_outputs(outputs: &ValueMap, discrete_outputs: &ValueMap) -> Self {
        Self {
            outputs: outputs.clone(),
            discrete_outputs: discrete_outputs.clone(),
        }
    }

    /// Adds one output.
    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.into(), value.into());
        self
    }

    /// Adds one discrete output.
    pub fn with_discrete_output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.discrete_outputs.insert(name.into(), value.into());
        self
    }

    /// Writes cached values into a model's declared outputs.
    ///
    /// Only names already present in `outputs` / `discrete_outputs` are
    /// touched. A declared output missing from the entry keeps its default.
    pub fn apply_to(&self, outputs: &mut ValueMap, discrete_outputs: &mut ValueMap) {
        for (name, value) in outputs.iter_mut() {
            if let Some(cached) = self.outputs.get(name) {
                *value = cached.clone();
            }
        }
        for (name, value) in discrete_outputs.iter_mut() {
            if let Some(cached) = self.discrete_outputs.get(name) {
                *value = cached.clone();
            }
        }
    }

    /// Fails if the entry holds a value JSON cannot round-trip.
    pub fn ensure_finite(&self) -> ModelCacheResult<()> {
        ensure_finite_map(&self.outputs, "outputs")?;
        ensure_finite_map(&self.discrete_outputs, "discrete_outputs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discrete_outputs_default_to_empty() {
        let json = r#"{"outputs":{"power":{"array":{"shape":[3],"data":[1.0,2.0,3.0]}}}}"#;
        let entry: CacheEntry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.outputs["power"], Value::array(vec![1.0, 2.0, 3.0]));
        assert!(entry.discrete_outputs.is_empty());
    }

    #[test]
    fn test_apply_to_only_touches_declared_outputs() {
        let entry = CacheEntry::default()
            .with_output("electricity_out", vec![1.0, 2.0])
            .with_output("unused", 9.0)
            .with_discrete_output("status", "ok");

        let mut outputs = ValueMap::new();
        outputs.insert("electricity_out".into(), Value::array(vec![0.0, 0.0]));
        outputs.insert("capacity_factor".into(), Value::Float(0.0));

        let mut discrete = ValueMap::new();
        discrete.insert("status".into(), Value::from("pending"));

        entry.apply_to(&mut outputs, &mut discrete);

        assert_eq!(outputs["electricity_out"], Value::array(vec![1.0, 2.0]));
        assert_eq!(outputs["capacity_factor"], Value::Float(0.0));
        assert!(!outputs.contains_key("unused"));
        assert_eq!(discrete["status"], Value::from("ok"));
    }

    #[test]
    fn test_from_outputs() {
        let mut outputs = ValueMap::new();
        outputs.insert("total_capacity".into(), Value::Float(1500.0));

        let entry = CacheEntry::from_outputs(&outputs, &ValueMap::new());
        assert_eq!(entry.outputs, outputs);
        assert!(entry.ensure_finite().is_ok());
    }
}
