//! Cache keys derived from configuration and input values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::finite::ensure_finite_floats;
use crate::types::values::{ensure_finite_map, ValueMap};
use crate::{ModelCacheError, ModelCacheResult};

/// Configuration fields that only steer the cache itself.
pub const CACHE_SETTING_FIELDS: [&str; 3] = ["enable_caching", "cache_dir", "on_store_error"];

/// File extension of cache entries.
pub const ENTRY_EXTENSION: &str = "json";

const KEY_LEN: usize = 64;

/// Hex-encoded SHA-256 digest identifying one (configuration, inputs) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the file holding the entry for this key.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, ENTRY_EXTENSION)
    }

    /// Parses a key back from an entry file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        name.strip_suffix(ENTRY_EXTENSION)
            .and_then(|stem| stem.strip_suffix('.'))
            .and_then(|stem| stem.parse().ok())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CacheKey {
    type Err = ModelCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == KEY_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ModelCacheError::other(format!(
                "invalid cache key '{}': expected {} lowercase hex characters",
                s, KEY_LEN
            )))
        }
    }
}

impl TryFrom<String> for CacheKey {
    type Error = ModelCacheError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Converts a model configuration to the canonical form that gets hashed.
///
/// Object keys are sorted at every level and the cache settings fields are
/// removed from the top-level object. Non-finite floats are rejected since
/// JSON would collapse them to `null`.
pub fn canonical_config<C: Serialize + ?Sized>(config: &C) -> ModelCacheResult<serde_json::Value> {
    ensure_finite_floats(config, "config")?;
    let value = serde_json::to_value(config)
        .map_err(|e| ModelCacheError::serialization("config", e.to_string()))?;

    let mut value = sort_keys(value);
    if let serde_json::Value::Object(map) = &mut value {
        for field in CACHE_SETTING_FIELDS {
            map.remove(field);
        }
    }
    Ok(value)
}

fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

/// Computes the cache key for a configuration and its current inputs.
///
/// Pure: no I/O and no dependence on map insertion order. Any change to an
/// included value changes the key.
pub fn compute_key<C: Serialize + ?Sized>(
    config: &C,
    inputs: &ValueMap,
    discrete_inputs: &ValueMap,
) -> ModelCacheResult<CacheKey> {
    let config = canonical_config(config)?;
    ensure_finite_map(inputs, "inputs")?;
    ensure_finite_map(discrete_inputs, "discrete_inputs")?;

    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&config)?);
    hasher.update(b"\n");
    hasher.update(serde_json::to_vec(inputs)?);
    hasher.update(b"\n");
    hasher.update(serde_json::to_vec(discrete_inputs)?);

    Ok(CacheKey(hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::CacheSettings;
    use crate::types::values::Value;
    use serde_json::json;
    use std::collections::HashMap;

    fn wind_inputs(speeds: Vec<f64>) -> ValueMap {
        let mut inputs = ValueMap::new();
        inputs.insert("wind_speed".into(), Value::array(speeds));
        inputs
    }

    #[test]
    fn test_key_is_deterministic() {
        let config = json!({"rating_kw": 100});
        let inputs = wind_inputs(vec![5.0, 6.0, 7.0]);

        let k1 = compute_key(&config, &inputs, &ValueMap::new()).unwrap();
        let k2 = compute_key(&config, &inputs, &ValueMap::new()).unwrap();

        assert_eq!(k1, k2);
        assert_eq!(k1.as_str().len(), 64);
    }

    #[test]
    fn test_key_changes_with_input() {
        let config = json!({"rating_kw": 100});

        let k1 = compute_key(&config, &wind_inputs(vec![5.0, 6.0, 7.0]), &ValueMap::new()).unwrap();
        let k2 = compute_key(&config, &wind_inputs(vec![5.0, 6.0, 8.0]), &ValueMap::new()).unwrap();
        let k3 = compute_key(
            &config,
            &wind_inputs(vec![5.0, 6.0, 7.000000000000001]),
            &ValueMap::new(),
        )
        .unwrap();

        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_key_changes_with_config_and_discrete_inputs() {
        let inputs = wind_inputs(vec![5.0]);
        let base = compute_key(&json!({"rating_kw": 100}), &inputs, &ValueMap::new()).unwrap();
        let other = compute_key(&json!({"rating_kw": 101}), &inputs, &ValueMap::new()).unwrap();

        let mut discrete = ValueMap::new();
        discrete.insert("site".into(), Value::from("offshore"));
        let with_discrete = compute_key(&json!({"rating_kw": 100}), &inputs, &discrete).unwrap();

        assert_ne!(base, other);
        assert_ne!(base, with_discrete);
    }

    #[test]
    fn test_key_ignores_map_insertion_order() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for (k, v) in [("x", 1), ("y", 2), ("z", 3), ("w", 4)] {
            a.insert(k.to_string(), v);
        }
        for (k, v) in [("w", 4), ("z", 3), ("y", 2), ("x", 1)] {
            b.insert(k.to_string(), v);
        }

        let inputs = ValueMap::new();
        assert_eq!(
            compute_key(&a, &inputs, &inputs).unwrap(),
            compute_key(&b, &inputs, &inputs).unwrap()
        );
    }

    #[test]
    fn test_cache_settings_do_not_affect_key() {
        #[derive(Serialize)]
        struct ModelConfig {
            rating_kw: f64,
            #[serde(flatten)]
            cache: CacheSettings,
        }

        let inputs = wind_inputs(vec![5.0]);
        let a = ModelConfig {
            rating_kw: 100.0,
            cache: CacheSettings::enabled("/tmp/a"),
        };
        let b = ModelConfig {
            rating_kw: 100.0,
            cache: CacheSettings::disabled("/tmp/b"),
        };

        assert_eq!(
            compute_key(&a, &inputs, &ValueMap::new()).unwrap(),
            compute_key(&b, &inputs, &ValueMap::new()).unwrap()
        );
    }

    #[test]
    fn test_non_finite_input_is_rejected() {
        let err = compute_key(
            &json!({}),
            &wind_inputs(vec![f64::NAN]),
            &ValueMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ModelCacheError::Serialization { .. }));
    }

    #[test]
    fn test_non_finite_config_is_rejected() {
        #[derive(Serialize)]
        struct LossConfig {
            losses: f64,
        }

        let none = ValueMap::new();
        for losses in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            match compute_key(&LossConfig { losses }, &none, &none).unwrap_err() {
                ModelCacheError::Serialization { context, .. } => {
                    assert_eq!(context, "config.losses")
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        // an explicit null is a different, valid configuration
        let null = compute_key(&json!({"losses": null}), &none, &none).unwrap();
        let finite = compute_key(&LossConfig { losses: 0.0 }, &none, &none).unwrap();
        assert_ne!(null, finite);
    }

    #[test]
    fn test_non_string_map_keys_are_rejected() {
        let mut config = HashMap::new();
        config.insert((1, 2), "layout");

        let err = compute_key(&config, &ValueMap::new(), &ValueMap::new()).unwrap_err();
        assert!(matches!(err, ModelCacheError::Serialization { .. }));
    }

    #[test]
    fn test_key_parsing() {
        let key = compute_key(&json!({}), &ValueMap::new(), &ValueMap::new()).unwrap();
        let parsed: CacheKey = key.as_str().parse().unwrap();
        assert_eq!(parsed, key);

        assert_eq!(CacheKey::from_file_name(&key.file_name()), Some(key));
        assert!("not-a-key".parse::<CacheKey>().is_err());
        assert!(CacheKey::from_file_name(".tmpXYZ.json").is_none());
    }
}
