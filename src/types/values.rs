//! Typed values exchanged between a model and its cache.
//!
//! Inputs and outputs are kept in [`ValueMap`]s, which are ordered by name,
//! so a serialized map never depends on insertion order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ModelCacheError, ModelCacheResult};

/// Named values, ordered by name.
pub type ValueMap = BTreeMap<String, Value>;

/// A single input or output value.
///
/// Serialized externally tagged so that `Int(1)` and `Float(1.0)` remain
/// distinct on disk and in cache keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    Array(NumericArray),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// One-dimensional numeric array.
    pub fn array(data: impl Into<Vec<f64>>) -> Self {
        Value::Array(NumericArray::from_vec(data.into()))
    }

    /// Returns the scalar as `f64` if the value is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the array if the value is a numeric array.
    pub fn as_array(&self) -> Option<&NumericArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Converts plain JSON into a value.
    ///
    /// Integers become `Int`, other numbers `Float`, arrays made only of
    /// numbers become one-dimensional `Array`s and any other array a `List`.
    /// `null` has no counterpart and is rejected.
    pub fn from_json(json: serde_json::Value) -> ModelCacheResult<Self> {
        use serde_json::Value as Json;

        match json {
            Json::Null => Err(ModelCacheError::config("null is not a supported value")),
            Json::Bool(b) => Ok(Value::Bool(b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| ModelCacheError::config(format!("unsupported number {}", n))),
            },
            Json::String(s) => Ok(Value::Str(s)),
            Json::Array(items) => {
                let numbers: Option<Vec<f64>> = items.iter().map(|v| v.as_f64()).collect();
                match numbers {
                    Some(data) if !items.is_empty() => Ok(Value::array(data)),
                    _ => items
                        .into_iter()
                        .map(Value::from_json)
                        .collect::<ModelCacheResult<_>>()
                        .map(Value::List),
                }
            }
            Json::Object(map) => map
                .into_iter()
                .map(|(k, v)| Value::from_json(v).map(|v| (k, v)))
                .collect::<ModelCacheResult<_>>()
                .map(Value::Map),
        }
    }

    /// Converts the value to plain JSON, nesting arrays by their shape.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Float(v) => serde_json::json!(v),
            Value::Int(v) => serde_json::json!(v),
            Value::Bool(b) => Json::Bool(*b),
            Value::Str(s) => Json::String(s.clone()),
            Value::Array(a) => nested_json(a.shape(), a.data()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Checks that every float inside the value is finite.
    ///
    /// `context` names the value in the error, e.g. `inputs.wind_speed`.
    pub fn ensure_finite(&self, context: &str) -> ModelCacheResult<()> {
        match self {
            Value::Float(v) if !v.is_finite() => Err(ModelCacheError::serialization(
                context,
                format!("non-finite float {}", v),
            )),
            Value::Array(a) => match a.data.iter().position(|v| !v.is_finite()) {
                Some(i) => Err(ModelCacheError::serialization(
                    format!("{}[{}]", context, i),
                    format!("non-finite float {}", a.data[i]),
                )),
                None => Ok(()),
            },
            Value::List(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, v)| v.ensure_finite(&format!("{}[{}]", context, i))),
            Value::Map(map) => ensure_finite_map(map, context),
            _ => Ok(()),
        }
    }
}

fn nested_json(shape: &[usize], data: &[f64]) -> serde_json::Value {
    match shape {
        [] => data.first().map_or(serde_json::Value::Null, |v| serde_json::json!(v)),
        [_] => serde_json::json!(data),
        [outer, rest @ ..] => {
            let stride: usize = rest.iter().product();
            if stride == 0 {
                return serde_json::Value::Array(vec![nested_json(rest, &[]); *outer]);
            }
            serde_json::Value::Array(
                data.chunks(stride)
                    .map(|chunk| nested_json(rest, chunk))
                    .collect(),
            )
        }
    }
}

/// Converts a plain JSON object into a [`ValueMap`].
pub fn value_map_from_json(json: serde_json::Value) -> ModelCacheResult<ValueMap> {
    match Value::from_json(json)? {
        Value::Map(map) => Ok(map),
        _ => Err(ModelCacheError::config("expected a JSON object of name to value")),
    }
}

/// Converts a [`ValueMap`] into a plain JSON object.
pub fn value_map_to_json(map: &ValueMap) -> serde_json::Value {
    serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

/// Checks every value of a map, naming failures `context.name`.
pub fn ensure_finite_map(map: &ValueMap, context: &str) -> ModelCacheResult<()> {
    map.iter()
        .try_for_each(|(name, v)| v.ensure_finite(&format!("{}.{}", context, name)))
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::array(v)
    }
}

impl From<NumericArray> for Value {
    fn from(v: NumericArray) -> Self {
        Value::Array(v)
    }
}

/// Dense row-major numeric array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArrayParts")]
pub struct NumericArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct ArrayParts {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<ArrayParts> for NumericArray {
    type Error = ModelCacheError;

    fn try_from(parts: ArrayParts) -> Result<Self, Self::Error> {
        NumericArray::new(parts.shape, parts.data)
    }
}

impl NumericArray {
    /// Array with an explicit shape. The shape must match the data length.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> ModelCacheResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ModelCacheError::config(format!(
                "array shape {:?} holds {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional array.
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
