//! Rejects non-finite floats anywhere in a serializable value.
//!
//! `serde_json` writes NaN and infinities as `null`, which would let
//! distinct configurations share a key. This serializer walks the value
//! first and reports the path of the first offending float.

use std::fmt;

use serde::ser::{self, Serialize};

use crate::{ModelCacheError, ModelCacheResult};

/// Fails with a `Serialization` error naming `<context>.<field path>` when
/// `value` contains a NaN or infinite float.
pub(crate) fn ensure_finite_floats<T: Serialize + ?Sized>(
    value: &T,
    context: &str,
) -> ModelCacheResult<()> {
    value
        .serialize(FloatCheck {
            path: context.to_string(),
        })
        .map_err(|e| {
            ModelCacheError::serialization(e.path.unwrap_or_else(|| context.to_string()), e.reason)
        })
}

#[derive(Debug)]
pub(crate) struct FloatCheckError {
    path: Option<String>,
    reason: String,
}

impl fmt::Display for FloatCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for FloatCheckError {}

impl ser::Error for FloatCheckError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self {
            path: None,
            reason: msg.to_string(),
        }
    }
}

type CheckResult = Result<(), FloatCheckError>;

struct FloatCheck {
    path: String,
}

impl FloatCheck {
    fn float(self, v: f64) -> CheckResult {
        if v.is_finite() {
            Ok(())
        } else {
            Err(FloatCheckError {
                path: Some(self.path),
                reason: format!("non-finite float {}", v),
            })
        }
    }

    fn child(&self, segment: &str) -> FloatCheck {
        FloatCheck {
            path: format!("{}.{}", self.path, segment),
        }
    }

    fn nested(self) -> Nested {
        Nested {
            path: self.path,
            index: 0,
            key: None,
        }
    }
}

impl ser::Serializer for FloatCheck {
    type Ok = ();
    type Error = FloatCheckError;
    type SerializeSeq = Nested;
    type SerializeTuple = Nested;
    type SerializeTupleStruct = Nested;
    type SerializeTupleVariant = Nested;
    type SerializeMap = Nested;
    type SerializeStruct = Nested;
    type SerializeStructVariant = Nested;

    fn serialize_bool(self, _v: bool) -> CheckResult {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> CheckResult {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> CheckResult {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> CheckResult {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> CheckResult {
        Ok(())
    }

    fn serialize_i128(self, _v: i128) -> CheckResult {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> CheckResult {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> CheckResult {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> CheckResult {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> CheckResult {
        Ok(())
    }

    fn serialize_u128(self, _v: u128) -> CheckResult {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> CheckResult {
        self.float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> CheckResult {
        self.float(v)
    }

    fn serialize_char(self, _v: char) -> CheckResult {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> CheckResult {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> CheckResult {
        Ok(())
    }

    fn serialize_none(self) -> CheckResult {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> CheckResult {
        value.serialize(self)
    }

    fn serialize_unit(self) -> CheckResult {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> CheckResult {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> CheckResult {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> CheckResult {
        value.serialize(self.child(variant))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Nested, FloatCheckError> {
        Ok(self.nested())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Nested, FloatCheckError> {
        Ok(self.nested())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Nested, FloatCheckError> {
        Ok(self.nested())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Nested, FloatCheckError> {
        Ok(self.child(variant).nested())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Nested, FloatCheckError> {
        Ok(self.nested())
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Nested, FloatCheckError> {
        Ok(self.nested())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Nested, FloatCheckError> {
        Ok(self.child(variant).nested())
    }
}

/// Compound value being walked: sequences index by position, structs and
/// maps by field name.
struct Nested {
    path: String,
    index: usize,
    key: Option<String>,
}

impl Nested {
    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        let path = format!("{}[{}]", self.path, self.index);
        self.index += 1;
        value.serialize(FloatCheck { path })
    }

    fn field<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> CheckResult {
        value.serialize(FloatCheck {
            path: format!("{}.{}", self.path, name),
        })
    }
}

impl ser::SerializeSeq for Nested {
    type Ok = ();
    type Error = FloatCheckError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        self.element(value)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTuple for Nested {
    type Ok = ();
    type Error = FloatCheckError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        self.element(value)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for Nested {
    type Ok = ();
    type Error = FloatCheckError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        self.element(value)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for Nested {
    type Ok = ();
    type Error = FloatCheckError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        self.element(value)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeMap for Nested {
    type Ok = ();
    type Error = FloatCheckError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> CheckResult {
        key.serialize(FloatCheck {
            path: format!("{}.<key>", self.path),
        })?;
        self.key = match serde_json::to_value(key) {
            Ok(serde_json::Value::String(name)) => Some(name),
            _ => None,
        };
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> CheckResult {
        let name = self.key.take().unwrap_or_else(|| self.index.to_string());
        self.index += 1;
        self.field(&name, value)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeStruct for Nested {
    type Ok = ();
    type Error = FloatCheckError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> CheckResult {
        self.field(key, value)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}

impl ser::SerializeStructVariant for Nested {
    type Ok = ();
    type Error = FloatCheckError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> CheckResult {
        self.field(key, value)
    }

    fn end(self) -> CheckResult {
        Ok(())
    }
}
