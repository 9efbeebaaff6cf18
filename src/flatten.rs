//! Custom serde Serializer that flattens any `Serialize` value into a
//! [`Flat`] mapping of dotted keys to terminal values.
//!
//! Structs and maps are recursed into, building dotted key paths:
//! `{"database": {"url": "pg://"}}` → `{"database.url": "pg://"}`. Sequences,
//! scalars and `None` are terminals. Map keys must serialize as strings and
//! must be well-formed dotted keys; anything else is rejected before the
//! caller touches its own data. So is a source that names one path as both a
//! value and a subtree (`{"a": 1, "a.b": 2}`), and non-finite floats.

use std::fmt;

use serde::ser::{self, Serialize};
use serde_json::Value;

use crate::error::ConfigsError;
use crate::nest::validate_key;
use crate::types::Flat;

/// Flatten a mapping-like value (struct, map, `serde_json::Value::Object`,
/// another view) into dotted key-value pairs.
///
/// Fails if the top level is not a mapping.
pub fn flatten<S: Serialize + ?Sized>(source: &S) -> Result<Flat, FlattenError> {
    let mut out = Flat::new();
    source.serialize(FlattenSerializer {
        prefix: String::new(),
        out: &mut out,
    })?;
    Ok(out)
}

/// Flatten `{key: value}`: a scalar lands under `key` itself, a mapping is
/// spread into `key.<sub>` entries, and an empty mapping yields nothing.
pub fn flatten_at<S: Serialize + ?Sized>(key: &str, value: &S) -> Result<Flat, FlattenError> {
    let mut out = Flat::new();
    value.serialize(FlattenSerializer {
        prefix: key.to_string(),
        out: &mut out,
    })?;
    Ok(out)
}

#[derive(Debug)]
pub enum FlattenError {
    InvalidKey { key: String, reason: String },
    InvalidValue { key: String, reason: String },
}

impl FlattenError {
    fn value(key: &str, reason: impl Into<String>) -> Self {
        FlattenError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    fn key(key: impl Into<String>) -> Self {
        FlattenError::InvalidKey {
            key: key.into(),
            reason: "map keys must be strings".into(),
        }
    }
}

impl fmt::Display for FlattenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlattenError::InvalidKey { key, reason } => {
                write!(f, "flatten error: invalid key '{key}': {reason}")
            }
            FlattenError::InvalidValue { key, reason } => {
                write!(f, "flatten error: invalid value for '{key}': {reason}")
            }
        }
    }
}

impl std::error::Error for FlattenError {}

impl ser::Error for FlattenError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        FlattenError::value("", msg.to_string())
    }
}

impl From<FlattenError> for ConfigsError {
    fn from(err: FlattenError) -> Self {
        match err {
            FlattenError::InvalidKey { key, reason } => {
                ConfigsError::InvalidKeyFormat { key, reason }
            }
            FlattenError::InvalidValue { key, reason } => {
                ConfigsError::InvalidValue { key, reason }
            }
        }
    }
}

struct FlattenSerializer<'a> {
    prefix: String,
    out: &'a mut Flat,
}

impl FlattenSerializer<'_> {
    fn emit(self, value: Value) -> Result<(), FlattenError> {
        if self.prefix.is_empty() {
            return Err(FlattenError::value("", "top level must be a mapping"));
        }
        if let Some(existing) = overlapping_key(self.out, &self.prefix) {
            let reason = format!("overlaps '{existing}'; a path is either a value or a subtree");
            return Err(FlattenError::InvalidKey {
                key: self.prefix,
                reason,
            });
        }
        self.out.insert(self.prefix, value);
        Ok(())
    }
}

/// An already emitted key that is `key` itself, one of its proper prefixes,
/// or lies below it.
fn overlapping_key(out: &Flat, key: &str) -> Option<String> {
    if out.contains_key(key) {
        return Some(key.to_string());
    }
    if let Some((idx, _)) = key
        .match_indices('.')
        .find(|(idx, _)| out.contains_key(&key[..*idx]))
    {
        return Some(key[..idx].to_string());
    }
    let below = format!("{key}.");
    out.range(below.clone()..)
        .next()
        .map(|(k, _)| k)
        .filter(|k| k.starts_with(&below))
        .cloned()
}

fn dotted(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn checked_key(key: &str) -> Result<(), FlattenError> {
    validate_key(key).map_err(|e| match e {
        ConfigsError::InvalidKeyFormat { key, reason } => FlattenError::InvalidKey { key, reason },
        other => FlattenError::value(key, other.to_string()),
    })
}

impl<'a> ser::Serializer for FlattenSerializer<'a> {
    type Ok = ();
    type Error = FlattenError;
    type SerializeSeq = FlattenSeqSerializer<'a>;
    type SerializeTuple = FlattenSeqSerializer<'a>;
    type SerializeTupleStruct = FlattenSeqSerializer<'a>;
    type SerializeTupleVariant = FlattenSeqSerializer<'a>;
    type SerializeMap = FlattenMapSerializer<'a>;
    type SerializeStruct = FlattenStructSerializer<'a>;
    type SerializeStructVariant = FlattenStructSerializer<'a>;

    fn serialize_bool(self, v: bool) -> Result<(), Self::Error> {
        self.emit(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<(), Self::Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<(), Self::Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<(), Self::Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<(), Self::Error> {
        self.emit(Value::from(v))
    }

    fn serialize_u8(self, v: u8) -> Result<(), Self::Error> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<(), Self::Error> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<(), Self::Error> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<(), Self::Error> {
        self.emit(Value::from(v))
    }

    fn serialize_f32(self, v: f32) -> Result<(), Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<(), Self::Error> {
        if !v.is_finite() {
            let reason = format!("{v} has no portable representation");
            return Err(FlattenError::value(&self.prefix, reason));
        }
        self.emit(Value::from(v))
    }

    fn serialize_char(self, v: char) -> Result<(), Self::Error> {
        self.serialize_str(&v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<(), Self::Error> {
        self.emit(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), Self::Error> {
        self.emit(Value::Array(v.iter().map(|b| Value::from(*b)).collect()))
    }

    fn serialize_none(self) -> Result<(), Self::Error> {
        self.emit(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Self::Error> {
        self.emit(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), Self::Error> {
        self.emit(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), Self::Error> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(FlattenSerializer {
            prefix: dotted(&self.prefix, variant),
            out: self.out,
        })
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(FlattenSeqSerializer {
            prefix: self.prefix,
            out: self.out,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Ok(FlattenSeqSerializer {
            prefix: dotted(&self.prefix, variant),
            out: self.out,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(FlattenMapSerializer {
            prefix: self.prefix,
            out: self.out,
            current_key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(FlattenStructSerializer {
            prefix: self.prefix,
            out: self.out,
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(FlattenStructSerializer {
            prefix: dotted(&self.prefix, variant),
            out: self.out,
        })
    }
}

// -- Struct serializer ------------------------------------------------------

struct FlattenStructSerializer<'a> {
    prefix: String,
    out: &'a mut Flat,
}

impl FlattenStructSerializer<'_> {
    fn field<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), FlattenError> {
        checked_key(key)?;
        value.serialize(FlattenSerializer {
            prefix: dotted(&self.prefix, key),
            out: self.out,
        })
    }
}

impl ser::SerializeStruct for FlattenStructSerializer<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FlattenStructSerializer<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// -- Map serializer ---------------------------------------------------------

struct FlattenMapSerializer<'a> {
    prefix: String,
    out: &'a mut Flat,
    current_key: Option<String>,
}

impl ser::SerializeMap for FlattenMapSerializer<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Self::Error> {
        let key = key.serialize(MapKeySerializer)?;
        checked_key(&key)?;
        self.current_key = Some(key);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| FlattenError::value(&self.prefix, "map value without a key"))?;
        value.serialize(FlattenSerializer {
            prefix: dotted(&self.prefix, &key),
            out: self.out,
        })
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// -- Sequence serializer ----------------------------------------------------

/// Sequences are terminals: elements are converted whole, never flattened.
struct FlattenSeqSerializer<'a> {
    prefix: String,
    out: &'a mut Flat,
    items: Vec<Value>,
}

impl FlattenSeqSerializer<'_> {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
        let value_err = |e: serde_json::Error| FlattenError::value(&self.prefix, e.to_string());
        let item = serde_json::to_value(value).map_err(value_err)?;
        self.items.push(item);
        Ok(())
    }

    fn finish(self) -> Result<(), FlattenError> {
        FlattenSerializer {
            prefix: self.prefix,
            out: self.out,
        }
        .emit(Value::Array(self.items))
    }
}

impl ser::SerializeSeq for FlattenSeqSerializer<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<(), Self::Error> {
        self.finish()
    }
}

impl ser::SerializeTuple for FlattenSeqSerializer<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<(), Self::Error> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for FlattenSeqSerializer<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<(), Self::Error> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for FlattenSeqSerializer<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<(), Self::Error> {
        self.finish()
    }
}

// -- Map key serializer (only strings accepted) -----------------------------

struct MapKeySerializer;

impl ser::Serializer for MapKeySerializer {
    type Ok = String;
    type Error = FlattenError;
    type SerializeSeq = ser::Impossible<String, FlattenError>;
    type SerializeTuple = ser::Impossible<String, FlattenError>;
    type SerializeTupleStruct = ser::Impossible<String, FlattenError>;
    type SerializeTupleVariant = ser::Impossible<String, FlattenError>;
    type SerializeMap = ser::Impossible<String, FlattenError>;
    type SerializeStruct = ser::Impossible<String, FlattenError>;
    type SerializeStructVariant = ser::Impossible<String, FlattenError>;

    fn serialize_str(self, v: &str) -> Result<String, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_bool(self, v: bool) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_i8(self, v: i8) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_i16(self, v: i16) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_i32(self, v: i32) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_i64(self, v: i64) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_u8(self, v: u8) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_u16(self, v: u16) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_u32(self, v: u32) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_u64(self, v: u64) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_f32(self, v: f32) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_f64(self, v: f64) -> Result<String, Self::Error> {
        Err(FlattenError::key(v.to_string()))
    }
    fn serialize_char(self, v: char) -> Result<String, Self::Error> {
        Err(FlattenError::key(format!("'{v}'")))
    }
    fn serialize_bytes(self, _: &[u8]) -> Result<String, Self::Error> {
        Err(FlattenError::key("<bytes>"))
    }
    fn serialize_none(self) -> Result<String, Self::Error> {
        Err(FlattenError::key("None"))
    }
    fn serialize_some<T: Serialize + ?Sized>(self, _: &T) -> Result<String, Self::Error> {
        Err(FlattenError::key("<option>"))
    }
    fn serialize_unit(self) -> Result<String, Self::Error> {
        Err(FlattenError::key("()"))
    }
    fn serialize_unit_struct(self, name: &'static str) -> Result<String, Self::Error> {
        Err(FlattenError::key(name))
    }
    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<String, Self::Error> {
        Err(FlattenError::key(variant))
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<String, Self::Error> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: &T,
    ) -> Result<String, Self::Error> {
        Err(FlattenError::key(variant))
    }
    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(FlattenError::key("<sequence>"))
    }
    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(FlattenError::key("<tuple>"))
    }
    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(FlattenError::key(name))
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(FlattenError::key(variant))
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(FlattenError::key("<map>"))
    }
    fn serialize_struct(
        self,
        name: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Err(FlattenError::key(name))
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(FlattenError::key(variant))
    }
}
