use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ConfigsError;

/// A nested mapping: the form configs take in files and in `as_mapping()`.
pub type Mapping = serde_json::Map<String, Value>;

/// A flattened mapping: dot-joined paths to terminal values.
///
/// No value in a `Flat` is ever a `Value::Object`; a nested structure only
/// shows up as a prefix shared by several keys.
pub type Flat = BTreeMap<String, Value>;

/// Result of a keyed read or removal: either a terminal value or a subtree.
///
/// The subtree representation depends on the operation: reads hand out
/// [`SubDict`](crate::SubDict) snapshots, mutable reads hand out
/// [`SubDictMut`](crate::SubDictMut) views, and `pop` hands out a detached
/// [`ConfigsDict`](crate::ConfigsDict).
#[derive(Debug, Clone, PartialEq)]
pub enum Item<D> {
    Value(Value),
    Dict(D),
}

impl<D> Item<D> {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Item::Value(v) => Some(v),
            Item::Dict(_) => None,
        }
    }

    pub fn as_dict(&self) -> Option<&D> {
        match self {
            Item::Value(_) => None,
            Item::Dict(d) => Some(d),
        }
    }

    pub fn into_dict(self) -> Option<D> {
        match self {
            Item::Value(_) => None,
            Item::Dict(d) => Some(d),
        }
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, Item::Dict(_))
    }
}

impl<D: crate::Configs> Item<D> {
    /// Collapse to a plain value, rendering a subtree as its nested mapping.
    pub fn into_value(self) -> Value {
        match self {
            Item::Value(v) => v,
            Item::Dict(d) => Value::Object(d.as_mapping()),
        }
    }
}

/// Store type hint used when opening a file-backed store.
///
/// `Auto` infers the format from the file extension; the other variants
/// force a format regardless of the extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreType {
    #[default]
    Auto,
    Yaml,
    Json,
    #[cfg(feature = "toml")]
    Toml,
}

impl FromStr for StoreType {
    type Err = ConfigsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(StoreType::Auto),
            "yaml" | "yml" => Ok(StoreType::Yaml),
            "json" => Ok(StoreType::Json),
            #[cfg(feature = "toml")]
            "toml" => Ok(StoreType::Toml),
            _ => Err(ConfigsError::UnknownStoreType(s.into())),
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreType::Auto => "auto",
            StoreType::Yaml => "yaml",
            StoreType::Json => "json",
            #[cfg(feature = "toml")]
            StoreType::Toml => "toml",
        };
        f.write_str(name)
    }
}
