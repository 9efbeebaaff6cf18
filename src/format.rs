//! File formats for file-backed stores.
//!
//! A [`Format`] is picked once, when the store is opened: an explicit
//! [`StoreType`] hint wins, otherwise the file extension decides
//! (`.yaml`/`.yml`, `.json`, `.toml`, case-insensitive). Each format parses a
//! whole document into a nested [`Mapping`] and renders a mapping back into a
//! whole document. There is no incremental patching.

use std::fmt;
use std::path::Path;

use serde_json::Value;

use crate::error::ConfigsError;
use crate::types::{Mapping, StoreType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Yaml,
    Json,
    #[cfg(feature = "toml")]
    Toml,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Yaml => "YAML",
            Format::Json => "JSON",
            #[cfg(feature = "toml")]
            Format::Toml => "TOML",
        };
        f.write_str(name)
    }
}

impl Format {
    /// Pick the format for `path`. The hint takes precedence over the extension.
    pub fn detect(path: &Path, hint: StoreType) -> Result<Format, ConfigsError> {
        let detected = match hint {
            StoreType::Yaml => Some(Format::Yaml),
            StoreType::Json => Some(Format::Json),
            #[cfg(feature = "toml")]
            StoreType::Toml => Some(Format::Toml),
            StoreType::Auto => Format::from_extension(path),
        };
        detected.ok_or_else(|| ConfigsError::StoreDetectionFailed {
            path: path.to_path_buf(),
        })
    }

    /// Infer the format from the file extension alone.
    pub fn from_extension(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            #[cfg(feature = "toml")]
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    /// Parse a whole document. Blank documents and a null top level both
    /// yield an empty mapping.
    pub fn parse(self, content: &str, path: &Path) -> Result<Mapping, ConfigsError> {
        if content.trim().is_empty() {
            return Ok(Mapping::new());
        }

        let parse_err = |reason: String| ConfigsError::ParseError {
            path: path.to_path_buf(),
            format: self,
            reason,
        };

        let document = match self {
            Format::Yaml => {
                let raw: serde_yaml::Value =
                    serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
                yaml_to_json(raw, "")?
            }
            Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?,
            #[cfg(feature = "toml")]
            Format::Toml => {
                let table: toml::Table =
                    toml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
                check_toml_floats(&table, "")?;
                serde_json::to_value(table).map_err(|e| parse_err(e.to_string()))?
            }
        };

        match document {
            Value::Null => Ok(Mapping::new()),
            Value::Object(map) => Ok(map),
            other => Err(ConfigsError::InvalidDocument {
                path: path.to_path_buf(),
                reason: format!("top level must be a mapping, found {}", kind_of(&other)),
            }),
        }
    }

    /// Render a mapping as a whole document.
    pub fn render(self, data: &Mapping, path: &Path) -> Result<String, ConfigsError> {
        let render_err = |reason: String| ConfigsError::RenderError {
            path: path.to_path_buf(),
            format: self,
            reason,
        };

        match self {
            Format::Yaml => serde_yaml::to_string(data).map_err(|e| render_err(e.to_string())),
            Format::Json => serde_json::to_string_pretty(data)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| render_err(e.to_string())),
            #[cfg(feature = "toml")]
            Format::Toml => toml::to_string(data).map_err(|e| render_err(e.to_string())),
        }
    }
}

/// Convert a YAML value into the crate's value model. `key` is the dotted
/// path of `value` within the document.
///
/// YAML allows any value as a mapping key; only string keys are accepted.
/// Non-finite floats have no JSON form and are rejected. Tags are dropped.
fn yaml_to_json(value: serde_yaml::Value, key: &str) -> Result<Value, ConfigsError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                finite_number(n.as_f64(), key)?
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(seq) => Value::Array(
            seq.into_iter()
                .map(|item| yaml_to_json(item, key))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(map) => {
            let mut out = Mapping::new();
            for (k, val) in map {
                let k = match k {
                    Yaml::String(s) => s,
                    other => {
                        return Err(ConfigsError::invalid_key(
                            describe_yaml_key(&other),
                            "mapping keys must be strings",
                        ));
                    }
                };
                let value = yaml_to_json(val, &child_key(key, &k))?;
                out.insert(k, value);
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value, key)?,
    })
}

fn finite_number(value: Option<f64>, key: &str) -> Result<Value, ConfigsError> {
    match value {
        Some(f) if f.is_finite() => Ok(Value::from(f)),
        Some(f) => Err(non_finite(f, key)),
        None => Err(ConfigsError::InvalidValue {
            key: key.into(),
            reason: "number out of range".into(),
        }),
    }
}

fn non_finite(f: f64, key: &str) -> ConfigsError {
    ConfigsError::InvalidValue {
        key: key.into(),
        reason: format!("{f} has no portable representation"),
    }
}

fn child_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// TOML accepts `inf`/`nan`, which JSON values would silently turn into null.
#[cfg(feature = "toml")]
fn check_toml_floats(table: &toml::Table, parent: &str) -> Result<(), ConfigsError> {
    fn check(value: &toml::Value, key: &str) -> Result<(), ConfigsError> {
        match value {
            toml::Value::Float(f) if !f.is_finite() => Err(non_finite(*f, key)),
            toml::Value::Array(items) => items.iter().try_for_each(|item| check(item, key)),
            toml::Value::Table(table) => check_toml_floats(table, key),
            _ => Ok(()),
        }
    }

    table
        .iter()
        .try_for_each(|(k, value)| check(value, &child_key(parent, k)))
}

fn describe_yaml_key(key: &serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::Null => "null".into(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::String(s) => s.clone(),
        Yaml::Sequence(_) => "<sequence>".into(),
        Yaml::Mapping(_) => "<mapping>".into(),
        Yaml::Tagged(t) => describe_yaml_key(&t.value),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
