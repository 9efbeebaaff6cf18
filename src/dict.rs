//! Dot-addressable views over flattened configuration data.
//!
//! Every view keeps its own [`Flat`] mapping, keyed relative to the view's
//! prefix. The root [`ConfigsDict`] owns its data and, optionally, the
//! [`Store`] the data is mirrored to. Derived views are made on demand and
//! never cached; see [`view`](crate::view) for how their mutations travel
//! back up to the root.

use std::collections::btree_map;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ConfigsError;
use crate::flatten::flatten;
use crate::nest::{subtree, unflatten, validate_key};
use crate::store::Store;
use crate::types::{Flat, Item, Mapping};
use crate::view::{SubDict, SubDictMut};

/// What a dotted key points at inside a flattened mapping.
pub(crate) enum Resolved {
    Terminal(Value),
    Subtree(Flat),
}

/// Resolve `key` against `flat`: a terminal stored under the exact key
/// wins, otherwise the entries sharing `key.` as prefix form a subtree. A
/// key that is neither fails with `KeyNotFound`.
pub(crate) fn resolve(flat: &Flat, key: &str) -> Result<Resolved, ConfigsError> {
    validate_key(key)?;
    if let Some(value) = flat.get(key) {
        return Ok(Resolved::Terminal(value.clone()));
    }
    let sub = subtree(flat, key);
    if sub.is_empty() {
        return Err(ConfigsError::KeyNotFound(key.into()));
    }
    Ok(Resolved::Subtree(sub))
}

pub(crate) fn join_prefix(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Read access shared by the root and every derived view.
///
/// All keys are dotted paths relative to the view. Reads never mutate and
/// never touch the store.
pub trait Configs {
    /// The view's own flattened entries.
    fn flattened(&self) -> &Flat;

    /// Full dotted path from the root to this view; empty for the root.
    fn prefix(&self) -> String;

    fn len(&self) -> usize {
        self.flattened().len()
    }

    fn is_empty(&self) -> bool {
        self.flattened().is_empty()
    }

    /// Iterate over the view's flattened `(key, value)` pairs. Subtrees are
    /// not expanded: their entries show up under dotted keys.
    fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.flattened().iter()
    }

    /// Rebuild the nested mapping this view stands for.
    fn as_mapping(&self) -> Mapping {
        unflatten(self.flattened())
    }

    /// Derive a snapshot view of the subtree at `key`. The view is empty when
    /// nothing lives below `key`.
    fn subdict(&self, key: &str) -> Result<SubDict, ConfigsError> {
        validate_key(key)?;
        Ok(SubDict::new(
            join_prefix(&self.prefix(), key),
            subtree(self.flattened(), key),
        ))
    }

    /// Strict keyed read. Terminals come back as values, subtrees as
    /// [`SubDict`] views; a missing key is an error.
    fn lookup(&self, key: &str) -> Result<Item<SubDict>, ConfigsError> {
        Ok(match resolve(self.flattened(), key)? {
            Resolved::Terminal(value) => Item::Value(value),
            Resolved::Subtree(sub) => {
                Item::Dict(SubDict::new(join_prefix(&self.prefix(), key), sub))
            }
        })
    }

    /// Like [`lookup`](Self::lookup), with a missing key read as `None`.
    fn get_item(&self, key: &str) -> Result<Option<Item<SubDict>>, ConfigsError> {
        match self.lookup(key) {
            Ok(item) => Ok(Some(item)),
            Err(e) if e.is_key_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Strict keyed read with subtrees rendered as nested mappings.
    fn value(&self, key: &str) -> Result<Value, ConfigsError> {
        Ok(match resolve(self.flattened(), key)? {
            Resolved::Terminal(value) => value,
            Resolved::Subtree(sub) => Value::Object(unflatten(&sub)),
        })
    }

    /// Keyed read with subtrees rendered as nested mappings; `None` when the
    /// key is missing. Malformed keys are still an error.
    fn get(&self, key: &str) -> Result<Option<Value>, ConfigsError> {
        match self.value(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_key_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Keyed read falling back to `default` when the key is missing.
    fn get_or<V: Into<Value>>(&self, key: &str, default: V) -> Result<Value, ConfigsError> {
        Ok(self.get(key)?.unwrap_or_else(|| default.into()))
    }

    /// Keyed read deserialized into `T`; `None` when the key is missing.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigsError> {
        self.get(key)?
            .map(|value| {
                serde_json::from_value(value).map_err(|e| ConfigsError::InvalidValue {
                    key: key.into(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    fn contains_key(&self, key: &str) -> Result<bool, ConfigsError> {
        validate_key(key)?;
        let flat = self.flattened();
        Ok(flat.contains_key(key) || !subtree(flat, key).is_empty())
    }
}

/// The root of a configuration hierarchy, optionally bound to a [`Store`].
///
/// Every successful `set`/`pop`/`remove`, whether made here or through a
/// derived [`SubDictMut`], ends with the root's nested form being saved to
/// the store.
#[derive(Debug, Default)]
pub struct ConfigsDict {
    configs: Flat,
    store: Option<Box<dyn Store>>,
}

impl ConfigsDict {
    /// An empty root with no store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A root seeded from any mapping-like value, with no store.
    pub fn from_data<S: Serialize + ?Sized>(data: &S) -> Result<Self, ConfigsError> {
        Ok(Self {
            configs: flatten(data)?,
            store: None,
        })
    }

    /// A root whose state is loaded from `store`.
    pub fn with_store(store: Box<dyn Store>) -> Result<Self, ConfigsError> {
        let configs = flatten(&store.load()?)?;
        tracing::debug!(entries = configs.len(), "loaded configs from store");
        Ok(Self {
            configs,
            store: Some(store),
        })
    }

    /// A root seeded from `data` and bound to `store`.
    ///
    /// When the store already holds data it must equal `data` once both are
    /// flattened; otherwise construction fails with `DataConflict` rather
    /// than picking a side. On success `data` is saved to the store.
    pub fn from_data_with_store<S: Serialize + ?Sized>(
        data: &S,
        store: Box<dyn Store>,
    ) -> Result<Self, ConfigsError> {
        let configs = flatten(data)?;
        if !store.is_empty()? && flatten(&store.load()?)? != configs {
            tracing::debug!("initial data conflicts with stored data");
            return Err(ConfigsError::DataConflict);
        }
        let mut dict = Self {
            configs,
            store: Some(store),
        };
        dict.save()?;
        Ok(dict)
    }

    pub(crate) fn from_parts(configs: Flat, store: Option<Box<dyn Store>>) -> Self {
        Self { configs, store }
    }

    pub fn store(&self) -> Option<&dyn Store> {
        self.store.as_deref()
    }

    /// Push the current nested form to the store. No-op without a store.
    pub fn save(&mut self) -> Result<(), ConfigsError> {
        if let Some(store) = self.store.as_mut() {
            store.save(&unflatten(&self.configs))?;
        }
        Ok(())
    }

    /// Set `key` to `value`. Mapping values are spread into dotted entries
    /// and merged with what is already there.
    pub fn set<V: Serialize>(&mut self, key: &str, value: V) -> Result<(), ConfigsError> {
        self.as_view_mut().set(key, value)
    }

    /// Remove `key` and hand back what was there. A removed subtree comes
    /// back as a detached root with no store.
    pub fn pop(&mut self, key: &str) -> Result<Item<ConfigsDict>, ConfigsError> {
        self.as_view_mut().pop(key)
    }

    /// Like [`pop`](Self::pop), returning `default` when the key is missing.
    pub fn pop_or<V: Into<Value>>(
        &mut self,
        key: &str,
        default: V,
    ) -> Result<Item<ConfigsDict>, ConfigsError> {
        self.as_view_mut().pop_or(key, default)
    }

    pub fn remove(&mut self, key: &str) -> Result<(), ConfigsError> {
        self.as_view_mut().remove(key)
    }

    /// Derive a mutable view of the subtree at `key` (empty if nothing lives
    /// there yet). Writes through the view propagate back to this root.
    pub fn subdict_mut(&mut self, key: &str) -> Result<SubDictMut<'_>, ConfigsError> {
        validate_key(key)?;
        Ok(self.as_view_mut().into_derived(key))
    }

    /// Strict keyed read handing out mutable views for subtrees.
    pub fn lookup_mut(&mut self, key: &str) -> Result<Item<SubDictMut<'_>>, ConfigsError> {
        Ok(match resolve(&self.configs, key)? {
            Resolved::Terminal(value) => Item::Value(value),
            Resolved::Subtree(_) => Item::Dict(self.as_view_mut().into_derived(key)),
        })
    }

    pub fn into_mapping(self) -> Mapping {
        unflatten(&self.configs)
    }

    fn as_view_mut(&mut self) -> SubDictMut<'_> {
        SubDictMut::root(&mut self.configs, self.store.as_mut())
    }
}

impl Configs for ConfigsDict {
    fn flattened(&self) -> &Flat {
        &self.configs
    }

    fn prefix(&self) -> String {
        String::new()
    }
}

impl PartialEq for ConfigsDict {
    fn eq(&self, other: &Self) -> bool {
        self.as_mapping() == other.as_mapping()
    }
}

impl Serialize for ConfigsDict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_mapping().serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a ConfigsDict {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.iter()
    }
}

impl fmt::Display for ConfigsDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_listing(f, &self.configs)
    }
}

/// One `key = value` line per flattened entry.
pub(crate) fn write_listing(f: &mut fmt::Formatter<'_>, flat: &Flat) -> fmt::Result {
    for (i, (key, value)) in flat.iter().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        write!(f, "{key} = {}", format_value(value))?;
    }
    Ok(())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
