//! Derived views and upward propagation.
//!
//! A [`SubDict`] is a detached snapshot of one subtree, for reading.
//!
//! A [`SubDictMut`] is a writable view. Besides its own flattened data it
//! holds the chain of its ancestors, root first. Each link is a [`Level`]:
//! the ancestor's flattened data (borrowed from the root or from a live
//! parent view, or an owned snapshot for an intermediate path segment nobody
//! else holds) plus the segment leading one level down. Links only point
//! upward, and only as `&mut` borrows, so the borrow checker guarantees that
//! nothing else touches the chain while the view is alive.
//!
//! After a write lands in the view's own data, [`SubDictMut::propagate`]
//! walks the chain from the nearest ancestor up to the root. At each level
//! it rebuilds the ancestor's nested form, swaps in the child's current
//! subtree under the connecting segment, and re-flattens the ancestor. Once
//! the root is rebuilt its nested form is saved to the store, if any.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::dict::{Configs, ConfigsDict, Resolved, join_prefix, resolve, write_listing};
use crate::error::ConfigsError;
use crate::flatten::{flatten, flatten_at};
use crate::nest::{merge_entries, subtree, unflatten, validate_key};
use crate::store::Store;
use crate::types::{Flat, Item};

/// A read-only snapshot of a subtree. It has no parent and no store; it does
/// not see later changes to the view it was derived from.
#[derive(Debug, Clone)]
pub struct SubDict {
    prefix: String,
    configs: Flat,
}

impl SubDict {
    pub(crate) fn new(prefix: String, configs: Flat) -> Self {
        Self { prefix, configs }
    }

    /// Turn the snapshot into a detached root with no store.
    pub fn into_root(self) -> ConfigsDict {
        ConfigsDict::from_parts(self.configs, None)
    }
}

impl Configs for SubDict {
    fn flattened(&self) -> &Flat {
        &self.configs
    }

    fn prefix(&self) -> String {
        self.prefix.clone()
    }
}

impl PartialEq for SubDict {
    fn eq(&self, other: &Self) -> bool {
        self.as_mapping() == other.as_mapping()
    }
}

impl Serialize for SubDict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_mapping().serialize(serializer)
    }
}

impl fmt::Display for SubDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_listing(f, &self.configs)
    }
}

/// Flattened data of one level: borrowed from whoever owns it, or owned by
/// the view chain itself.
#[derive(Debug)]
enum Slot<'a> {
    Held(&'a mut Flat),
    Owned(Flat),
}

impl Slot<'_> {
    fn get(&self) -> &Flat {
        match self {
            Slot::Held(flat) => flat,
            Slot::Owned(flat) => flat,
        }
    }

    fn get_mut(&mut self) -> &mut Flat {
        match self {
            Slot::Held(flat) => flat,
            Slot::Owned(flat) => flat,
        }
    }
}

/// One ancestor in a view's chain.
#[derive(Debug)]
struct Level<'a> {
    configs: Slot<'a>,
    /// Segment under which the next level down lives.
    segment: String,
}

/// A writable view of a subtree. Writes update the view, every ancestor up
/// to the root, and finally the root's store.
#[derive(Debug)]
pub struct SubDictMut<'a> {
    levels: Vec<Level<'a>>,
    configs: Slot<'a>,
    store: Option<&'a mut Box<dyn Store>>,
}

impl<'a> SubDictMut<'a> {
    /// A handle on the root's own data; it has no ancestors.
    pub(crate) fn root(configs: &'a mut Flat, store: Option<&'a mut Box<dyn Store>>) -> Self {
        Self {
            levels: Vec::new(),
            configs: Slot::Held(configs),
            store,
        }
    }

    /// Descend along `key`, one level per segment. The current view becomes
    /// the nearest ancestor of the new one; intermediate segments get owned
    /// snapshot levels. `key` must already be validated.
    pub(crate) fn into_derived(self, key: &str) -> SubDictMut<'a> {
        let SubDictMut {
            mut levels,
            configs,
            store,
        } = self;

        let mut own = configs;
        for segment in key.split('.') {
            let child = subtree(own.get(), segment);
            levels.push(Level {
                configs: own,
                segment: segment.to_string(),
            });
            own = Slot::Owned(child);
        }

        SubDictMut {
            levels,
            configs: own,
            store,
        }
    }

    /// The same view with every link re-borrowed from `self`, so a derived
    /// child can be made without giving `self` up.
    fn reborrow(&mut self) -> SubDictMut<'_> {
        SubDictMut {
            levels: self
                .levels
                .iter_mut()
                .map(|level| Level {
                    configs: Slot::Held(level.configs.get_mut()),
                    segment: level.segment.clone(),
                })
                .collect(),
            configs: Slot::Held(self.configs.get_mut()),
            store: self.store.as_deref_mut(),
        }
    }

    /// Derive a writable view of the subtree at `key`, chained to this one.
    pub fn subdict_mut(&mut self, key: &str) -> Result<SubDictMut<'_>, ConfigsError> {
        validate_key(key)?;
        Ok(self.reborrow().into_derived(key))
    }

    /// Strict keyed read handing out writable views for subtrees.
    pub fn lookup_mut(&mut self, key: &str) -> Result<Item<SubDictMut<'_>>, ConfigsError> {
        Ok(match resolve(self.configs.get(), key)? {
            Resolved::Terminal(value) => Item::Value(value),
            Resolved::Subtree(_) => Item::Dict(self.reborrow().into_derived(key)),
        })
    }

    /// Set `key` to `value` in this view and propagate to the root.
    ///
    /// The value is flattened (and its map keys validated) before anything
    /// is touched, so a rejected value leaves every level unchanged.
    pub fn set<V: Serialize>(&mut self, key: &str, value: V) -> Result<(), ConfigsError> {
        validate_key(key)?;
        let entries = flatten_at(key, &value)?;
        merge_entries(self.configs.get_mut(), entries);
        self.propagate()
    }

    /// Remove `key` from this view, propagate, and hand back what was there.
    /// A removed subtree comes back as a detached root with no store.
    pub fn pop(&mut self, key: &str) -> Result<Item<ConfigsDict>, ConfigsError> {
        validate_key(key)?;
        let removed = match key.rsplit_once('.') {
            None => self.pop_here(key, key)?,
            Some((container, leaf)) => self.subdict_mut(container)?.pop_here(leaf, key)?,
        };
        Ok(match removed {
            Value::Object(map) => Item::Dict(ConfigsDict::from_data(&map)?),
            other => Item::Value(other),
        })
    }

    /// Like [`pop`](Self::pop), returning `default` when the key is missing.
    pub fn pop_or<V: Into<Value>>(
        &mut self,
        key: &str,
        default: V,
    ) -> Result<Item<ConfigsDict>, ConfigsError> {
        match self.pop(key) {
            Err(e) if e.is_key_not_found() => Ok(Item::Value(default.into())),
            other => other,
        }
    }

    pub fn remove(&mut self, key: &str) -> Result<(), ConfigsError> {
        self.pop(key).map(|_| ())
    }

    /// Save the root's current nested form to the root's store.
    pub fn save(&mut self) -> Result<(), ConfigsError> {
        let root = match self.levels.first() {
            Some(level) => level.configs.get(),
            None => self.configs.get(),
        };
        let data = unflatten(root);
        if let Some(store) = self.store.as_deref_mut() {
            store.save(&data)?;
        }
        Ok(())
    }

    /// Remove the direct child `segment`; `full_key` names it in errors.
    fn pop_here(&mut self, segment: &str, full_key: &str) -> Result<Value, ConfigsError> {
        let mut nested = unflatten(self.configs.get());
        let removed = nested
            .remove(segment)
            .ok_or_else(|| ConfigsError::KeyNotFound(full_key.into()))?;
        *self.configs.get_mut() = flatten(&nested)?;
        self.propagate()?;
        Ok(removed)
    }

    /// Rebuild every ancestor from the current state of its child, nearest
    /// first, then save the root.
    fn propagate(&mut self) -> Result<(), ConfigsError> {
        let mut child = self.configs.get().clone();
        for level in self.levels.iter_mut().rev() {
            let mut nested = unflatten(level.configs.get());
            nested.insert(level.segment.clone(), Value::Object(unflatten(&child)));
            child = flatten(&nested)?;
            tracing::trace!(
                segment = %level.segment,
                entries = child.len(),
                "rebuilt ancestor"
            );
            *level.configs.get_mut() = child.clone();
        }
        self.save()
    }
}

impl Configs for SubDictMut<'_> {
    fn flattened(&self) -> &Flat {
        self.configs.get()
    }

    fn prefix(&self) -> String {
        self.levels.iter().fold(String::new(), |prefix, level| {
            join_prefix(&prefix, &level.segment)
        })
    }
}

impl Serialize for SubDictMut<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_mapping().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{mapping, nested_sample};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn sample() -> ConfigsDict {
        ConfigsDict::from_data(&nested_sample()).unwrap()
    }

    fn stored(dict: &ConfigsDict) -> Value {
        Value::Object(dict.store().unwrap().load().unwrap())
    }

    #[test]
    fn subdict_snapshot_is_relative() {
        let dict = sample();
        let view = dict.subdict("a.a").unwrap();
        assert_eq!(view.prefix(), "a.a");
        assert_eq!(view.len(), 2);
        assert_eq!(view.value("a.a.a").unwrap(), json!(1));

        let deeper = view.subdict("a").unwrap();
        assert_eq!(deeper.prefix(), "a.a.a");
    }

    #[test]
    fn subdict_of_missing_path_is_empty() {
        let dict = sample();
        assert!(dict.subdict("zz").unwrap().is_empty());
        assert!(dict.subdict("b").unwrap().is_empty());
    }

    #[test]
    fn repeated_derivation_is_value_equal() {
        let dict = sample();
        assert_eq!(dict.subdict("a").unwrap(), dict.subdict("a").unwrap());
    }

    #[test]
    fn snapshot_into_root_is_detached() {
        let dict = sample();
        let root = dict.subdict("a").unwrap().into_root();
        assert!(root.store().is_none());
        assert_eq!(root.value("b").unwrap(), json!(10));
    }

    #[test]
    fn child_set_propagates_to_root() {
        let mut dict = sample();
        dict.set("x", json!({"y": 1})).unwrap();
        dict.subdict_mut("x").unwrap().set("y", 2).unwrap();
        assert_eq!(dict.value("x.y").unwrap(), json!(2));
    }

    #[test]
    fn child_prefix_and_reads() {
        let mut dict = sample();
        let child = dict.subdict_mut("a.a").unwrap();
        assert_eq!(child.prefix(), "a.a");
        assert_eq!(child.value("a.a.b").unwrap(), json!(2));
        assert_eq!(
            Value::Object(child.as_mapping()),
            json!({"a": {"a": {"a": 1, "b": 2}}})
        );
    }

    #[test]
    fn deep_child_set_rebuilds_every_level() {
        let mut dict = ConfigsDict::with_store(Box::new(MemoryStore::new())).unwrap();
        dict.set("b", 2).unwrap();
        {
            let mut deep = dict.subdict_mut("a.a.a").unwrap();
            deep.set("c", json!({"d": true})).unwrap();
            deep.set("e", 1).unwrap();
        }
        let expected = json!({"a": {"a": {"a": {"c": {"d": true}, "e": 1}}}, "b": 2});
        assert_eq!(Value::Object(dict.as_mapping()), expected);
        assert_eq!(stored(&dict), expected);
    }

    #[test]
    fn chained_views_keep_parent_in_sync() {
        let mut dict = sample();
        let mut outer = dict.subdict_mut("a").unwrap();
        {
            let mut inner = outer.subdict_mut("a.a").unwrap();
            inner.set("a.c", 3).unwrap();
            assert_eq!(inner.prefix(), "a.a.a");
        }
        assert_eq!(outer.value("a.a.a.c").unwrap(), json!(3));
        outer.set("b", 11).unwrap();
        assert_eq!(dict.value("a.a.a.a.c").unwrap(), json!(3));
        assert_eq!(dict.value("a.b").unwrap(), json!(11));
    }

    #[test]
    fn lookup_mut_hands_out_writable_views() {
        let mut dict = sample();
        assert_eq!(dict.lookup_mut("b").unwrap().as_value(), Some(&json!(2)));
        match dict.lookup_mut("a").unwrap() {
            Item::Dict(mut view) => view.set("b", 20).unwrap(),
            Item::Value(v) => panic!("expected a view, got {v}"),
        }
        assert_eq!(dict.value("a.b").unwrap(), json!(20));
        assert!(dict.lookup_mut("nope").unwrap_err().is_key_not_found());
    }

    #[test]
    fn child_pop_propagates_and_detaches() {
        let mut dict = ConfigsDict::with_store(Box::new(MemoryStore::with_data(mapping(
            nested_sample(),
        ))))
        .unwrap();
        let popped = {
            let mut child = dict.subdict_mut("a").unwrap();
            child.pop("a.a").unwrap()
        };
        let popped = popped.into_dict().unwrap();
        assert_eq!(Value::Object(popped.as_mapping()), json!({"a": {"a": 1, "b": 2}}));

        let expected = json!({"a": {"a": {}, "b": 10}, "b": 2});
        let expected = Value::Object(unflatten(&flatten(&expected).unwrap()));
        assert_eq!(Value::Object(dict.as_mapping()), expected);
        assert_eq!(stored(&dict), expected);
    }

    #[test]
    fn emptied_child_disappears_from_parent() {
        let mut dict = ConfigsDict::new();
        dict.set("a.b.c", 1).unwrap();
        dict.set("z", 0).unwrap();
        dict.subdict_mut("a.b").unwrap().remove("c").unwrap();
        assert_eq!(Value::Object(dict.as_mapping()), json!({"z": 0}));
    }

    #[test]
    fn child_pop_missing_changes_nothing() {
        let mut dict = sample();
        let err = dict.subdict_mut("a").unwrap().pop("nope.x").unwrap_err();
        assert!(matches!(err, ConfigsError::KeyNotFound(ref k) if k == "nope.x"));
        assert_eq!(dict, sample());
    }

    #[test]
    fn writing_into_empty_view_creates_the_path() {
        let mut dict = ConfigsDict::new();
        dict.subdict_mut("new.section").unwrap().set("k", "v").unwrap();
        assert_eq!(dict.value("new.section.k").unwrap(), json!("v"));
    }

    #[test]
    fn rejected_value_leaves_chain_untouched() {
        let mut dict = sample();
        let mut bad = std::collections::HashMap::new();
        bad.insert(true, 1);
        let err = dict.subdict_mut("a").unwrap().set("q", &bad).unwrap_err();
        assert!(matches!(err, ConfigsError::InvalidKeyFormat { .. }));
        assert_eq!(dict, sample());
    }

    #[test]
    fn view_save_without_store_is_noop() {
        let mut dict = sample();
        dict.subdict_mut("a").unwrap().save().unwrap();
        assert_eq!(dict, sample());
    }
}
