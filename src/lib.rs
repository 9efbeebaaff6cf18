//! Simply store, load and modify hierarchical user configurations.
//!
//! Configuration lives in a nested mapping, persisted as a plain YAML, JSON
//! or TOML file (or kept in memory). Any leaf can be addressed with a dotted
//! key such as `"window.size.width"`, however deep it sits.
//!
//! ```ignore
//! use scfg::{Configs, SimpleConfigs};
//!
//! let mut configs = SimpleConfigs::open("configs.yml")?;
//! configs.set("window.size.width", 1024)?;
//! let width = configs.get_as::<u32>("window.size.width")?;
//! ```
//!
//! # Flattened views
//!
//! Internally every view stores a *flattened* mapping: one entry per leaf,
//! keyed by the dot-joined path to it. `{"a": {"b": 1, "c": 2}}` is held as
//! `{"a.b": 1, "a.c": 2}`. A path is either a leaf or a subtree, never both;
//! setting a leaf over a subtree (or a subtree over a leaf) replaces it.
//!
//! [`as_mapping()`](Configs::as_mapping) rebuilds the nested form. Nested,
//! flattened and nested again gives back exactly what went in, except that
//! empty sub-mappings have no flattened form and disappear.
//!
//! # Reading
//!
//! The [`Configs`] trait is implemented by the root [`ConfigsDict`] and by
//! both kinds of derived view:
//!
//! - [`get()`](Configs::get) / [`get_or()`](Configs::get_or): value or
//!   nested mapping, `None`/default for missing keys.
//! - [`lookup()`](Configs::lookup): strict; subtrees come back as
//!   [`SubDict`] views that can be read further.
//! - [`get_as()`](Configs::get_as): deserialize into any `serde` type.
//! - [`iter()`](Configs::iter): the view's flattened `(key, value)` pairs.
//!
//! Only [`ConfigsError::KeyNotFound`] is ever turned into a default. A
//! malformed key (empty, or with an empty segment like `"a..b"`) is always
//! an error.
//!
//! # Writing and propagation
//!
//! [`ConfigsDict::set`] accepts any `Serialize` value; mappings and structs
//! are spread into dotted entries and merged with existing ones. Map keys
//! that are not strings are rejected with
//! [`InvalidKeyFormat`](ConfigsError::InvalidKeyFormat) before anything
//! changes.
//!
//! [`ConfigsDict::subdict_mut`] derives a writable [`SubDictMut`] for a
//! subtree. Writes through it update the view, then every ancestor up to the
//! root, then the root's store. Views are never cached: deriving the same
//! path twice gives two value-equal views.
//!
//! [`pop()`](ConfigsDict::pop) hands a removed subtree back as a fully
//! detached `ConfigsDict`: no parent, no store.
//!
//! # Stores
//!
//! A root view may be bound to a [`Store`]. [`MemoryStore`] keeps data in
//! process; [`FileStore`] rewrites a whole file on every save. The file
//! [`Format`] comes from an explicit [`StoreType`] or the file extension.
//! Saves are plain overwrites, not atomic renames.
//!
//! Binding initial data to a store that already holds *different* data is
//! refused with [`DataConflict`](ConfigsError::DataConflict).
//!
//! # SimpleConfigs
//!
//! [`SimpleConfigs`] opens a file-backed root in one call, optionally
//! filling in defaults (a literal mapping or another file) wherever the file
//! has no value of its own.
//!
//! # Logging
//!
//! Store loads and saves are reported as `tracing` debug events; the
//! library installs no subscriber.

pub mod error;
pub mod types;

mod builder;
mod dict;
mod file;
mod flatten;
mod format;
mod merge;
mod nest;
mod store;
mod view;

#[cfg(test)]
mod fixtures;

pub use builder::{Defaults, SimpleConfigs, SimpleConfigsBuilder};
pub use dict::{Configs, ConfigsDict};
pub use error::ConfigsError;
pub use flatten::{FlattenError, flatten, flatten_at};
pub use format::Format;
pub use merge::deep_merge;
pub use nest::{subtree, unflatten, validate_key};
pub use store::{FileStore, MemoryStore, Store, open_store};
pub use types::{Flat, Item, Mapping, StoreType};
pub use view::{SubDict, SubDictMut};
