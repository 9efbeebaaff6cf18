//! Persistence media for root views.
//!
//! A [`Store`] loads a nested [`Mapping`], saves one back, and reports
//! whether it currently holds data. [`MemoryStore`] keeps the mapping in
//! process; [`FileStore`] mirrors it to a whole YAML/JSON/TOML file whose
//! [`Format`] is fixed when the store is opened.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigsError;
use crate::file;
use crate::format::Format;
use crate::types::{Mapping, StoreType};

pub trait Store: fmt::Debug {
    /// Load the stored mapping. An absent or blank medium loads as empty.
    fn load(&self) -> Result<Mapping, ConfigsError>;

    /// Replace the stored mapping entirely.
    fn save(&mut self, data: &Mapping) -> Result<(), ConfigsError>;

    fn is_empty(&self) -> Result<bool, ConfigsError> {
        Ok(self.load()?.is_empty())
    }
}

/// Process-local store; nothing outlives the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    data: Mapping,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: Mapping) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Mapping {
        &self.data
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<Mapping, ConfigsError> {
        Ok(self.data.clone())
    }

    fn save(&mut self, data: &Mapping) -> Result<(), ConfigsError> {
        self.data = data.clone();
        Ok(())
    }

    fn is_empty(&self) -> Result<bool, ConfigsError> {
        Ok(self.data.is_empty())
    }
}

/// A whole-file store in one of the supported [`Format`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStore {
    path: PathBuf,
    format: Format,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, format: Format) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Open a store at `path`, picking the format from `store_type` or, for
    /// [`StoreType::Auto`], from the file extension.
    pub fn open(path: impl Into<PathBuf>, store_type: StoreType) -> Result<Self, ConfigsError> {
        let path = path.into();
        let format = Format::detect(&path, store_type)?;
        tracing::debug!(path = %path.display(), %format, hint = %store_type, "opened file store");
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

impl Store for FileStore {
    fn load(&self) -> Result<Mapping, ConfigsError> {
        let Some(content) = file::read_optional(&self.path)? else {
            tracing::debug!(path = %self.path.display(), "store file absent, loading empty");
            return Ok(Mapping::new());
        };
        let data = self.format.parse(&content, &self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            format = %self.format,
            keys = data.len(),
            "loaded store file"
        );
        Ok(data)
    }

    fn save(&mut self, data: &Mapping) -> Result<(), ConfigsError> {
        let content = self.format.render(data, &self.path)?;
        file::write(&self.path, &content)?;
        tracing::debug!(
            path = %self.path.display(),
            format = %self.format,
            keys = data.len(),
            "saved store file"
        );
        Ok(())
    }
}

/// Open a file-backed store, boxed for attaching to a root view.
pub fn open_store(
    path: impl Into<PathBuf>,
    store_type: StoreType,
) -> Result<Box<dyn Store>, ConfigsError> {
    Ok(Box::new(FileStore::open(path, store_type)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::mapping;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn memory_store_starts_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty().unwrap());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn memory_store_save_replaces() {
        let mut store = MemoryStore::with_data(mapping(json!({"a": 1, "b": 2})));
        store.save(&mapping(json!({"c": 3}))).unwrap();
        assert_eq!(store.data(), &mapping(json!({"c": 3})));
        assert!(!store.is_empty().unwrap());
    }

    #[test]
    fn file_store_absent_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("configs.yml"), StoreType::Auto).unwrap();
        assert_eq!(store.format(), Format::Yaml);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn file_store_blank_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configs.json");
        fs::write(&path, "").unwrap();
        let store = FileStore::open(&path, StoreType::Auto).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn file_store_saves_and_loads_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configs.yaml");
        let mut store = FileStore::open(&path, StoreType::Auto).unwrap();
        let data = mapping(json!({"a": {"b": 1}, "name": "demo"}));
        store.save(&data).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("name: demo"));
        assert_eq!(store.load().unwrap(), data);
    }

    #[test]
    fn file_store_save_overwrites_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configs.json");
        fs::write(&path, r#"{"stale": true}"#).unwrap();
        let mut store = FileStore::open(&path, StoreType::Auto).unwrap();
        store.save(&mapping(json!({"fresh": 1}))).unwrap();
        assert_eq!(store.load().unwrap(), mapping(json!({"fresh": 1})));
    }

    #[test]
    fn explicit_store_type_beats_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configs.txt");
        let mut store = FileStore::open(&path, StoreType::Json).unwrap();
        store.save(&mapping(json!({"a": 1}))).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.trim_start().starts_with('{'));
    }

    #[test]
    fn undetectable_extension_fails_at_open() {
        let err = FileStore::open("configs.ini", StoreType::Auto).unwrap_err();
        assert!(matches!(err, ConfigsError::StoreDetectionFailed { .. }));
        assert!(open_store("configs", StoreType::Auto).is_err());
    }

    #[test]
    fn parse_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configs.json");
        fs::write(&path, "{not json").unwrap();
        let store = FileStore::open(&path, StoreType::Auto).unwrap();
        assert!(matches!(
            store.load().unwrap_err(),
            ConfigsError::ParseError { .. }
        ));
        assert!(store.is_empty().is_err());
    }

    #[test]
    fn save_into_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("configs.yml");
        let mut store = FileStore::open(&path, StoreType::Auto).unwrap();
        let err = store.save(&mapping(json!({"a": 1}))).unwrap_err();
        assert!(matches!(err, ConfigsError::IoError { .. }));
    }
}
