use std::path::PathBuf;

use crate::dict::ConfigsDict;
use crate::error::ConfigsError;
use crate::file;
use crate::flatten::flatten;
use crate::merge::deep_merge;
use crate::store::{FileStore, Store};
use crate::types::{Mapping, StoreType};

const DEFAULT_FILE_NAME: &str = "configs.yml";

/// Entry point for file-backed configs with defaults.
pub struct SimpleConfigs;

impl SimpleConfigs {
    pub fn builder() -> SimpleConfigsBuilder {
        SimpleConfigsBuilder::new()
    }

    /// Open `path` with the format taken from its extension and no defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<ConfigsDict, ConfigsError> {
        Self::builder().file(path).open()
    }
}

/// Where default values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Defaults {
    Mapping(Mapping),
    /// Another store file; its format is detected from the extension.
    File(PathBuf),
}

/// Builder for a root [`ConfigsDict`] bound to a [`FileStore`].
///
/// Location is picked in this order:
///
/// - [`file()`](Self::file): an explicit path.
/// - [`app_name()`](Self::app_name): `{file_name}` in the platform config
///   directory for the app, created if missing.
/// - otherwise `{file_name}` relative to the current directory.
///
/// On [`open()`](Self::open) stored values are loaded, defaults are
/// deep-merged underneath them (stored values always win), and the merged
/// result is written back before the root view is returned.
#[derive(Debug, Clone)]
pub struct SimpleConfigsBuilder {
    file: Option<PathBuf>,
    app_name: Option<String>,
    file_name: Option<String>,
    store_type: StoreType,
    defaults: Option<Defaults>,
}

impl SimpleConfigsBuilder {
    fn new() -> Self {
        Self {
            file: None,
            app_name: None,
            file_name: None,
            store_type: StoreType::default(),
            defaults: None,
        }
    }

    /// Use an explicit file path.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Store the file in the platform config directory for `name`.
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// Override the file name (default: `"configs.yml"`). Ignored when an
    /// explicit [`file()`](Self::file) is set.
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    /// Force a format instead of detecting it from the extension.
    pub fn store_type(mut self, store_type: StoreType) -> Self {
        self.store_type = store_type;
        self
    }

    /// Literal default values.
    pub fn defaults(mut self, defaults: Mapping) -> Self {
        self.defaults = Some(Defaults::Mapping(defaults));
        self
    }

    /// Read default values from another store file.
    pub fn defaults_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.defaults = Some(Defaults::File(path.into()));
        self
    }

    fn resolve_path(&self) -> Result<PathBuf, ConfigsError> {
        if let Some(path) = &self.file {
            return Ok(path.clone());
        }
        let file_name = self.file_name.as_deref().unwrap_or(DEFAULT_FILE_NAME);
        match &self.app_name {
            Some(app) => file::platform_config_path(app, file_name),
            None => Ok(PathBuf::from(file_name)),
        }
    }

    fn load_defaults(&self) -> Result<Mapping, ConfigsError> {
        match &self.defaults {
            None => Ok(Mapping::new()),
            Some(Defaults::Mapping(map)) => Ok(map.clone()),
            Some(Defaults::File(path)) => FileStore::open(path, StoreType::Auto)?.load(),
        }
    }

    /// Load, merge defaults, write back, and hand out the root view.
    pub fn open(self) -> Result<ConfigsDict, ConfigsError> {
        let path = self.resolve_path()?;
        let mut store = FileStore::open(&path, self.store_type)?;

        let defaults = self.load_defaults()?;
        let stored = store.load()?;
        let merged = deep_merge(defaults, stored);

        // Validate keys before anything is written.
        let configs = flatten(&merged)?;
        store.save(&merged)?;
        tracing::debug!(
            path = %path.display(),
            format = %store.format(),
            entries = configs.len(),
            "opened simple configs"
        );

        Ok(ConfigsDict::from_parts(configs, Some(Box::new(store))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::Configs;
    use crate::fixtures::test::mapping;
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn creates_file_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configs.yml");
        let dict = SimpleConfigs::open(&path).unwrap();
        assert!(dict.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn defaults_fill_missing_keys_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configs.yml");
        fs::write(&path, "db:\n  port: 6543\nname: mine\n").unwrap();

        let dict = SimpleConfigs::builder()
            .file(&path)
            .defaults(mapping(json!({
                "db": {"port": 5432, "host": "localhost"},
                "name": "default",
                "debug": false
            })))
            .open()
            .unwrap();

        let expected = json!({
            "db": {"port": 6543, "host": "localhost"},
            "name": "mine",
            "debug": false
        });
        assert_eq!(Value::Object(dict.as_mapping()), expected);
        let on_disk = FileStore::open(&path, StoreType::Auto).unwrap().load().unwrap();
        assert_eq!(Value::Object(on_disk), expected);
    }

    #[test]
    fn defaults_from_file() {
        let dir = TempDir::new().unwrap();
        let defaults = dir.path().join("defaults.json");
        fs::write(&defaults, r#"{"theme": "dark", "size": 12}"#).unwrap();
        let path = dir.path().join("user.yaml");
        fs::write(&path, "size: 14\n").unwrap();

        let dict = SimpleConfigs::builder()
            .file(&path)
            .defaults_file(&defaults)
            .open()
            .unwrap();
        assert_eq!(dict.value("theme").unwrap(), json!("dark"));
        assert_eq!(dict.value("size").unwrap(), json!(14));
    }

    #[test]
    fn explicit_store_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.cfg");
        let mut dict = SimpleConfigs::builder()
            .file(&path)
            .store_type(StoreType::Json)
            .open()
            .unwrap();
        dict.set("a.b", 1).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, json!({"a": {"b": 1}}));
    }

    #[test]
    fn undetectable_format_fails() {
        let dir = TempDir::new().unwrap();
        let err = SimpleConfigs::open(dir.path().join("settings.cfg")).unwrap_err();
        assert!(matches!(err, ConfigsError::StoreDetectionFailed { .. }));
    }

    #[test]
    fn mutations_reach_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configs.yml");
        let mut dict = SimpleConfigs::open(&path).unwrap();
        dict.set("window", json!({"width": 800, "height": 600})).unwrap();
        dict.subdict_mut("window").unwrap().set("width", 1024).unwrap();

        let reopened = SimpleConfigs::open(&path).unwrap();
        assert_eq!(reopened, dict);
        assert_eq!(reopened.value("window.width").unwrap(), json!(1024));
    }

    #[test]
    fn default_location_uses_file_name() {
        let builder = SimpleConfigs::builder();
        assert_eq!(builder.resolve_path().unwrap(), PathBuf::from("configs.yml"));
        let builder = SimpleConfigs::builder().file_name("app.json");
        assert_eq!(builder.resolve_path().unwrap(), PathBuf::from("app.json"));
    }
}
