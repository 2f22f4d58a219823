//! Settings resolution with layered merge
//!
//! Layers, later overriding earlier:
//!
//! 1. **Global** - `<config_dir>/spl/settings.yaml`
//! 2. **Project** - `settings.yaml` in the settings directory or its `config/`
//! 3. **Secrets** - `.secrets.yaml` next to it (optional)
//! 4. **Environment** - `SPL_<SECTION>__<KEY>` variables, `.env` included
//!
//! Every file may be split into `default`/`<env>`/`global` sections, the
//! active environment comes from `SPL_ENV`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use spl_fs::ConfigStore;
use tracing::debug;

use super::merge::{
    ENV_SELECTOR, deep_merge_value, env_overrides, normalize_keys, select_environment,
};
use super::settings::{REQUIRED_SECTIONS, Settings};
use crate::{Error, Result};

const SETTINGS_FILE: &str = "settings.yaml";
const SECRETS_FILE: &str = ".secrets.yaml";
const DEFAULT_ENVIRONMENT: &str = "development";

/// Loads [`Settings`] from a settings directory.
pub struct SettingsLoader {
    dir: PathBuf,

    /// Override for the global config directory (used for testing).
    /// When `None`, `dirs::config_dir()` is used.
    global_config_dir_override: Option<PathBuf>,

    /// Replaces the process environment when set.
    env_override: Option<Vec<(String, String)>>,
}

impl SettingsLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            global_config_dir_override: None,
            env_override: None,
        }
    }

    /// Use a custom global config directory instead of the platform one.
    pub fn with_global_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.global_config_dir_override = Some(dir.into());
        self
    }

    /// Read overrides from `vars` instead of the process environment.
    pub fn with_env<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env_override = Some(vars.into_iter().collect());
        self
    }

    fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.global_config_dir_override {
            return Some(override_dir.clone());
        }
        dirs::config_dir().map(|d| d.join("spl"))
    }

    fn find(&self, file: &str) -> Option<PathBuf> {
        [self.dir.join(file), self.dir.join("config").join(file)]
            .into_iter()
            .find(|p| p.is_file())
    }

    /// Variables from `.env` overlaid by the real environment.
    fn environment(&self) -> Result<BTreeMap<String, String>> {
        let mut vars = BTreeMap::new();

        let dotenv = self.dir.join(".env");
        if dotenv.is_file() {
            debug!(?dotenv, "Loading dotenv file");
            let iter = dotenvy::from_path_iter(&dotenv)
                .map_err(|e| Error::InvalidSettings(format!("{}: {e}", dotenv.display())))?;
            for item in iter {
                let (key, value) = item
                    .map_err(|e| Error::InvalidSettings(format!("{}: {e}", dotenv.display())))?;
                vars.insert(key, value);
            }
        }

        match &self.env_override {
            Some(env) => vars.extend(env.iter().cloned()),
            None => vars.extend(std::env::vars()),
        }
        Ok(vars)
    }

    /// Resolve all layers into validated settings.
    ///
    /// Missing optional layers are skipped; a missing `settings.yaml` is an
    /// error.
    pub fn load(&self) -> Result<Settings> {
        let vars = self.environment()?;
        let env = vars
            .get(ENV_SELECTOR)
            .map(|e| e.to_lowercase())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let settings_path = self.find(SETTINGS_FILE).ok_or_else(|| Error::ConfigNotFound {
            path: self.dir.join(SETTINGS_FILE),
        })?;

        let mut layers = Vec::new();
        if let Some(global_dir) = self.global_config_dir() {
            let global = global_dir.join(SETTINGS_FILE);
            if global.is_file() {
                layers.push(global);
            }
        }
        layers.push(settings_path);
        layers.extend(self.find(SECRETS_FILE));

        let store = ConfigStore::new();
        let mut merged = Value::Object(Map::new());
        for path in &layers {
            debug!(?path, %env, "Loading settings layer");
            let layer = read_layer(&store, path)?;
            deep_merge_value(&mut merged, &normalize_keys(select_environment(layer, &env)));
        }
        let overrides = env_overrides(vars, &merged);
        deep_merge_value(&mut merged, &overrides);

        let Value::Object(ref mut sections) = merged else {
            return Err(Error::InvalidSettings("settings must be a mapping".into()));
        };
        for section in REQUIRED_SECTIONS {
            match sections.get_mut(*section) {
                None => {
                    return Err(Error::InvalidSettings(format!(
                        "missing section '{section}'"
                    )));
                }
                Some(value @ Value::Null) => *value = Value::Object(Map::new()),
                Some(_) => {}
            }
        }

        let settings: Settings =
            serde_json::from_value(merged).map_err(|e| Error::InvalidSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

fn read_layer(store: &ConfigStore, path: &Path) -> Result<Value> {
    match store.load_value(path)? {
        Value::Null => Ok(Value::Object(Map::new())),
        value @ Value::Object(_) => Ok(value),
        _ => Err(Error::InvalidSettings(format!(
            "{} must contain a mapping",
            path.display()
        ))),
    }
}
