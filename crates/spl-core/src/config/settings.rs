//! Typed settings schema

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Password assigned to users that sync creates on a destination.
pub const DEFAULT_USER_PASSWORD: &str = "mySplunkDevDefaultP4ssw0rd!";

/// Sections every settings file set must provide.
pub const REQUIRED_SECTIONS: &[&str] = &["connections", "samples", "splunkbase", "docker", "apps"];

/// The merged settings of all layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub connections: BTreeMap<String, ConnectionConfig>,
    pub samples: BTreeMap<String, SampleConfig>,
    pub splunkbase: SplunkbaseConfig,
    pub docker: DockerConfig,
    pub apps: AppsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// A named Splunk management endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub token: Option<String>,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub verify_tls: bool,
    /// Permit `spl manager restart` against this instance
    #[serde(default)]
    pub allow_restart: bool,
}

fn default_scheme() -> String {
    "https".to_string()
}

/// A search whose results are stored as an event sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Connection the search runs against
    pub src: String,
    pub query: String,
    #[serde(deserialize_with = "lenient_string")]
    pub earliest: String,
    #[serde(deserialize_with = "lenient_string")]
    pub latest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplunkbaseConfig {
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_appinspect_uri")]
    pub appinspect_uri: String,
    /// Apps installable into the development container, keyed by name
    #[serde(default)]
    pub apps: BTreeMap<String, SplunkbaseApp>,
}

fn default_auth_uri() -> String {
    "https://api.splunk.com/2.0/rest/login/splunk".to_string()
}

fn default_appinspect_uri() -> String {
    "https://appinspect.splunk.com/v1/app".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplunkbaseApp {
    pub id: u32,
    #[serde(deserialize_with = "lenient_string")]
    pub version: String,
}

impl SplunkbaseApp {
    pub fn download_url(&self) -> String {
        format!(
            "https://splunkbase.splunk.com/app/{}/release/{}/download",
            self.id, self.version
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default)]
    pub socket: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_package_image")]
    pub package_image: String,
    /// Extra `KEY: value` environment of the development container
    #[serde(default, deserialize_with = "lenient_string_map")]
    pub environment: BTreeMap<String, String>,
}

fn default_image() -> String {
    "splunk/splunk:latest".to_string()
}

fn default_package_image() -> String {
    "nextpart/splunk-package:latest".to_string()
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: String::new(),
            image: default_image(),
            package_image: default_package_image(),
            environment: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppsConfig {
    /// Apps ignored when listing the container's apps
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_user_password")]
    pub default_user_password: String,
}

fn default_user_password() -> String {
    DEFAULT_USER_PASSWORD.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_user_password: default_user_password(),
        }
    }
}

// YAML and env overrides turn `password: 1234` or `version: 8.0` into numbers.
fn scalar_to_string<E: serde::de::Error>(value: Value) -> std::result::Result<String, E> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(E::custom(format!("expected a scalar, found {other}"))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    scalar_to_string(Value::deserialize(d)?)
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        other => scalar_to_string(other).map(Some),
    }
}

fn lenient_string_map<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error> {
    BTreeMap::<String, Value>::deserialize(d)?
        .into_iter()
        .map(|(k, v)| scalar_to_string(v).map(|v| (k, v)))
        .collect()
}

impl Settings {
    /// Look up a connection by name.
    pub fn connection(&self, name: &str) -> Result<&ConnectionConfig> {
        self.connections
            .get(name)
            .ok_or_else(|| Error::UnknownConnection {
                name: name.to_string(),
                valid: self.connection_names().join(", "),
            })
    }

    /// Connection names in sorted order.
    pub fn connection_names(&self) -> Vec<String> {
        self.connections.keys().cloned().collect()
    }

    /// Check the cross-field rules serde cannot express.
    pub fn validate(&self) -> Result<()> {
        for (name, conn) in &self.connections {
            if conn.host.trim().is_empty() {
                return Err(Error::InvalidSettings(format!(
                    "connection '{name}' has an empty host"
                )));
            }
            let has_basic = conn.username.is_some() && conn.password.is_some();
            if conn.token.is_none() && !has_basic {
                return Err(Error::InvalidSettings(format!(
                    "connection '{name}' needs a token or username and password"
                )));
            }
        }

        for (name, sample) in &self.samples {
            if !self.connections.contains_key(&sample.src) {
                return Err(Error::InvalidSettings(format!(
                    "sample '{name}' refers to unknown connection '{}'",
                    sample.src
                )));
            }
        }
        Ok(())
    }
}
