//! Namespace (app/sharing/owner) context for REST calls

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ClientError;

/// Wildcard value accepted by Splunk for app and owner.
pub const WILDCARD: &str = "-";

/// Sharing level of a knowledge object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sharing {
    Global,
    System,
    App,
    User,
}

impl Sharing {
    pub const ALL: [Sharing; 4] = [Sharing::Global, Sharing::System, Sharing::App, Sharing::User];

    pub fn as_str(self) -> &'static str {
        match self {
            Sharing::Global => "global",
            Sharing::System => "system",
            Sharing::App => "app",
            Sharing::User => "user",
        }
    }
}

impl fmt::Display for Sharing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sharing {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" => Ok(Sharing::Global),
            "system" => Ok(Sharing::System),
            "app" => Ok(Sharing::App),
            "user" => Ok(Sharing::User),
            other => Err(ClientError::decode("acl", format!("unknown sharing '{other}'"))),
        }
    }
}

/// App/sharing/owner context.
///
/// `None` and `"-"` both mean "any". The namespace decides the
/// `/servicesNS/{owner}/{app}` prefix and filters listed entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub app: Option<String>,
    pub sharing: Option<Sharing>,
    pub owner: Option<String>,
}

impl Namespace {
    pub fn new(app: Option<String>, sharing: Option<Sharing>, owner: Option<String>) -> Self {
        Self {
            app,
            sharing,
            owner,
        }
    }

    /// Path segments `(owner, app)` used for `/servicesNS/{owner}/{app}`.
    pub fn path_segments(&self) -> (String, String) {
        let app = self.app.clone().unwrap_or_else(|| WILDCARD.to_string());
        match self.sharing {
            Some(Sharing::System) => ("nobody".to_string(), "system".to_string()),
            Some(Sharing::App) | Some(Sharing::Global) => ("nobody".to_string(), app),
            _ => (
                self.owner.clone().unwrap_or_else(|| WILDCARD.to_string()),
                app,
            ),
        }
    }

    /// Whether an entity with the given ACL falls into this namespace.
    pub fn admits(&self, app: &str, sharing: Sharing, owner: &str) -> bool {
        is_any_or(self.app.as_deref(), app)
            && self.sharing.is_none_or(|s| s == sharing)
            && is_any_or(self.owner.as_deref(), owner)
    }
}

fn is_any_or(filter: Option<&str>, value: &str) -> bool {
    match filter {
        None | Some(WILDCARD) => true,
        Some(expected) => expected == value,
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<&str>| v.unwrap_or("None").to_string();
        write!(
            f,
            "{{app: {}, sharing: {}, owner: {}}}",
            show(self.app.as_deref()),
            show(self.sharing.map(|s| s.as_str())),
            show(self.owner.as_deref())
        )
    }
}
