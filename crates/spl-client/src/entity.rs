//! Knowledge object entities as returned by the REST API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::namespace::Sharing;
use crate::{ClientError, Result};

/// Content keys that carry metadata already exposed through `access`/`fields`.
const METADATA_KEYS: &[&str] = &["eai:acl", "eai:attributes"];

/// Access control list of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    pub app: String,
    pub sharing: Sharing,
    pub owner: String,
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
}

/// Field declaration of an endpoint: which arguments create/update accept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default)]
    pub wildcard: Vec<String>,
}

impl FieldSpec {
    /// Whether any field is declared at all.
    pub fn is_declared(&self) -> bool {
        !self.required.is_empty() || !self.optional.is_empty()
    }

    /// Whether `field` is accepted as a required or optional argument.
    pub fn accepts(&self, field: &str) -> bool {
        self.required.iter().any(|f| f == field) || self.optional.iter().any(|f| f == field)
    }
}

/// A single knowledge object (user, role, index, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub content: Map<String, Value>,
    pub access: Option<Access>,
    #[serde(default)]
    pub fields: FieldSpec,
}

impl Entity {
    pub fn new(name: impl Into<String>, content: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            content,
            access: None,
            fields: FieldSpec::default(),
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    pub fn with_fields(mut self, fields: FieldSpec) -> Self {
        self.fields = fields;
        self
    }

    /// Content value of a property.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.content.get(property)
    }

    /// String items of a list property (a scalar string counts as one item).
    pub fn list(&self, property: &str) -> Vec<String> {
        match self.content.get(property) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Parse one `entry` of a Splunk JSON feed.
    pub fn from_entry(endpoint: &str, entry: &Value) -> Result<Self> {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::decode(endpoint, "entry without name"))?
            .to_string();

        let mut content = match entry.get("content") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };

        let fields = match entry.get("fields") {
            Some(fields) => serde_json::from_value(fields.clone())
                .map_err(|e| ClientError::decode(endpoint, e.to_string()))?,
            None => content
                .get("eai:attributes")
                .map(fields_from_eai_attributes)
                .unwrap_or_default(),
        };

        let access = match entry.get("acl") {
            Some(acl) if acl.is_object() => Some(parse_acl(endpoint, acl)?),
            _ => None,
        };

        for key in METADATA_KEYS {
            content.remove(*key);
        }

        Ok(Self {
            name,
            content,
            access,
            fields,
        })
    }
}

fn fields_from_eai_attributes(attributes: &Value) -> FieldSpec {
    let list = |key: &str| -> Vec<String> {
        attributes
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    };
    FieldSpec {
        required: list("requiredFields"),
        optional: list("optionalFields"),
        wildcard: list("wildcardFields"),
    }
}

fn parse_acl(endpoint: &str, acl: &Value) -> Result<Access> {
    let text = |key: &str| {
        acl.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let perms = |kind: &str| -> Vec<String> {
        acl.get("perms")
            .and_then(|p| p.get(kind))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    };

    Ok(Access {
        app: text("app"),
        sharing: text("sharing").parse().map_err(|_| {
            ClientError::decode(endpoint, format!("invalid sharing '{}'", text("sharing")))
        })?,
        owner: text("owner"),
        read: perms("read"),
        write: perms("write"),
    })
}

/// Parse all entries of a Splunk JSON feed.
pub fn entries_from_feed(endpoint: &str, feed: &Value) -> Result<Vec<Entity>> {
    let entries = feed
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::decode(endpoint, "feed without entry list"))?;
    entries
        .iter()
        .map(|entry| Entity::from_entry(endpoint, entry))
        .collect()
}
