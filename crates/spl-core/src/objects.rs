//! Knowledge object kinds and namespace-filtered object lists

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use spl_client::{Entity, SplunkService};
use tracing::warn;

use crate::table::Table;
use crate::Result;

const TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Handled apart from the generic field transfer.
pub const DEFAULT_APP: &str = "defaultApp";

/// ACL columns appended to detailed listings.
const ACCESS_HEADERS: [&str; 5] = ["App", "Sharing", "Owner", "Read", "Write"];

/// Column header and content field; `None` is the entity name.
type Column = (&'static str, Option<&'static str>);

/// The knowledge object kinds the utility lists and syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Apps,
    EventTypes,
    Indexes,
    Inputs,
    Roles,
    SavedSearches,
    Users,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        Self::Apps,
        Self::EventTypes,
        Self::Indexes,
        Self::Inputs,
        Self::Roles,
        Self::SavedSearches,
        Self::Users,
    ];

    /// REST endpoint relative to `/servicesNS/{owner}/{app}/`.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Apps => "apps/local",
            Self::EventTypes => "saved/eventtypes",
            Self::Indexes => "data/indexes",
            Self::Inputs => "data/inputs/all",
            Self::Roles => "authorization/roles",
            Self::SavedSearches => "saved/searches",
            Self::Users => "authentication/users",
        }
    }

    /// Singular display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Apps => "App",
            Self::EventTypes => "EventType",
            Self::Indexes => "Index",
            Self::Inputs => "Input",
            Self::Roles => "Role",
            Self::SavedSearches => "SavedSearch",
            Self::Users => "User",
        }
    }

    /// Command-line key.
    pub fn key(self) -> &'static str {
        match self {
            Self::Apps => "apps",
            Self::EventTypes => "eventtypes",
            Self::Indexes => "indexes",
            Self::Inputs => "inputs",
            Self::Roles => "roles",
            Self::SavedSearches => "savedsearches",
            Self::Users => "users",
        }
    }

    fn overview_fields(self) -> &'static [Column] {
        match self {
            Self::Apps => &[("ID", None), ("Title", Some("label")), ("Version", Some("version"))],
            Self::EventTypes => &[("Name", None), ("App", Some("eai:appName")), ("Tags", Some("tags"))],
            Self::Indexes => &[
                ("Name", None),
                ("Type", Some("datatype")),
                ("Size MB", Some("maxTotalDataSizeMB")),
            ],
            Self::Inputs => &[("Name", None)],
            Self::Roles => &[
                ("Name", None),
                ("Default App", Some("defaultApp")),
                ("Capabilities", Some("capabilities")),
                ("Imported Roles", Some("imported_roles")),
            ],
            Self::SavedSearches => &[("Name", None)],
            Self::Users => &[
                ("User", None),
                ("Type", Some("type")),
                ("Last Login", Some("last_successful_login")),
            ],
        }
    }

    fn detail_extra_fields(self) -> &'static [Column] {
        match self {
            Self::Apps => &[
                ("Author", Some("author")),
                ("Disabled", Some("disabled")),
                ("Visible", Some("visible")),
                ("Splunkbase", Some("details")),
                ("Nav", Some("show_in_nav")),
            ],
            Self::EventTypes => &[
                ("Description", Some("description")),
                ("Disabled", Some("disabled")),
                ("Priority", Some("priority")),
            ],
            Self::Indexes => &[
                ("Path", Some("homePath")),
                ("Integrity", Some("enableDataIntegrityControl")),
                ("Buckets MB", Some("maxDataSize")),
                ("Tsidx Optimization", Some("enableTsidxReduction")),
            ],
            Self::Inputs => &[],
            Self::Roles => &[
                ("Indexes allowed", Some("srchIndexesAllowed")),
                ("Indexes disallowed", Some("srchIndexesDisallowed")),
                ("Search earliest", Some("srchTimeEarliest")),
            ],
            Self::SavedSearches => &[
                ("Visible", Some("is_visible")),
                ("Disabled", Some("disabled")),
                ("Scheduled", Some("is_scheduled")),
            ],
            Self::Users => &[
                ("Email", Some("email")),
                ("Name", Some("realname")),
                ("Roles", Some("roles")),
                ("Capabilities", Some("capabilities")),
                ("Default App", Some("defaultApp")),
            ],
        }
    }

    fn columns(self, details: bool) -> Vec<Column> {
        let mut columns = self.overview_fields().to_vec();
        if details {
            columns.extend_from_slice(self.detail_extra_fields());
        }
        columns
    }

    /// Fields never transferred by sync.
    pub fn sync_exclude(self) -> &'static [&'static str] {
        match self {
            Self::Inputs => &["assureUTF8"],
            Self::Roles => &[
                "imported_capabilities",
                "imported_srchIndexesAllowed",
                "imported_srchIndexesDefault",
                "imported_rtSrchJobsQuota",
                "imported_srchDiskQuota",
                "imported_srchJobsQuota",
            ],
            Self::SavedSearches => &["embed.enabled"],
            Self::Users => &[
                "capabilities",
                "password",
                "last_successful_login",
                "defaultAppIsUserOverride",
                "defaultAppSourceRole",
                "type",
            ],
            Self::Apps | Self::EventTypes | Self::Indexes => &[],
        }
    }

    /// Whether generic field transfer skips `field`.
    pub fn is_excluded(self, field: &str) -> bool {
        field == DEFAULT_APP || self.sync_exclude().contains(&field)
    }

    /// Values always set on created entities.
    pub fn static_values(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Indexes => &[("archiver.maxDataArchiveRetentionPeriod", "0")],
            _ => &[],
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "apps" | "app" => Ok(Self::Apps),
            "eventtypes" | "eventtype" => Ok(Self::EventTypes),
            "indexes" | "index" => Ok(Self::Indexes),
            "inputs" | "input" => Ok(Self::Inputs),
            "roles" | "role" => Ok(Self::Roles),
            "savedsearches" | "savedsearch" => Ok(Self::SavedSearches),
            "users" | "user" => Ok(Self::Users),
            _ => Err(format!(
                "unknown object kind '{s}', expected one of: {}",
                Self::ALL.map(|k| k.key()).join(", ")
            )),
        }
    }
}

/// Names, capabilities, roles and apps of a destination instance.
///
/// Used to drop references that would not resolve there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub capabilities: Vec<String>,
    pub roles: Vec<String>,
    pub apps: Vec<String>,
}

impl Inventory {
    pub async fn load(service: &dyn SplunkService) -> Result<Self> {
        let names = |entities: Vec<Entity>| entities.into_iter().map(|e| e.name).collect();
        Ok(Self {
            capabilities: service.capabilities().await?,
            roles: names(service.list(ObjectKind::Roles.endpoint()).await?),
            apps: names(service.list(ObjectKind::Apps.endpoint()).await?),
        })
    }

    /// Values a list field may reference, `None` for ordinary fields.
    pub fn valid_values(&self, field: &str) -> Option<&[String]> {
        match field {
            "capabilities" => Some(&self.capabilities),
            "roles" | "imported_roles" => Some(&self.roles),
            DEFAULT_APP => Some(&self.apps),
            _ => None,
        }
    }
}

/// Entities of one kind as seen through the active namespace.
#[derive(Debug, Clone)]
pub struct ObjectList {
    pub kind: ObjectKind,
    pub entities: Vec<Entity>,
    /// All capabilities of the instance, shown as `all` when a list matches
    pub capabilities: Vec<String>,
}

impl ObjectList {
    /// List all entities of `kind` admitted by the service namespace.
    ///
    /// Entities without ACL always pass.
    pub async fn load(service: &dyn SplunkService, kind: ObjectKind) -> Result<Self> {
        let namespace = service.namespace();
        let entities = service
            .list(kind.endpoint())
            .await?
            .into_iter()
            .filter(|entity| match &entity.access {
                Some(access) => namespace.admits(&access.app, access.sharing, &access.owner),
                None => true,
            })
            .collect();

        let capabilities = match kind {
            ObjectKind::Roles | ObjectKind::Users => service.capabilities().await?,
            _ => Vec::new(),
        };

        Ok(Self {
            kind,
            entities,
            capabilities,
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Overview table, or detail table with ACL columns.
    pub fn table(&self, details: bool) -> Table {
        let columns = self.kind.columns(details);
        let with_access = details && self.entities.iter().any(|e| e.access.is_some());

        let mut headers: Vec<&str> = columns.iter().map(|(h, _)| *h).collect();
        if with_access {
            headers.extend(ACCESS_HEADERS);
        }
        let mut table = Table::new(format!("{} Overview", self.kind.name()), headers);

        for entity in &self.entities {
            let mut row: Vec<String> = columns
                .iter()
                .map(|(_, field)| match field {
                    None => entity.name.clone(),
                    Some(field) => format_cell(field, entity.get(field), &self.capabilities),
                })
                .collect();
            if with_access {
                match &entity.access {
                    Some(access) => row.extend([
                        access.app.clone(),
                        access.sharing.to_string(),
                        access.owner.clone(),
                        access.read.join(", "),
                        access.write.join(", "),
                    ]),
                    None => row.extend(ACCESS_HEADERS.map(|_| String::new())),
                }
            }
            table.push(row);
        }
        table
    }

    /// Creation arguments for `reference` on a destination.
    ///
    /// List references and the default app are filtered to what exists in
    /// `destination`; every dropped value is logged.
    pub fn create_args(&self, reference: &Entity, destination: &Inventory) -> Map<String, Value> {
        let kind = self.kind;
        let mut args: Map<String, Value> = reference
            .content
            .iter()
            .filter(|(field, value)| {
                is_set(value)
                    && !kind.is_excluded(field)
                    && (!reference.fields.is_declared() || reference.fields.accepts(field))
            })
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        for field in ["capabilities", "imported_roles", "roles"] {
            if !args.contains_key(field) {
                continue;
            }
            let valid = destination.valid_values(field).unwrap_or_default();
            let kept: Vec<Value> = reference
                .list(field)
                .into_iter()
                .filter(|value| {
                    let known = valid.contains(value);
                    if !known {
                        warn!(
                            "The {} {} has an unknown {} ('{}') assigned. We'll skip this assignment.",
                            kind.name(),
                            reference.name,
                            field.trim_end_matches('s').replace('_', " "),
                            value
                        );
                    }
                    known
                })
                .map(Value::String)
                .collect();
            args.insert(field.to_string(), Value::Array(kept));
        }

        let declares_default_app =
            !reference.fields.is_declared() || reference.fields.accepts(DEFAULT_APP);
        if declares_default_app
            && let Some(app) = reference.get(DEFAULT_APP).and_then(Value::as_str)
            && !app.is_empty()
        {
            if destination.apps.iter().any(|a| a == app) {
                args.insert(DEFAULT_APP.to_string(), Value::String(app.to_string()));
            } else {
                warn!(
                    "The {} {} has an unknown default App ('{}') assigned. We'll skip this assignment.",
                    kind.name(),
                    reference.name,
                    app
                );
            }
        }

        for (field, value) in kind.static_values() {
            args.insert(field.to_string(), Value::String(value.to_string()));
        }
        args
    }
}

/// Whether a content value carries information (`null` and `"-1"` do not).
pub fn is_set(value: &Value) -> bool {
    !value.is_null() && value.as_str() != Some("-1")
}

/// Render a content value for a table cell.
///
/// Integer-like values read as flags: negative is `None`, `0` is `False`,
/// `1` is `True`. Other integers of `last_*` fields are UTC timestamps.
pub fn format_cell(field: &str, value: Option<&Value>, capabilities: &[String]) -> String {
    let Some(value) = value else {
        return String::new();
    };

    if field == "capabilities"
        && !capabilities.is_empty()
        && let Value::Array(items) = value
    {
        let mut held: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
        let mut all: Vec<&str> = capabilities.iter().map(String::as_str).collect();
        held.sort_unstable();
        all.sort_unstable();
        if held == all {
            return "all".to_string();
        }
    }

    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::Number(n) => match n.as_i64() {
            Some(i) => format_integer(field, i),
            None => n.to_string(),
        },
        Value::String(s) if looks_integer(s) => match s.parse::<i64>() {
            Ok(i) => format_integer(field, i),
            Err(_) => s.clone(),
        },
        Value::String(s) => s.clone(),
        Value::Object(_) => value.to_string(),
    }
}

fn looks_integer(s: &str) -> bool {
    let digits: String = s.chars().filter(|c| *c != '-').collect();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn format_integer(field: &str, value: i64) -> String {
    match value {
        i64::MIN..=-1 => "None".to_string(),
        0 => "False".to_string(),
        1 => "True".to_string(),
        _ if field.starts_with("last_") => chrono::DateTime::from_timestamp(value, 0)
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| value.to_string()),
        _ => value.to_string(),
    }
}
