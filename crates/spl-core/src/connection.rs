//! Named connections to Splunk instances

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use spl_client::{Credentials, Namespace, RestClient, RestConfig, Sharing, SplunkService};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::objects::{Inventory, ObjectKind, ObjectList};
use crate::prompt::Prompter;
use crate::{Error, Result};

const WILDCARD: &str = "-";
const UNSET: &str = "(unset)";

/// Namespace values asked for on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceRequest {
    pub app: Option<String>,
    pub sharing: Option<String>,
    pub owner: Option<String>,
}

/// An authenticated connection to one Splunk instance.
#[derive(Clone)]
pub struct ConnectionAdapter {
    name: String,
    service: Arc<dyn SplunkService>,
    allow_restart: bool,
}

impl ConnectionAdapter {
    /// Log in to the instance described by `config`.
    pub async fn connect(name: &str, config: &ConnectionConfig) -> Result<Self> {
        let credentials = match (&config.token, &config.username, &config.password) {
            (Some(token), _, _) => Credentials::Token(token.clone()),
            (None, Some(username), Some(password)) => Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => {
                return Err(Error::InvalidSettings(format!(
                    "connection '{name}' needs a token or username and password"
                )));
            }
        };

        let mut rest = RestConfig::new(config.host.clone(), config.port);
        rest.scheme = config.scheme.clone();
        rest.verify_tls = config.verify_tls;

        let client = RestClient::connect(&rest, &credentials).await?;
        Ok(Self::from_service(name, Arc::new(client), config.allow_restart))
    }

    pub fn from_service(name: &str, service: Arc<dyn SplunkService>, allow_restart: bool) -> Self {
        let adapter = Self {
            name: name.to_string(),
            service,
            allow_restart,
        };
        info!(
            "Connection adapter for '{}' ({}) as user '{}'",
            adapter.name,
            adapter.service.authority(),
            adapter.user()
        );
        adapter
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> &dyn SplunkService {
        self.service.as_ref()
    }

    pub fn authority(&self) -> String {
        self.service.authority()
    }

    pub fn user(&self) -> String {
        self.service.username().unwrap_or_else(|| "-".to_string())
    }

    pub fn current_namespace(&self) -> Namespace {
        self.service.namespace()
    }

    pub async fn objects(&self, kind: ObjectKind) -> Result<ObjectList> {
        ObjectList::load(self.service(), kind).await
    }

    pub async fn apps(&self) -> Result<ObjectList> {
        self.objects(ObjectKind::Apps).await
    }

    pub async fn event_types(&self) -> Result<ObjectList> {
        self.objects(ObjectKind::EventTypes).await
    }

    pub async fn indexes(&self) -> Result<ObjectList> {
        self.objects(ObjectKind::Indexes).await
    }

    pub async fn inputs(&self) -> Result<ObjectList> {
        self.objects(ObjectKind::Inputs).await
    }

    pub async fn roles(&self) -> Result<ObjectList> {
        self.objects(ObjectKind::Roles).await
    }

    pub async fn saved_searches(&self) -> Result<ObjectList> {
        self.objects(ObjectKind::SavedSearches).await
    }

    pub async fn users(&self) -> Result<ObjectList> {
        self.objects(ObjectKind::Users).await
    }

    /// Capabilities, roles and apps existing on this instance.
    pub async fn inventory(&self) -> Result<Inventory> {
        Inventory::load(self.service()).await
    }

    /// Resolve and apply the namespace context.
    ///
    /// With `context` in interactive mode every unset value is asked for;
    /// otherwise given values are checked against the instance.
    pub async fn namespace(
        &self,
        request: &NamespaceRequest,
        context: bool,
        prompter: &dyn Prompter,
        interactive: bool,
    ) -> Result<Namespace> {
        let ask = context && interactive;

        let app = match (&request.app, ask) {
            (None, false) => None,
            (given, _) => {
                let mut candidates = vec![WILDCARD.to_string(), UNSET.to_string()];
                candidates.extend(self.enabled_apps().await?);
                resolve(
                    given.as_deref(),
                    &candidates,
                    "Select the app context:",
                    prompter,
                    Error::UnknownApp,
                )?
            }
        };

        let sharing = match (&request.sharing, ask) {
            (None, false) => None,
            (given, _) => {
                let mut candidates = vec![UNSET.to_string(), WILDCARD.to_string()];
                candidates.extend(Sharing::ALL.iter().map(|s| s.to_string()));
                let given = given.as_deref().map(str::to_lowercase);
                match resolve(
                    given.as_deref(),
                    &candidates,
                    "Select the sharing context:",
                    prompter,
                    Error::InvalidSharing,
                )? {
                    Some(value) if value != WILDCARD => Some(value.parse::<Sharing>()?),
                    _ => None,
                }
            }
        };

        let owner = match (&request.owner, ask) {
            (None, false) => None,
            (given, _) => {
                let mut candidates = vec![UNSET.to_string(), WILDCARD.to_string(), "nobody".to_string()];
                candidates.extend(self.users().await?.names());
                resolve(
                    given.as_deref(),
                    &candidates,
                    "Select the owner context:",
                    prompter,
                    Error::UnknownOwner,
                )?
            }
        };

        let namespace = Namespace::new(app, sharing, owner);
        debug!(connection = %self.name, %namespace, "Setting namespace");
        self.service.set_namespace(namespace.clone());
        Ok(namespace)
    }

    async fn enabled_apps(&self) -> Result<Vec<String>> {
        Ok(self
            .apps()
            .await?
            .entities
            .into_iter()
            .filter(|app| !is_truthy(app.get("disabled")))
            .map(|app| app.name)
            .collect())
    }

    /// Restart splunkd, only for connections that allow it.
    pub async fn restart(&self) -> Result<()> {
        if !self.allow_restart {
            return Err(Error::RestartNotAllowed(self.name.clone()));
        }
        info!("Restarting '{}' ({})", self.name, self.authority());
        self.service.restart().await?;
        Ok(())
    }
}

impl fmt::Display for ConnectionAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) as user '{}'", self.name, self.authority(), self.user())
    }
}

impl fmt::Debug for ConnectionAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionAdapter")
            .field("name", &self.name)
            .field("authority", &self.authority())
            .field("allow_restart", &self.allow_restart)
            .finish()
    }
}

/// Pick a given value from `candidates` or prompt for one.
fn resolve(
    given: Option<&str>,
    candidates: &[String],
    message: &str,
    prompter: &dyn Prompter,
    unknown: fn(String) -> Error,
) -> Result<Option<String>> {
    let value = match given {
        Some(value) if candidates.iter().any(|c| c == value) => value.to_string(),
        Some(value) => return Err(unknown(value.to_string())),
        None => {
            let index = prompter.select(message, candidates, 0)?;
            candidates
                .get(index)
                .cloned()
                .ok_or_else(|| Error::Prompt(format!("selection {index} out of range")))?
        }
    };
    Ok((value != UNSET).then_some(value))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "1" | "true"),
        _ => false,
    }
}
