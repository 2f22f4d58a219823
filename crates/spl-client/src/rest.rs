//! reqwest implementation of [`SplunkService`]

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde_json::{Map, Value};
use tracing::debug;

use crate::entity::entries_from_feed;
use crate::namespace::WILDCARD;
use crate::service::{JobStatus, SearchJob, SearchRequest, SplunkService};
use crate::{ClientError, Entity, Namespace, Result};

/// How the client authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username/password exchanged for a session key at `/services/auth/login`
    Basic { username: String, password: String },
    /// Pre-issued authentication token sent as bearer
    Token(String),
}

/// Connection parameters of a Splunk management port.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Verify the server certificate (splunkd ships self-signed ones)
    pub verify_tls: bool,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: "https".to_string(),
            host: host.into(),
            port,
            verify_tls: false,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn authority(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Splunk REST client bound to one instance.
#[derive(Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    authorization: String,
    username: Option<String>,
    namespace: RwLock<Namespace>,
}

impl RestClient {
    /// Connect and authenticate against an instance.
    ///
    /// Basic credentials are exchanged for a session key right away, so a
    /// wrong password fails here rather than on first use.
    pub async fn connect(config: &RestConfig, credentials: &Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .build()?;
        let base = Url::parse(&format!("{}/", config.authority()))
            .map_err(|e| ClientError::Url(e.to_string()))?;

        let mut client = Self {
            http,
            base,
            authorization: String::new(),
            username: None,
            namespace: RwLock::new(Namespace::default()),
        };

        match credentials {
            Credentials::Token(token) => {
                client.authorization = format!("Bearer {token}");
                client.username = client.current_user().await.ok();
            }
            Credentials::Basic { username, password } => {
                let key = client.login(username, password).await?;
                client.authorization = format!("Splunk {key}");
                client.username = Some(username.clone());
            }
        }

        debug!(authority = %client.authority(), user = ?client.username, "Connected to Splunk");
        Ok(client)
    }

    async fn login(&self, username: &str, password: &str) -> Result<String> {
        let url = self.url(&["services", "auth", "login"])?;
        let response = self
            .http
            .post(url)
            .form(&[
                ("username", username),
                ("password", password),
                ("output_mode", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(ClientError::Auth {
                authority: self.authority(),
                message: splunk_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }

        body.get("sessionKey")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::decode("auth/login", "response without sessionKey"))
    }

    async fn current_user(&self) -> Result<String> {
        let url = self.url(&["services", "authentication", "current-context"])?;
        let feed = self
            .send(self.http.get(url), "authentication/current-context")
            .await?;
        feed.pointer("/entry/0/content/username")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::decode("authentication/current-context", "no username"))
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("output_mode", "json");
        Ok(url)
    }

    /// URL below the active namespace, optionally addressing one entity.
    fn namespaced_url(&self, endpoint: &str, name: Option<&str>) -> Result<Url> {
        let (owner, app) = self.namespace().path_segments();
        self.entity_path(Some((owner.as_str(), app.as_str())), endpoint, name)
    }

    fn entity_path(
        &self,
        scope: Option<(&str, &str)>,
        endpoint: &str,
        name: Option<&str>,
    ) -> Result<Url> {
        let mut segments = match scope {
            Some((owner, app)) => vec!["servicesNS", owner, app],
            None => vec!["services"],
        };
        segments.extend(endpoint.split('/').filter(|s| !s.is_empty()));
        if let Some(name) = name {
            segments.push(name);
        }
        self.url(&segments)
    }

    /// Owner and app of the namespace when neither is a wildcard.
    fn pinned_scope(&self) -> Option<(String, String)> {
        let (owner, app) = self.namespace().path_segments();
        (owner != WILDCARD && app != WILDCARD).then_some((owner, app))
    }

    /// URL for writes that do not address an existing entity.
    ///
    /// splunkd rejects `-` in write paths, so a namespace that is not fully
    /// pinned falls back to `/services`.
    fn write_url(&self, endpoint: &str, name: Option<&str>) -> Result<Url> {
        let scope = self.pinned_scope();
        let scope = scope.as_ref().map(|(owner, app)| (owner.as_str(), app.as_str()));
        self.entity_path(scope, endpoint, name)
    }

    /// URL of an existing entity for update and delete.
    ///
    /// With a pinned namespace the entity is addressed there. Otherwise it is
    /// looked up and addressed through the owner and app of its ACL.
    async fn entity_url(&self, endpoint: &str, name: &str) -> Result<Url> {
        if self.pinned_scope().is_some() {
            return self.write_url(endpoint, Some(name));
        }
        let entity = self.get(endpoint, name).await?;
        match &entity.access {
            Some(access) => self.entity_path(
                Some((access.owner.as_str(), access.app.as_str())),
                endpoint,
                Some(name),
            ),
            None => self.entity_path(None, endpoint, Some(name)),
        }
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Value> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if status.is_success() {
            return Ok(body);
        }
        Err(ClientError::Status {
            status: status.as_u16(),
            message: splunk_message(&body)
                .unwrap_or_else(|| format!("{endpoint}: {}", status.canonical_reason().unwrap_or(""))),
        })
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        endpoint: &str,
        form: Option<Vec<(String, String)>>,
    ) -> Result<Value> {
        debug!(%method, %url, "Splunk request");
        let mut request = self.http.request(method, url);
        if let Some(form) = form {
            request = request.form(&form);
        }
        self.send(request, endpoint).await
    }
}

/// First message text of a Splunk error body.
fn splunk_message(body: &Value) -> Option<String> {
    body.pointer("/messages/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Encode entity arguments as form pairs.
///
/// Lists become repeated keys, an empty list clears the property with a
/// single empty value, nulls are skipped and nested objects are sent as JSON.
pub fn form_pairs(args: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in args {
        match value {
            Value::Null => {}
            Value::Array(items) if items.is_empty() => pairs.push((key.clone(), String::new())),
            Value::Array(items) => {
                for item in items {
                    pairs.push((key.clone(), scalar_to_string(item)));
                }
            }
            other => pairs.push((key.clone(), scalar_to_string(other))),
        }
    }
    pairs
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => 0,
    }
}

fn as_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn as_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        Some(Value::String(s)) => matches!(s.as_str(), "1" | "true" | "True"),
        _ => false,
    }
}

#[async_trait]
impl SplunkService for RestClient {
    fn authority(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }

    fn username(&self) -> Option<String> {
        self.username.clone()
    }

    fn namespace(&self) -> Namespace {
        self.namespace
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_namespace(&self, namespace: Namespace) {
        *self
            .namespace
            .write()
            .unwrap_or_else(PoisonError::into_inner) = namespace;
    }

    async fn list(&self, endpoint: &str) -> Result<Vec<Entity>> {
        let mut url = self.namespaced_url(endpoint, None)?;
        url.query_pairs_mut().append_pair("count", "0");
        let feed = self.request(Method::GET, url, endpoint, None).await?;
        entries_from_feed(endpoint, &feed)
    }

    async fn get(&self, endpoint: &str, name: &str) -> Result<Entity> {
        let url = self.namespaced_url(endpoint, Some(name))?;
        let feed = match self.request(Method::GET, url, endpoint, None).await {
            Err(e) if e.is_not_found() => {
                return Err(ClientError::NotFound {
                    endpoint: endpoint.to_string(),
                    name: name.to_string(),
                });
            }
            other => other?,
        };
        entries_from_feed(endpoint, &feed)?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound {
                endpoint: endpoint.to_string(),
                name: name.to_string(),
            })
    }

    async fn create(&self, endpoint: &str, name: &str, args: &Map<String, Value>) -> Result<()> {
        let url = self.write_url(endpoint, None)?;
        let mut form = vec![("name".to_string(), name.to_string())];
        form.extend(form_pairs(args));
        self.request(Method::POST, url, endpoint, Some(form)).await?;
        Ok(())
    }

    async fn update(&self, endpoint: &str, name: &str, args: &Map<String, Value>) -> Result<()> {
        let url = self.entity_url(endpoint, name).await?;
        self.request(Method::POST, url, endpoint, Some(form_pairs(args)))
            .await?;
        Ok(())
    }

    async fn delete(&self, endpoint: &str, name: &str) -> Result<()> {
        let url = self.entity_url(endpoint, name).await?;
        self.request(Method::DELETE, url, endpoint, None).await?;
        Ok(())
    }

    async fn capabilities(&self) -> Result<Vec<String>> {
        let endpoint = "authorization/capabilities";
        let url = self.url(&["services", "authorization", "capabilities"])?;
        let feed = self.request(Method::GET, url, endpoint, None).await?;
        let capabilities = feed
            .pointer("/entry/0/content/capabilities")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::decode(endpoint, "no capability list"))?;
        Ok(capabilities
            .iter()
            .filter_map(|c| c.as_str().map(str::to_string))
            .collect())
    }

    async fn create_search(&self, request: &SearchRequest) -> Result<SearchJob> {
        let endpoint = "search/jobs";
        let url = self.write_url(endpoint, None)?;
        let form = vec![
            ("search".to_string(), request.query.clone()),
            ("earliest_time".to_string(), request.earliest.clone()),
            ("latest_time".to_string(), request.latest.clone()),
            ("search_mode".to_string(), "normal".to_string()),
        ];
        let body = self.request(Method::POST, url, endpoint, Some(form)).await?;
        body.get("sid")
            .and_then(Value::as_str)
            .map(|sid| SearchJob {
                sid: sid.to_string(),
            })
            .ok_or_else(|| ClientError::decode(endpoint, "response without sid"))
    }

    async fn job_status(&self, job: &SearchJob) -> Result<JobStatus> {
        let endpoint = "search/jobs";
        let url = self.write_url(endpoint, Some(&job.sid))?;
        let feed = self.request(Method::GET, url, endpoint, None).await?;
        let content = feed
            .pointer("/entry/0/content")
            .ok_or_else(|| ClientError::decode(endpoint, "job without content"))?;
        Ok(JobStatus {
            done_progress: as_f64(content.get("doneProgress")),
            scan_count: as_u64(content.get("scanCount")),
            event_count: as_u64(content.get("eventCount")),
            result_count: as_u64(content.get("resultCount")),
            is_done: as_bool(content.get("isDone")),
        })
    }

    async fn job_results(&self, job: &SearchJob) -> Result<Vec<Map<String, Value>>> {
        let endpoint = "search/jobs/results";
        let mut url = self.write_url("search/jobs", Some(&job.sid))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(self.base.to_string()))?
            .push("results");
        url.query_pairs_mut().append_pair("count", "0");
        let body = self.request(Method::GET, url, endpoint, None).await?;
        let results = body
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::decode(endpoint, "no results array"))?;
        Ok(results
            .iter()
            .filter_map(|r| r.as_object().cloned())
            .collect())
    }

    async fn restart(&self) -> Result<()> {
        let url = self.url(&["services", "server", "control", "restart"])?;
        self.request(Method::POST, url, "server/control/restart", Some(Vec::new()))
            .await?;
        Ok(())
    }
}
