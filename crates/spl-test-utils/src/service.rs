//! [`MemoryService`]: an in-memory [`SplunkService`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use spl_client::{
    Access, ClientError, Entity, JobStatus, Namespace, Result, SearchJob, SearchRequest, Sharing,
    SplunkService,
};

/// A mutating request the service received.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        endpoint: String,
        name: String,
        args: Map<String, Value>,
    },
    Update {
        endpoint: String,
        name: String,
        args: Map<String, Value>,
    },
    Delete {
        endpoint: String,
        name: String,
    },
    Search(SearchRequest),
    Restart,
}

#[derive(Default)]
struct State {
    namespace: Namespace,
    endpoints: BTreeMap<String, Vec<Entity>>,
    capabilities: Vec<String>,
    results: BTreeMap<String, Vec<Map<String, Value>>>,
    failing_queries: Vec<String>,
    failing_writes: Vec<(String, String)>,
    jobs: BTreeMap<String, (String, u32)>,
    calls: Vec<Call>,
}

/// Splunk instance held in memory.
///
/// Entities are returned unfiltered; namespace filtering happens in the
/// callers, like against a real instance listing `-/-`.
pub struct MemoryService {
    authority: String,
    username: Option<String>,
    polls_until_done: u32,
    state: Mutex<State>,
}

impl MemoryService {
    pub fn new(authority: &str) -> Self {
        Self {
            authority: authority.to_string(),
            username: Some("admin".to_string()),
            polls_until_done: 1,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_user(mut self, username: Option<&str>) -> Self {
        self.username = username.map(str::to_string);
        self
    }

    pub fn with_entities(self, endpoint: &str, entities: Vec<Entity>) -> Self {
        self.lock().endpoints.insert(endpoint.to_string(), entities);
        self
    }

    pub fn with_capabilities(self, capabilities: &[&str]) -> Self {
        self.lock().capabilities = capabilities.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Rows returned for a search whose full query equals `query`.
    pub fn with_search_results(self, query: &str, rows: Vec<Map<String, Value>>) -> Self {
        self.lock().results.insert(query.to_string(), rows);
        self
    }

    /// Dispatching `query` fails with a 400.
    pub fn with_failing_search(self, query: &str) -> Self {
        self.lock().failing_queries.push(query.to_string());
        self
    }

    /// Creating, updating or deleting `name` below `endpoint` fails with a 500.
    pub fn with_failing_write(self, endpoint: &str, name: &str) -> Self {
        self.lock()
            .failing_writes
            .push((endpoint.to_string(), name.to_string()));
        self
    }

    /// Number of status polls before a job reports done.
    pub fn with_polls_until_done(mut self, polls: u32) -> Self {
        self.polls_until_done = polls;
        self
    }

    /// Every mutating call in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Current entities of `endpoint`.
    pub fn entities(&self, endpoint: &str) -> Vec<Entity> {
        self.lock().endpoints.get(endpoint).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn write_failure(state: &State, endpoint: &str, name: &str) -> Result<()> {
        let fails = state
            .failing_writes
            .iter()
            .any(|(e, n)| e == endpoint && n == name);
        if fails {
            return Err(ClientError::Status {
                status: 500,
                message: format!("Internal error writing {name}"),
            });
        }
        Ok(())
    }

    fn not_found(endpoint: &str, name: &str) -> ClientError {
        ClientError::NotFound {
            endpoint: endpoint.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl SplunkService for MemoryService {
    fn authority(&self) -> String {
        self.authority.clone()
    }

    fn username(&self) -> Option<String> {
        self.username.clone()
    }

    fn namespace(&self) -> Namespace {
        self.lock().namespace.clone()
    }

    fn set_namespace(&self, namespace: Namespace) {
        self.lock().namespace = namespace;
    }

    async fn list(&self, endpoint: &str) -> Result<Vec<Entity>> {
        Ok(self.entities(endpoint))
    }

    async fn get(&self, endpoint: &str, name: &str) -> Result<Entity> {
        self.entities(endpoint)
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Self::not_found(endpoint, name))
    }

    async fn create(&self, endpoint: &str, name: &str, args: &Map<String, Value>) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Create {
            endpoint: endpoint.to_string(),
            name: name.to_string(),
            args: args.clone(),
        });
        Self::write_failure(&state, endpoint, name)?;
        let entities = state.endpoints.entry(endpoint.to_string()).or_default();
        if entities.iter().any(|e| e.name == name) {
            return Err(ClientError::Status {
                status: 409,
                message: format!("{name} already exists"),
            });
        }
        entities.push(Entity::new(name, args.clone()));
        Ok(())
    }

    async fn update(&self, endpoint: &str, name: &str, args: &Map<String, Value>) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Update {
            endpoint: endpoint.to_string(),
            name: name.to_string(),
            args: args.clone(),
        });
        Self::write_failure(&state, endpoint, name)?;
        let entity = state
            .endpoints
            .get_mut(endpoint)
            .and_then(|entities| entities.iter_mut().find(|e| e.name == name))
            .ok_or_else(|| Self::not_found(endpoint, name))?;
        entity.content.extend(args.clone());
        Ok(())
    }

    async fn delete(&self, endpoint: &str, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Delete {
            endpoint: endpoint.to_string(),
            name: name.to_string(),
        });
        Self::write_failure(&state, endpoint, name)?;
        let entities = state.endpoints.entry(endpoint.to_string()).or_default();
        let before = entities.len();
        entities.retain(|e| e.name != name);
        if entities.len() == before {
            return Err(Self::not_found(endpoint, name));
        }
        Ok(())
    }

    async fn capabilities(&self) -> Result<Vec<String>> {
        Ok(self.lock().capabilities.clone())
    }

    async fn create_search(&self, request: &SearchRequest) -> Result<SearchJob> {
        let mut state = self.lock();
        state.calls.push(Call::Search(request.clone()));
        if state.failing_queries.contains(&request.query) {
            return Err(ClientError::Status {
                status: 400,
                message: format!("Error in search: {}", request.query),
            });
        }
        let sid = format!("job-{}", state.jobs.len() + 1);
        state.jobs.insert(sid.clone(), (request.query.clone(), 0));
        Ok(SearchJob { sid })
    }

    async fn job_status(&self, job: &SearchJob) -> Result<JobStatus> {
        let polls_until_done = self.polls_until_done;
        let mut state = self.lock();
        let (query, polls) = state
            .jobs
            .get_mut(&job.sid)
            .map(|(query, polls)| {
                *polls += 1;
                (query.clone(), *polls)
            })
            .ok_or_else(|| Self::not_found("search/jobs", &job.sid))?;
        let rows = state.results.get(&query).map_or(0, Vec::len) as u64;
        let is_done = polls >= polls_until_done;
        Ok(JobStatus {
            done_progress: if is_done { 1.0 } else { 0.5 },
            scan_count: rows,
            event_count: rows,
            result_count: if is_done { rows } else { 0 },
            is_done,
        })
    }

    async fn job_results(&self, job: &SearchJob) -> Result<Vec<Map<String, Value>>> {
        let state = self.lock();
        let (query, _) = state
            .jobs
            .get(&job.sid)
            .ok_or_else(|| Self::not_found("search/jobs", &job.sid))?;
        Ok(state.results.get(query).cloned().unwrap_or_default())
    }

    async fn restart(&self) -> Result<()> {
        self.lock().calls.push(Call::Restart);
        Ok(())
    }
}

/// Entity from a JSON object literal.
///
/// # Panics
/// Panics when `content` is not a JSON object.
pub fn entity(name: &str, content: Value) -> Entity {
    match content {
        Value::Object(map) => Entity::new(name, map),
        other => panic!("entity content must be an object, got {other}"),
    }
}

/// ACL of an object owned by `owner` in `app`.
pub fn user_access(app: &str, sharing: Sharing, owner: &str) -> Access {
    Access {
        app: app.to_string(),
        sharing,
        owner: owner.to_string(),
        read: vec!["*".to_string()],
        write: vec!["admin".to_string()],
    }
}
