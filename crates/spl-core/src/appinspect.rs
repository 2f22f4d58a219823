//! AppInspect API client for cloud vetting

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::SplunkbaseConfig;
use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Statuses of a validation request that is still running.
const PENDING: &[&str] = &["PREPARING", "PROCESSING"];

#[derive(Deserialize)]
struct LoginResp {
    data: LoginData,
}

#[derive(Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Deserialize)]
struct SubmitResp {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Deserialize)]
struct StatusResp {
    status: String,
}

/// Submits app packages to AppInspect and fetches the reports.
#[derive(Debug, Clone)]
pub struct AppInspectClient {
    http: reqwest::Client,
    auth_uri: String,
    appinspect_uri: String,
    username: String,
    password: String,
    poll_interval: Duration,
}

impl AppInspectClient {
    pub fn new(config: &SplunkbaseConfig) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            auth_uri: config.auth_uri.clone(),
            appinspect_uri: config.appinspect_uri.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            poll_interval: POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Exchange the Splunkbase credentials for an API token.
    pub async fn login(&self) -> Result<String> {
        let resp = self
            .http
            .get(&self.auth_uri)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?
            .error_for_status()?;
        let body: LoginResp = resp
            .json()
            .await
            .map_err(|e| Error::AppInspect(format!("unexpected login response: {e}")))?;
        Ok(body.data.token)
    }

    /// Upload a package for cloud validation and return the request id.
    pub async fn submit(&self, token: &str, package: &Path) -> Result<String> {
        let file_name = package
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "package.tar.gz".to_string());
        let bytes = tokio::fs::read(package).await?;
        let form = Form::new()
            .part("app_package", Part::bytes(bytes).file_name(file_name))
            .text("included_tags", "cloud");

        let body: SubmitResp = self
            .http
            .post(format!("{}/validate", self.appinspect_uri))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;

        let message = body.message.unwrap_or_default();
        info!("AppInspect response: {}", message);
        body.request_id
            .ok_or_else(|| Error::AppInspect(format!("no request id returned: {message}")))
    }

    /// Poll until the validation left the pending states.
    pub async fn wait(&self, token: &str, request_id: &str) -> Result<String> {
        let url = format!("{}/validate/status/{}", self.appinspect_uri, request_id);
        loop {
            let status: StatusResp = self
                .http
                .get(&url)
                .bearer_auth(token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            if !PENDING.contains(&status.status.as_str()) {
                info!("Cloud vetting with ID '{}' finished: {}", request_id, status.status);
                return Ok(status.status);
            }
            debug!("Waiting for cloud vetting with ID '{}'.", request_id);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn report_json(&self, token: &str, request_id: &str) -> Result<Value> {
        Ok(self
            .http
            .get(format!("{}/report/{}", self.appinspect_uri, request_id))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub async fn report_html(&self, token: &str, request_id: &str) -> Result<String> {
        Ok(self
            .http
            .get(format!("{}/report/{}", self.appinspect_uri, request_id))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "text/html")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?)
    }
}
