//! Globus Transfer API access.
//!
//! Listing and transfer are separate traits so callers can be tested
//! against scripted services. [`GlobusClient`] implements both over HTTPS.

#![allow(async_fn_in_trait)]

use crate::config::Config;
use crate::utils::errors::{Result, ToolError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV: &str = "GLOBUS_TRANSFER_TOKEN";

/// Kind of entry in an endpoint listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub name: String,
    pub entry_type: EntryType,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

/// A single-level directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryListing {
    /// Absolute path of the listed directory as reported by the endpoint
    pub path: String,
    pub entries: Vec<ListEntry>,
}

/// Include or exclude matching names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMethod {
    Include,
    Exclude,
}

/// Entry kind a filter rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    File,
    Dir,
}

/// Server-side name filter applied during a recursive transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub method: FilterMethod,
    /// Glob pattern matched against entry names
    pub name: String,
    pub target: FilterTarget,
}

impl FilterRule {
    pub fn exclude_files(name: impl Into<String>) -> Self {
        Self {
            method: FilterMethod::Exclude,
            name: name.into(),
            target: FilterTarget::File,
        }
    }
}

/// Which files a transfer skips because the destination already has them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncLevel {
    Exists,
    Size,
    /// Copy only when the destination is missing or older
    Mtime,
    Checksum,
}

impl SyncLevel {
    fn code(self) -> u8 {
        match self {
            SyncLevel::Exists => 0,
            SyncLevel::Size => 1,
            SyncLevel::Mtime => 2,
            SyncLevel::Checksum => 3,
        }
    }
}

/// One source/destination pair within a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    pub source_path: String,
    pub destination_path: String,
    pub recursive: bool,
}

/// Everything needed to submit a bulk transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSpec {
    pub source_endpoint: String,
    pub destination_endpoint: String,
    pub items: Vec<TransferItem>,
    pub filter_rules: Vec<FilterRule>,
    pub preserve_timestamp: bool,
    pub sync_level: SyncLevel,
}

/// Lifecycle state of a transfer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Active,
    Inactive,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Condensed health of an active task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NiceStatus {
    Queued,
    Ok,
    Other(String),
}

/// The parts of a task document the orchestrator observes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskInfo {
    pub status: TaskStatus,
    #[serde(default)]
    pub nice_status: Option<String>,
    #[serde(default)]
    pub is_ok: Option<bool>,
    /// Total files in the task, populated while the task is queued
    #[serde(default, rename = "files")]
    pub files_total: Option<u64>,
    #[serde(default)]
    pub files_transferred: Option<u64>,
}

impl TaskInfo {
    pub fn nice(&self) -> NiceStatus {
        match self.nice_status.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("queued") => NiceStatus::Queued,
            Some(s) if s.eq_ignore_ascii_case("ok") => NiceStatus::Ok,
            Some(s) => NiceStatus::Other(s.to_string()),
            None => NiceStatus::Other(String::new()),
        }
    }

    /// `is_ok` when the service reports it, otherwise judged from the nice status.
    pub fn is_healthy(&self) -> bool {
        self.is_ok
            .unwrap_or_else(|| matches!(self.nice(), NiceStatus::Queued | NiceStatus::Ok))
    }
}

/// Response to a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CancelOutcome {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// A file the task copied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub struct TransferredFile {
    pub source_path: String,
    pub destination_path: String,
}

/// Single-level directory listing on an endpoint.
pub trait ListingService {
    async fn list_one_level(
        &self,
        endpoint_id: &str,
        path: &str,
        params: &[(String, String)],
    ) -> Result<DirectoryListing>;
}

/// Submission and monitoring of bulk transfer tasks.
pub trait TransferService {
    /// Submit a transfer, returning the task identifier.
    async fn submit_transfer(&self, spec: &TransferSpec) -> Result<String>;

    async fn get_task(&self, task_id: &str) -> Result<TaskInfo>;

    async fn cancel_task(&self, task_id: &str) -> Result<CancelOutcome>;

    /// Every file the task copied successfully.
    async fn successful_transfers(&self, task_id: &str) -> Result<Vec<TransferredFile>>;
}

/// Parse a listing timestamp: `2023-12-18 16:52:50+00:00` or RFC 3339.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ToolError::TransferApi(format!("Invalid timestamp '{}': {}", value, e)))
}

#[derive(Debug, Deserialize)]
struct RawListing {
    path: String,
    #[serde(rename = "DATA", default)]
    data: Vec<RawListEntry>,
}

#[derive(Debug, Deserialize)]
struct RawListEntry {
    name: String,
    #[serde(rename = "type")]
    entry_type: EntryType,
    #[serde(default)]
    last_modified: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

impl RawListing {
    fn into_listing(self) -> Result<DirectoryListing> {
        let entries = self
            .data
            .into_iter()
            .map(|raw| {
                let last_modified = raw
                    .last_modified
                    .as_deref()
                    .map(parse_timestamp)
                    .transpose()?;
                Ok(ListEntry {
                    name: raw.name,
                    entry_type: raw.entry_type,
                    last_modified,
                    size: raw.size,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DirectoryListing {
            path: self.path,
            entries,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubmissionId {
    value: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResult {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct SuccessfulTransfersPage {
    #[serde(rename = "DATA", default)]
    data: Vec<TransferredFile>,
    #[serde(default)]
    next_marker: Option<serde_json::Value>,
}

/// HTTP client for the Globus Transfer API.
pub struct GlobusClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GlobusClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ve-data-tool/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Build a client from the configured API URL and access token,
    /// falling back to `GLOBUS_TRANSFER_TOKEN`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config
            .globus
            .access_token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .ok_or_else(|| {
                ToolError::Config(format!(
                    "No Globus access token: set globus.access_token or {}",
                    TOKEN_ENV
                ))
            })?;

        Self::new(config.globus.api_base_url.clone(), token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        Self::parse_response(&url, response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::parse_response(&url, response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ToolError::TransferApi(format!("{} from {}: {}", status, url, body)));
        }
        Ok(response.json::<T>().await?)
    }

    async fn submission_id(&self) -> Result<String> {
        let id: SubmissionId = self.get_json("submission_id", &[]).await?;
        Ok(id.value)
    }
}

fn transfer_body(spec: &TransferSpec, submission_id: &str) -> serde_json::Value {
    let items: Vec<_> = spec
        .items
        .iter()
        .map(|item| {
            json!({
                "DATA_TYPE": "transfer_item",
                "source_path": item.source_path,
                "destination_path": item.destination_path,
                "recursive": item.recursive,
            })
        })
        .collect();

    let filters: Vec<_> = spec
        .filter_rules
        .iter()
        .map(|rule| {
            json!({
                "DATA_TYPE": "filter_rule",
                "method": match rule.method {
                    FilterMethod::Include => "include",
                    FilterMethod::Exclude => "exclude",
                },
                "name": rule.name,
                "type": match rule.target {
                    FilterTarget::File => "file",
                    FilterTarget::Dir => "dir",
                },
            })
        })
        .collect();

    json!({
        "DATA_TYPE": "transfer",
        "submission_id": submission_id,
        "source_endpoint": spec.source_endpoint,
        "destination_endpoint": spec.destination_endpoint,
        "preserve_timestamp": spec.preserve_timestamp,
        "sync_level": spec.sync_level.code(),
        "DATA": items,
        "filter_rules": filters,
    })
}

impl ListingService for GlobusClient {
    async fn list_one_level(
        &self,
        endpoint_id: &str,
        path: &str,
        params: &[(String, String)],
    ) -> Result<DirectoryListing> {
        let mut query = vec![("path".to_string(), path.to_string())];
        query.extend(params.iter().cloned());

        let raw: RawListing = self
            .get_json(&format!("operation/endpoint/{}/ls", endpoint_id), &query)
            .await?;
        raw.into_listing()
    }
}

impl TransferService for GlobusClient {
    async fn submit_transfer(&self, spec: &TransferSpec) -> Result<String> {
        let submission_id = self.submission_id().await?;
        let result: SubmitResult = self
            .post_json("transfer", &transfer_body(spec, &submission_id))
            .await?;
        Ok(result.task_id)
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskInfo> {
        self.get_json(&format!("task/{}", task_id), &[]).await
    }

    async fn cancel_task(&self, task_id: &str) -> Result<CancelOutcome> {
        self.post_json(&format!("task/{}/cancel", task_id), &json!({}))
            .await
    }

    async fn successful_transfers(&self, task_id: &str) -> Result<Vec<TransferredFile>> {
        let path = format!("task/{}/successful_transfers", task_id);
        let mut files = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let query: Vec<(String, String)> = marker
                .iter()
                .map(|m| ("marker".to_string(), m.clone()))
                .collect();
            let page: SuccessfulTransfersPage = self.get_json(&path, &query).await?;
            files.extend(page.data);

            marker = match page.next_marker {
                Some(serde_json::Value::String(s)) => Some(s),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            if marker.is_none() {
                break;
            }
        }

        Ok(files)
    }
}
