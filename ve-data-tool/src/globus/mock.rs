//! Scripted in-memory Globus service for unit tests.

use super::client::{
    CancelOutcome, DirectoryListing, EntryType, ListEntry, ListingService, TaskInfo, TaskStatus,
    TransferService, TransferSpec, TransferredFile,
};
use crate::utils::errors::{Result, ToolError};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A recorded `list_one_level` call.
#[derive(Debug, Clone)]
pub struct ListCall {
    pub endpoint: String,
    pub path: String,
    pub params: Vec<(String, String)>,
}

#[derive(Default)]
pub struct MockGlobus {
    pub listings: HashMap<(String, String), Vec<ListEntry>>,
    pub failing_paths: Vec<(String, String)>,
    pub list_calls: Mutex<Vec<ListCall>>,

    pub task_states: Mutex<VecDeque<TaskInfo>>,
    pub submitted: Mutex<Vec<TransferSpec>>,
    pub get_task_calls: Mutex<usize>,
    pub cancel_calls: Mutex<usize>,
    pub reject_submission: bool,
    pub fail_audit: bool,
    pub transferred: Vec<TransferredFile>,
}

pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

pub fn file(name: &str, modified: DateTime<Utc>) -> ListEntry {
    ListEntry {
        name: name.to_string(),
        entry_type: EntryType::File,
        last_modified: Some(modified),
        size: Some(0),
    }
}

pub fn dir(name: &str) -> ListEntry {
    ListEntry {
        name: name.to_string(),
        entry_type: EntryType::Dir,
        last_modified: Some(ts(1, 0)),
        size: None,
    }
}

pub fn task(status: TaskStatus, nice: Option<&str>, is_ok: Option<bool>, done: u64) -> TaskInfo {
    TaskInfo {
        status,
        nice_status: nice.map(str::to_string),
        is_ok,
        files_total: Some(4),
        files_transferred: Some(done),
    }
}

fn not_found(path: &str) -> ToolError {
    ToolError::TransferApi(format!("ClientError.NotFound: {}", path))
}

fn normalize(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

impl MockGlobus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the children of `path` on `endpoint`.
    pub fn with_dir(mut self, endpoint: &str, path: &str, entries: Vec<ListEntry>) -> Self {
        let key = (endpoint.to_string(), normalize(path));
        self.listings.insert(key, entries);
        self
    }

    /// Make listing `path` on `endpoint` fail.
    pub fn with_failing_dir(mut self, endpoint: &str, path: &str) -> Self {
        let key = (endpoint.to_string(), normalize(path));
        self.failing_paths.push(key);
        self
    }

    /// Task documents returned by successive polls; the last one repeats.
    pub fn with_task_states(self, states: Vec<TaskInfo>) -> Self {
        *self.task_states.lock().unwrap() = states.into();
        self
    }

    pub fn with_transferred(mut self, files: &[(&str, &str)]) -> Self {
        self.transferred = files
            .iter()
            .map(|(src, dst)| TransferredFile {
                source_path: src.to_string(),
                destination_path: dst.to_string(),
            })
            .collect();
        self
    }

    pub fn listed_paths(&self) -> Vec<String> {
        self.list_calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.path.clone())
            .collect()
    }

    pub fn cancels(&self) -> usize {
        *self.cancel_calls.lock().unwrap()
    }

    pub fn polls(&self) -> usize {
        *self.get_task_calls.lock().unwrap()
    }
}

impl ListingService for MockGlobus {
    async fn list_one_level(
        &self,
        endpoint_id: &str,
        path: &str,
        params: &[(String, String)],
    ) -> Result<DirectoryListing> {
        self.list_calls.lock().unwrap().push(ListCall {
            endpoint: endpoint_id.to_string(),
            path: path.to_string(),
            params: params.to_vec(),
        });

        let key = (endpoint_id.to_string(), normalize(path));
        if self.failing_paths.contains(&key) {
            return Err(not_found(path));
        }

        match self.listings.get(&key) {
            Some(entries) => Ok(DirectoryListing {
                path: key.1,
                entries: entries.clone(),
            }),
            None => Err(not_found(path)),
        }
    }
}

impl TransferService for MockGlobus {
    async fn submit_transfer(&self, spec: &TransferSpec) -> Result<String> {
        if self.reject_submission {
            return Err(ToolError::TransferApi("403 PermissionDenied".to_string()));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(spec.clone());
        Ok(format!("task-{}", submitted.len()))
    }

    async fn get_task(&self, _task_id: &str) -> Result<TaskInfo> {
        *self.get_task_calls.lock().unwrap() += 1;
        let mut states = self.task_states.lock().unwrap();
        let state = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().cloned()
        };
        state.ok_or_else(|| ToolError::TransferApi("no task states scripted".to_string()))
    }

    async fn cancel_task(&self, _task_id: &str) -> Result<CancelOutcome> {
        *self.cancel_calls.lock().unwrap() += 1;
        Ok(CancelOutcome {
            code: "Canceled".to_string(),
            message: "The task has been cancelled.".to_string(),
        })
    }

    async fn successful_transfers(&self, _task_id: &str) -> Result<Vec<TransferredFile>> {
        if self.fail_audit {
            return Err(ToolError::TransferApi("500 ServiceUnavailable".to_string()));
        }
        Ok(self.transferred.clone())
    }
}
