//! Submitting recursive transfers and following them to completion.

use super::client::{
    FilterRule, NiceStatus, SyncLevel, TaskStatus, TransferItem, TransferService, TransferSpec,
};
use super::status::{EndpointLocation, EndpointPair};
use crate::fs::walker::MANIFEST_FILE_NAME;
use crate::utils::errors::Result;
use crate::utils::reporter::Reporter;
use std::time::{Duration, Instant};

/// Hidden files and manifests are never transferred.
pub fn default_filters() -> Vec<FilterRule> {
    vec![
        FilterRule::exclude_files(".*"),
        FilterRule::exclude_files(MANIFEST_FILE_NAME),
    ]
}

/// A one-directory recursive transfer between two endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: EndpointLocation,
    pub destination: EndpointLocation,
    pub filters: Vec<FilterRule>,
}

impl TransferRequest {
    pub fn new(source: EndpointLocation, destination: EndpointLocation) -> Self {
        Self {
            source,
            destination,
            filters: default_filters(),
        }
    }

    /// Recursive, timestamp-preserving, copying only newer or missing files.
    pub fn to_spec(&self) -> TransferSpec {
        TransferSpec {
            source_endpoint: self.source.endpoint_id.clone(),
            destination_endpoint: self.destination.endpoint_id.clone(),
            items: vec![TransferItem {
                source_path: self.source.path.clone(),
                destination_path: self.destination.path.clone(),
                recursive: true,
            }],
            filter_rules: self.filters.clone(),
            preserve_timestamp: true,
            sync_level: SyncLevel::Mtime,
        }
    }
}

fn elapsed(start: Instant) -> String {
    format!("[{:6.1} s]", start.elapsed().as_secs_f64())
}

/// Submit `request` and poll it until it settles.
///
/// `Ok(true)` when the task succeeded, `Ok(false)` when it failed or was
/// cancelled because it stopped being healthy. API errors during submission
/// or polling are returned as errors.
pub async fn globus_transfer<C: TransferService>(
    client: &C,
    request: &TransferRequest,
    poll_interval: Duration,
    reporter: &dyn Reporter,
) -> Result<bool> {
    let task_id = match client.submit_transfer(&request.to_spec()).await {
        Ok(task_id) => task_id,
        Err(e) => {
            reporter.error(&format!("Globus transfer submission failed: {}", e));
            return Err(e);
        }
    };
    reporter.info(&format!("Globus task submitted: {}", task_id));

    let start = Instant::now();
    let mut queue_reported = false;
    let mut last_transferred: Option<u64> = None;

    loop {
        let task = match client.get_task(&task_id).await {
            Ok(task) => task,
            Err(e) => {
                reporter.error(&format!("{} Could not get task status: {}", elapsed(start), e));
                return Err(e);
            }
        };

        match task.status {
            TaskStatus::Active if !task.is_healthy() => {
                reporter.error(&format!(
                    "{} Globus sync error: {}",
                    elapsed(start),
                    task.nice_status.as_deref().unwrap_or("unknown")
                ));
                let outcome = client.cancel_task(&task_id).await?;
                reporter.error(&format!(
                    "{} Globus sync cancelled: {}",
                    elapsed(start),
                    outcome.code
                ));
                return Ok(false);
            }
            TaskStatus::Succeeded => {
                reporter.info(&format!("{} Globus sync complete.", elapsed(start)));
                break;
            }
            TaskStatus::Failed => {
                reporter.error(&format!(
                    "{} Globus sync failed: {}",
                    elapsed(start),
                    task.nice_status.as_deref().unwrap_or("unknown")
                ));
                return Ok(false);
            }
            _ => {}
        }

        match task.nice() {
            NiceStatus::Queued if !queue_reported => {
                queue_reported = true;
                reporter.info(&format!(
                    "{} Globus sync queued: {} files",
                    elapsed(start),
                    task.files_total.unwrap_or(0)
                ));
            }
            NiceStatus::Ok => {
                let transferred = task.files_transferred.unwrap_or(0);
                if last_transferred.map_or(true, |last| transferred > last) {
                    last_transferred = Some(transferred);
                    reporter.info(&format!(
                        "{} Globus sync active: {}/{} files transferred",
                        elapsed(start),
                        transferred,
                        task.files_total.unwrap_or(0)
                    ));
                }
            }
            _ => {}
        }

        tokio::time::sleep(poll_interval).await;
    }

    match client.successful_transfers(&task_id).await {
        Ok(mut files) if !files.is_empty() => {
            files.sort();
            reporter.info("Files transferred:");
            for file in files {
                reporter.info(&format!(" - {}", file.source_path));
            }
        }
        Ok(_) => reporter.info("No files transferred."),
        Err(e) => reporter.warn(&format!("Could not retrieve transferred files: {}", e)),
    }

    Ok(true)
}

/// Two-way sync: pull remote changes first, then push local ones.
///
/// The push is skipped when the pull fails.
pub async fn globus_sync<C: TransferService>(
    client: &C,
    endpoints: &EndpointPair,
    poll_interval: Duration,
    reporter: &dyn Reporter,
) -> Result<bool> {
    reporter.info("Starting GLOBUS synchronisation: remote to local.");
    let pull = TransferRequest::new(endpoints.remote.clone(), endpoints.local.clone());
    if !globus_transfer(client, &pull, poll_interval, reporter).await? {
        reporter.error("Remote to local update failed.");
        return Ok(false);
    }

    reporter.info("Starting GLOBUS synchronisation: local to remote.");
    let push = TransferRequest::new(endpoints.local.clone(), endpoints.remote.clone());
    if !globus_transfer(client, &push, poll_interval, reporter).await? {
        reporter.error("Local to remote update failed.");
        return Ok(false);
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globus::mock::{task, MockGlobus};
    use crate::utils::errors::ToolError;
    use crate::utils::reporter::MemoryReporter;
    use tracing::Level;

    fn location(endpoint: &str, path: &str) -> EndpointLocation {
        EndpointLocation {
            endpoint_id: endpoint.to_string(),
            path: path.to_string(),
        }
    }

    fn pair() -> EndpointPair {
        EndpointPair {
            local: location("local-ep", "/home/me/repo/data"),
            remote: location("remote-ep", "/ve_data_science/data"),
        }
    }

    fn request() -> TransferRequest {
        TransferRequest::new(
            location("remote-ep", "/ve_data_science/data"),
            location("local-ep", "/home/me/repo/data"),
        )
    }

    #[test]
    fn test_spec_shape() {
        let spec = request().to_spec();
        assert_eq!(spec.source_endpoint, "remote-ep");
        assert_eq!(spec.destination_endpoint, "local-ep");
        assert_eq!(spec.sync_level, SyncLevel::Mtime);
        assert!(spec.preserve_timestamp);
        assert!(spec.items[0].recursive);
        assert_eq!(spec.filter_rules, default_filters());
        assert!(spec.filter_rules.iter().any(|r| r.name == MANIFEST_FILE_NAME));
    }

    #[tokio::test]
    async fn test_successful_transfer() -> Result<()> {
        let client = MockGlobus::new()
            .with_task_states(vec![
                task(TaskStatus::Active, Some("Queued"), None, 0),
                task(TaskStatus::Active, Some("Queued"), None, 0),
                task(TaskStatus::Active, Some("OK"), Some(true), 1),
                task(TaskStatus::Active, Some("OK"), Some(true), 1),
                task(TaskStatus::Active, Some("OK"), Some(true), 3),
                task(TaskStatus::Succeeded, None, None, 4),
            ])
            .with_transferred(&[("/src/b.csv", "/dst/b.csv"), ("/src/a.csv", "/dst/a.csv")]);
        let reporter = MemoryReporter::new();

        let ok = globus_transfer(&client, &request(), Duration::ZERO, &reporter).await?;
        assert!(ok);
        assert_eq!(client.polls(), 6);
        assert_eq!(client.cancels(), 0);

        assert_eq!(
            reporter.count_matching(Level::INFO, "Globus sync queued"),
            1
        );
        assert_eq!(
            reporter.count_matching(Level::INFO, "Globus sync active"),
            2
        );
        assert_eq!(
            reporter.count_matching(Level::INFO, "Globus sync complete"),
            1
        );

        let lines: Vec<String> = reporter.lines().into_iter().map(|(_, m)| m).collect();
        let listed = lines
            .iter()
            .position(|l| l == "Files transferred:")
            .unwrap();
        assert_eq!(lines[listed + 1], " - /src/a.csv");
        assert_eq!(lines[listed + 2], " - /src/b.csv");
        Ok(())
    }

    #[tokio::test]
    async fn test_unhealthy_task_is_cancelled_once() -> Result<()> {
        let client = MockGlobus::new().with_task_states(vec![task(
            TaskStatus::Active,
            Some("PERMISSION_DENIED"),
            Some(false),
            0,
        )]);
        let reporter = MemoryReporter::new();

        let ok = globus_transfer(&client, &request(), Duration::ZERO, &reporter).await?;
        assert!(!ok);
        assert_eq!(client.polls(), 1);
        assert_eq!(client.cancels(), 1);
        assert_eq!(
            reporter.count_matching(Level::ERROR, "PERMISSION_DENIED"),
            1
        );
        assert_eq!(
            reporter.count_matching(Level::ERROR, "Globus sync cancelled"),
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_task_returns_false_without_cancel() -> Result<()> {
        let client = MockGlobus::new().with_task_states(vec![
            task(TaskStatus::Active, Some("OK"), Some(true), 0),
            task(TaskStatus::Failed, Some("FILE_NOT_FOUND"), Some(false), 0),
        ]);
        let reporter = MemoryReporter::new();

        let ok = globus_transfer(&client, &request(), Duration::ZERO, &reporter).await?;
        assert!(!ok);
        assert_eq!(client.cancels(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_submission_is_error() {
        let client = MockGlobus {
            reject_submission: true,
            ..MockGlobus::new()
        };
        let reporter = MemoryReporter::new();

        let result = globus_transfer(&client, &request(), Duration::ZERO, &reporter).await;
        assert!(matches!(result, Err(ToolError::TransferApi(_))));
        assert_eq!(client.polls(), 0);
        assert_eq!(
            reporter.count_matching(Level::ERROR, "submission failed"),
            1
        );
    }

    #[tokio::test]
    async fn test_audit_failure_is_only_a_warning() -> Result<()> {
        let client = MockGlobus {
            fail_audit: true,
            ..MockGlobus::new()
        }
        .with_task_states(vec![task(TaskStatus::Succeeded, None, None, 4)]);
        let reporter = MemoryReporter::new();

        assert!(globus_transfer(&client, &request(), Duration::ZERO, &reporter).await?);
        assert_eq!(
            reporter.count_matching(Level::WARN, "Could not retrieve"),
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_runs_pull_then_push() -> Result<()> {
        let client =
            MockGlobus::new().with_task_states(vec![task(TaskStatus::Succeeded, None, None, 0)]);
        let reporter = MemoryReporter::new();

        assert!(globus_sync(&client, &pair(), Duration::ZERO, &reporter).await?);

        let submitted = client.submitted.lock().unwrap().clone();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0].source_endpoint, "remote-ep");
        assert_eq!(submitted[0].items[0].destination_path, "/home/me/repo/data");
        assert_eq!(submitted[1].source_endpoint, "local-ep");
        assert_eq!(
            submitted[1].items[0].destination_path,
            "/ve_data_science/data"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_skips_push_after_failed_pull() -> Result<()> {
        let client = MockGlobus::new().with_task_states(vec![task(
            TaskStatus::Active,
            Some("CONNECT_FAILED"),
            Some(false),
            0,
        )]);
        let reporter = MemoryReporter::new();

        assert!(!globus_sync(&client, &pair(), Duration::ZERO, &reporter).await?);
        assert_eq!(client.submitted.lock().unwrap().len(), 1);
        assert!(reporter.contains(Level::ERROR, "Remote to local update failed."));
        Ok(())
    }
}
