//! Reconciliation of local and remote data inventories.

use super::client::{EntryType, ListingService};
use super::listing::{globus_ls, ListedEntry, ListingOptions};
use crate::config::Config;
use crate::fs::walker::{is_hidden_name, MANIFEST_FILE_NAME};
use crate::utils::errors::{Result, ToolError};
use crate::utils::reporter::Reporter;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Server-side listing filter dropping hidden entries and manifests.
pub const INVENTORY_FILTER: &str = "name:!~.*/name:!~MANIFEST.yaml";

/// Relative file path to last-modified time.
pub type Inventory = BTreeMap<String, DateTime<Utc>>;

/// A directory on a Globus collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointLocation {
    pub endpoint_id: String,
    pub path: String,
}

/// The two sides being kept in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPair {
    pub local: EndpointLocation,
    pub remote: EndpointLocation,
}

impl EndpointPair {
    /// Local side is the repository data directory on the personal
    /// collection; remote side is the configured data root on the shared one.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            local: EndpointLocation {
                endpoint_id: config.local_collection()?.to_string(),
                path: config.data_path().to_string_lossy().into_owned(),
            },
            remote: EndpointLocation {
                endpoint_id: config.globus.remote_collection_uuid.clone(),
                path: config.globus.remote_data_path.clone(),
            },
        })
    }
}

/// Which side of the pair holds the newer copy of each file.
///
/// Every list is sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub local_only: Vec<String>,
    pub remote_only: Vec<String>,
    pub up_to_date: Vec<String>,
    /// Local copy is newer
    pub remote_outdated: Vec<String>,
    /// Remote copy is newer
    pub local_outdated: Vec<String>,
}

impl SyncStatus {
    pub fn is_in_sync(&self) -> bool {
        self.local_only.is_empty()
            && self.remote_only.is_empty()
            && self.remote_outdated.is_empty()
            && self.local_outdated.is_empty()
    }
}

/// Partition two inventories by presence and relative age.
pub fn classify(local: &Inventory, remote: &Inventory) -> SyncStatus {
    let mut status = SyncStatus::default();

    for (path, local_time) in local {
        match remote.get(path) {
            None => status.local_only.push(path.clone()),
            Some(remote_time) if remote_time == local_time => status.up_to_date.push(path.clone()),
            Some(remote_time) if remote_time < local_time => {
                status.remote_outdated.push(path.clone())
            }
            Some(_) => status.local_outdated.push(path.clone()),
        }
    }

    status.remote_only = remote
        .keys()
        .filter(|path| !local.contains_key(*path))
        .cloned()
        .collect();

    status
}

/// Keep regular, non-hidden, non-manifest files.
pub fn inventory_from_entries(entries: Vec<ListedEntry>) -> Result<Inventory> {
    let mut inventory = Inventory::new();

    for entry in entries {
        if entry.entry_type != EntryType::File {
            continue;
        }
        let hidden = entry.relative_path.split('/').any(is_hidden_name);
        let is_manifest = entry
            .relative_path
            .rsplit('/')
            .next()
            .is_some_and(|name| name == MANIFEST_FILE_NAME);
        if hidden || is_manifest {
            continue;
        }

        let modified = entry.last_modified.ok_or_else(|| {
            ToolError::TransferApi(format!("No modification time for {}", entry.relative_path))
        })?;
        inventory.insert(entry.relative_path, modified);
    }

    Ok(inventory)
}

/// List one side of the pair as an inventory.
pub async fn build_inventory<C: ListingService>(
    client: &C,
    location: &EndpointLocation,
    options: &ListingOptions,
) -> Result<Inventory> {
    let options = options.clone().with_filter(INVENTORY_FILTER);
    let entries = globus_ls(client, &location.endpoint_id, &location.path, &options).await?;
    inventory_from_entries(entries)
}

/// List both sides and classify every file.
pub async fn get_sync_status<C: ListingService>(
    client: &C,
    endpoints: &EndpointPair,
    options: &ListingOptions,
    reporter: &dyn Reporter,
) -> Result<SyncStatus> {
    reporter.info("Scanning local files");
    let local = build_inventory(client, &endpoints.local, options).await?;

    reporter.info("Scanning remote files");
    let remote = build_inventory(client, &endpoints.remote, options).await?;

    Ok(classify(&local, &remote))
}

fn report_section(reporter: &dyn Reporter, title: &str, paths: &[String]) {
    reporter.info(&format!("{}:", title));
    if paths.is_empty() {
        reporter.info(" - No files");
    }
    for path in paths {
        reporter.info(&format!(" - {}", path));
    }
}

/// Log the sync status of the configured pair, section by section.
pub async fn globus_status<C: ListingService>(
    client: &C,
    endpoints: &EndpointPair,
    options: &ListingOptions,
    reporter: &dyn Reporter,
) -> Result<SyncStatus> {
    let status = match get_sync_status(client, endpoints, options, reporter).await {
        Ok(status) => status,
        Err(e) => {
            reporter.error(&format!("Could not list files: {}", e));
            return Err(e);
        }
    };

    report_section(reporter, "Remote only", &status.remote_only);
    report_section(reporter, "Local only", &status.local_only);
    report_section(reporter, "Remote outdated", &status.remote_outdated);
    report_section(reporter, "Local outdated", &status.local_outdated);
    report_section(reporter, "Up to date", &status.up_to_date);

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globus::mock::{dir, file, ts, MockGlobus};
    use crate::utils::reporter::MemoryReporter;
    use std::time::Duration;
    use tracing::Level;

    fn inventory(items: &[(&str, DateTime<Utc>)]) -> Inventory {
        items.iter().map(|(p, t)| (p.to_string(), *t)).collect()
    }

    fn pair() -> EndpointPair {
        EndpointPair {
            local: EndpointLocation {
                endpoint_id: "local-ep".to_string(),
                path: "/home/me/repo/data".to_string(),
            },
            remote: EndpointLocation {
                endpoint_id: "remote-ep".to_string(),
                path: "/ve_data_science/data".to_string(),
            },
        }
    }

    fn options() -> ListingOptions {
        ListingOptions {
            sleep_frequency: 0,
            sleep_duration: Duration::ZERO,
            ..ListingOptions::default()
        }
    }

    #[test]
    fn test_classify_orientation() {
        let local = inventory(&[
            ("same.csv", ts(1, 0)),
            ("newer_here.csv", ts(3, 0)),
            ("older_here.csv", ts(1, 0)),
            ("mine.csv", ts(1, 0)),
        ]);
        let remote = inventory(&[
            ("same.csv", ts(1, 0)),
            ("newer_here.csv", ts(2, 0)),
            ("older_here.csv", ts(2, 0)),
            ("theirs.csv", ts(1, 0)),
        ]);

        let status = classify(&local, &remote);
        assert_eq!(status.local_only, vec!["mine.csv"]);
        assert_eq!(status.remote_only, vec!["theirs.csv"]);
        assert_eq!(status.up_to_date, vec!["same.csv"]);
        assert_eq!(status.remote_outdated, vec!["newer_here.csv"]);
        assert_eq!(status.local_outdated, vec!["older_here.csv"]);
        assert!(!status.is_in_sync());
    }

    #[test]
    fn test_classify_partitions_every_path_once() {
        let local = inventory(&[("b", ts(1, 0)), ("a", ts(2, 0)), ("c", ts(1, 0))]);
        let remote = inventory(&[("c", ts(2, 0)), ("d", ts(1, 0)), ("a", ts(2, 0))]);

        let status = classify(&local, &remote);
        let mut all: Vec<_> = status
            .local_only
            .iter()
            .chain(&status.remote_only)
            .chain(&status.up_to_date)
            .chain(&status.remote_outdated)
            .chain(&status.local_outdated)
            .cloned()
            .collect();
        all.sort();
        assert_eq!(all, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_identical_inventories_are_in_sync() {
        let local = inventory(&[("z.csv", ts(1, 0)), ("a.csv", ts(1, 0))]);
        let status = classify(&local, &local.clone());
        assert!(status.is_in_sync());
        assert_eq!(status.up_to_date, vec!["a.csv", "z.csv"]);
    }

    #[test]
    fn test_inventory_skips_dirs_hidden_and_manifests() -> Result<()> {
        let entries = vec![
            ListedEntry {
                relative_path: "sub".to_string(),
                entry_type: EntryType::Dir,
                last_modified: Some(ts(1, 0)),
                size: None,
            },
            ListedEntry {
                relative_path: "sub/MANIFEST.yaml".to_string(),
                entry_type: EntryType::File,
                last_modified: Some(ts(1, 0)),
                size: Some(1),
            },
            ListedEntry {
                relative_path: ".git/config".to_string(),
                entry_type: EntryType::File,
                last_modified: Some(ts(1, 0)),
                size: Some(1),
            },
            ListedEntry {
                relative_path: "sub/data.csv".to_string(),
                entry_type: EntryType::File,
                last_modified: Some(ts(2, 0)),
                size: Some(1),
            },
        ];

        let inventory = inventory_from_entries(entries)?;
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.get("sub/data.csv"), Some(&ts(2, 0)));
        Ok(())
    }

    #[tokio::test]
    async fn test_globus_status_reports_sections() -> Result<()> {
        let client = MockGlobus::new()
            .with_dir(
                "local-ep",
                "/home/me/repo/data",
                vec![file("shared.csv", ts(1, 0)), dir("primary")],
            )
            .with_dir(
                "local-ep",
                "/home/me/repo/data/primary",
                vec![file("new.csv", ts(5, 0))],
            )
            .with_dir(
                "remote-ep",
                "/ve_data_science/data",
                vec![file("shared.csv", ts(1, 0)), file("old.csv", ts(1, 0))],
            );
        let reporter = MemoryReporter::new();

        let status = globus_status(&client, &pair(), &options(), &reporter).await?;
        assert_eq!(status.local_only, vec!["primary/new.csv"]);
        assert_eq!(status.remote_only, vec!["old.csv"]);
        assert_eq!(status.up_to_date, vec!["shared.csv"]);

        let lines: Vec<String> = reporter.lines().into_iter().map(|(_, m)| m).collect();
        let start = lines.iter().position(|l| l == "Remote only:").unwrap();
        assert_eq!(
            &lines[start..],
            &[
                "Remote only:",
                " - old.csv",
                "Local only:",
                " - primary/new.csv",
                "Remote outdated:",
                " - No files",
                "Local outdated:",
                " - No files",
                "Up to date:",
                " - shared.csv",
            ]
        );

        let calls = client.list_calls.lock().unwrap().clone();
        let filter = ("filter".to_string(), INVENTORY_FILTER.to_string());
        assert!(calls.iter().all(|c| c.params.contains(&filter)));
        Ok(())
    }

    #[tokio::test]
    async fn test_listing_failure_is_reported() {
        let client = MockGlobus::new().with_dir("local-ep", "/home/me/repo/data", vec![]);
        let reporter = MemoryReporter::new();

        let result = globus_status(&client, &pair(), &options(), &reporter).await;
        assert!(matches!(result, Err(ToolError::TransferApi(_))));
        assert_eq!(
            reporter.count_matching(Level::ERROR, "Could not list files"),
            1
        );
    }
}
