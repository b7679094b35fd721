//! Depth-limited recursive listing of a remote endpoint.
//!
//! The listing is a pull-based stream: each directory is requested only
//! when the consumer has drained the entries already fetched, so dropping
//! the stream stops all further remote calls.

use super::client::{EntryType, ListingService};
use crate::config::ListingConfig;
use crate::utils::errors::Result;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, TryStreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// Tuning for [`recursive_ls`].
#[derive(Debug, Clone)]
pub struct ListingOptions {
    /// Deepest directory level listed (the root is level 0)
    pub max_depth: usize,
    /// Pause after every N listing calls (0 disables pausing)
    pub sleep_frequency: usize,
    pub sleep_duration: Duration,
    /// Extra query parameters sent with every call
    pub params: Vec<(String, String)>,
    /// Parameters merged over `params` for the first call only
    pub top_level_params: Vec<(String, String)>,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self::from_config(&ListingConfig::default())
    }
}

impl ListingOptions {
    pub fn from_config(config: &ListingConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            sleep_frequency: config.sleep_frequency,
            sleep_duration: config.sleep_duration(),
            params: Vec::new(),
            top_level_params: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: &str) -> Self {
        self.params.retain(|(k, _)| k != "filter");
        self.params.push(("filter".to_string(), filter.to_string()));
        self
    }

    fn first_call_params(&self) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = self
            .params
            .iter()
            .filter(|(k, _)| !self.top_level_params.iter().any(|(t, _)| t == k))
            .cloned()
            .collect();
        merged.extend(self.top_level_params.iter().cloned());
        merged
    }
}

/// An entry found by the recursive listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListedEntry {
    /// Path relative to the listing root, '/'-separated
    pub relative_path: String,
    pub entry_type: EntryType,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

struct PendingDir {
    absolute: String,
    relative: String,
    depth: usize,
}

struct ListingState<'a, C> {
    client: &'a C,
    endpoint: &'a str,
    options: &'a ListingOptions,
    pending: Vec<PendingDir>,
    ready: VecDeque<ListedEntry>,
    calls: usize,
    failed: bool,
}

/// Join a child name onto a remote directory path.
fn join_remote(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

impl<C: ListingService> ListingState<'_, C> {
    async fn expand(&mut self, dir: PendingDir) -> Result<()> {
        let params = if self.calls == 0 {
            self.options.first_call_params()
        } else {
            self.options.params.clone()
        };

        debug!("Listing {} at depth {}", dir.absolute, dir.depth);
        let listing = self
            .client
            .list_one_level(self.endpoint, &dir.absolute, &params)
            .await?;

        self.calls += 1;
        if self.options.sleep_frequency > 0 && self.calls % self.options.sleep_frequency == 0 {
            tokio::time::sleep(self.options.sleep_duration).await;
        }

        for entry in listing.entries {
            let relative = if dir.relative.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", dir.relative, entry.name)
            };

            if entry.entry_type == EntryType::Dir && dir.depth < self.options.max_depth {
                self.pending.push(PendingDir {
                    absolute: join_remote(&listing.path, &entry.name),
                    relative: relative.clone(),
                    depth: dir.depth + 1,
                });
            }

            self.ready.push_back(ListedEntry {
                relative_path: relative,
                entry_type: entry.entry_type,
                last_modified: entry.last_modified,
                size: entry.size,
            });
        }

        Ok(())
    }
}

/// Lazily list `path` on `endpoint` and everything below it.
///
/// `path` itself is depth 0. Directories are listed down to depth
/// `max_depth`; subdirectories found there are yielded but not expanded.
/// A failed call is yielded as an error and ends the stream. Each call
/// returns an independent stream that starts from the top again.
pub fn recursive_ls<'a, C: ListingService>(
    client: &'a C,
    endpoint: &'a str,
    path: &str,
    options: &'a ListingOptions,
) -> impl Stream<Item = Result<ListedEntry>> + 'a {
    let state = ListingState {
        client,
        endpoint,
        options,
        pending: vec![PendingDir {
            absolute: path.to_string(),
            relative: String::new(),
            depth: 0,
        }],
        ready: VecDeque::new(),
        calls: 0,
        failed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(entry) = state.ready.pop_front() {
                return Some((Ok(entry), state));
            }
            if state.failed {
                return None;
            }
            let dir = state.pending.pop()?;
            if let Err(e) = state.expand(dir).await {
                state.failed = true;
                state.pending.clear();
                return Some((Err(e), state));
            }
        }
    })
}

/// Collect the whole recursive listing, failing on the first error.
pub async fn globus_ls<C: ListingService>(
    client: &C,
    endpoint: &str,
    path: &str,
    options: &ListingOptions,
) -> Result<Vec<ListedEntry>> {
    recursive_ls(client, endpoint, path, options)
        .try_collect()
        .await
}
