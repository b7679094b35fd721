//! Globus synchronisation of the data directory with the shared collection.

pub mod client;
pub mod listing;
pub mod status;
pub mod transfer;

#[cfg(test)]
mod mock;

pub use client::{GlobusClient, ListingService, TransferService};
pub use listing::{globus_ls, recursive_ls, ListedEntry, ListingOptions};
pub use status::{
    classify, get_sync_status, globus_status, EndpointLocation, EndpointPair, SyncStatus,
};
pub use transfer::{globus_sync, globus_transfer, TransferRequest};
