//! High-level pipeline: orchestrates scan → reconcile → upload → metadata
//! propagation against a destination folder.
//!
//! # Responsibilities
//! - Fatal pre-checks: the destination folder must resolve before any work
//!   begins ([`SyncError::TargetNotFound`]).
//! - Optional reset of the destination contents ([`empty_folder`]).
//! - Optional skip-set computation: scan both sides, reconcile, and exclude
//!   files already present within the size tolerance.
//! - The upload pass and metadata propagation, aggregated into a
//!   [`SyncReport`] for the terminal summary.
//!
//! # Error Handling
//! Per-node upload and metadata failures are recovered inside the respective
//! passes and surface only as counters; this module's `Result` carries the
//! fatal categories alone. A wholesale metadata-propagation failure is
//! logged and demoted to counters, matching the best-effort contract.
//!
//! # Callable From
//! - The CLI crate surface and the integration tests; expects a concrete
//!   (async) [`RemoteStore`] implementation.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use futures::future::{BoxFuture, FutureExt};
use tracing::{error, info, warn};

use crate::config::{ImportConfig, ImportMode};
use crate::contract::{ParentKind, RemoteError, RemoteStore};
use crate::inventory::scan_remote_tree;
use crate::metadata::{propagate_metadata, MetadataReport};
use crate::reconcile::{reconcile, Reconciliation};
use crate::scan::{scan_local_tree, LocalFile};
use crate::upload::upload_tree;

/// Fatal failure categories; everything else is recovered per node.
#[derive(Debug)]
pub enum SyncError {
    /// The destination folder could not be resolved.
    TargetNotFound(String),
    /// A pre-upload scan (local or remote) failed.
    Scan(String),
    /// Emptying the destination folder failed.
    Reset(String),
    /// The upload pass could not start or aborted at the root.
    Upload(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::TargetNotFound(msg) => write!(f, "target folder not found: {msg}"),
            SyncError::Scan(msg) => write!(f, "scan failed: {msg}"),
            SyncError::Reset(msg) => write!(f, "reset failed: {msg}"),
            SyncError::Upload(msg) => write!(f, "upload failed: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

/// Terminal counters for one synchronisation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub metadata_applied: usize,
    pub metadata_failed: usize,
}

/// Runs the full synchronisation pipeline against `remote`.
pub async fn synchronise<R: RemoteStore>(
    config: &ImportConfig,
    remote: &R,
) -> Result<SyncReport, SyncError> {
    info!("[SYNC] Starting synchronisation pipeline");

    let folder = remote
        .get_folder(&config.folder_id)
        .await
        .map_err(|e| SyncError::TargetNotFound(e.to_string()))?;
    info!(folder = %folder.name, folder_id = %config.folder_id, "[SYNC] Target folder found");

    if config.mode == ImportMode::ResetDatabase {
        info!(folder_id = %config.folder_id, "[SYNC] Deleting folder contents");
        empty_folder(remote, &config.folder_id)
            .await
            .map_err(|e| SyncError::Reset(e.to_string()))?;
    }

    let mut skip = HashSet::new();
    if config.skip_existing {
        let comparison = compare_trees(config, remote).await?;
        info!(
            existing = comparison.existing.len(),
            new = comparison.new.len(),
            modified = comparison.modified.len(),
            "[SYNC] Existing-content check complete"
        );
        skip = comparison.skip_set();
    }

    info!(
        bids_root = %config.bids_root.display(),
        folder_id = %config.folder_id,
        "[SYNC] Uploading BIDS dataset"
    );
    let upload = upload_tree(
        remote,
        &config.bids_root,
        &config.folder_id,
        ParentKind::Folder,
        &skip,
    )
    .await
    .map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Upload pass failed");
        SyncError::Upload(e.to_string())
    })?;

    info!("[SYNC] Extracting BIDS metadata");
    let metadata = match propagate_metadata(remote, &config.folder_id).await {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "[SYNC] Metadata propagation failed");
            MetadataReport::default()
        }
    };

    info!("[SYNC] Synchronisation complete");
    Ok(SyncReport {
        uploaded: upload.uploaded,
        skipped: upload.skipped,
        failed: upload.failed,
        metadata_applied: metadata.applied,
        metadata_failed: metadata.failed,
    })
}

/// Report-only entrypoint for the `compare` command: resolves the target,
/// scans both sides and reconciles, mutating nothing.
pub async fn compare<R: RemoteStore>(
    config: &ImportConfig,
    remote: &R,
) -> Result<(Reconciliation, BTreeMap<String, LocalFile>), SyncError> {
    let folder = remote
        .get_folder(&config.folder_id)
        .await
        .map_err(|e| SyncError::TargetNotFound(e.to_string()))?;
    info!(folder = %folder.name, folder_id = %config.folder_id, "Target folder found");

    let local = scan_local_tree(&config.bids_root).map_err(|e| SyncError::Scan(e.to_string()))?;
    let remote_nodes = scan_remote_tree(remote, &config.folder_id)
        .await
        .map_err(|e| SyncError::Scan(e.to_string()))?;
    Ok((reconcile(&local, &remote_nodes), local))
}

async fn compare_trees<R: RemoteStore>(
    config: &ImportConfig,
    remote: &R,
) -> Result<Reconciliation, SyncError> {
    let local = scan_local_tree(&config.bids_root).map_err(|e| SyncError::Scan(e.to_string()))?;
    let remote_nodes = scan_remote_tree(remote, &config.folder_id)
        .await
        .map_err(|e| SyncError::Scan(e.to_string()))?;
    Ok(reconcile(&local, &remote_nodes))
}

/// Removes all items and subfolders inside a folder. Per-node deletion
/// failures are logged and skipped; only listing failures propagate.
pub async fn empty_folder<R: RemoteStore>(
    remote: &R,
    folder_id: &str,
) -> Result<(), RemoteError> {
    clear_folder(remote, folder_id.to_string()).await
}

fn clear_folder<'a, R: RemoteStore>(
    remote: &'a R,
    folder_id: String,
) -> BoxFuture<'a, Result<(), RemoteError>> {
    async move {
        for item in remote.list_items(&folder_id).await? {
            if let Err(e) = remote.delete_item(&item.id).await {
                warn!(item = %item.name, error = %e, "Failed to delete item");
            }
        }
        for folder in remote.list_folders(&folder_id, ParentKind::Folder).await? {
            clear_folder(remote, folder.id.clone()).await?;
            if let Err(e) = remote.delete_folder(&folder.id).await {
                warn!(folder = %folder.name, error = %e, "Failed to delete folder");
            }
        }
        Ok(())
    }
    .boxed()
}
