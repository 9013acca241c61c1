//! Metadata propagator: walks the remote tree after an upload and attaches
//! each JSON sidecar's parsed content as metadata on its associated record.
//!
//! Association rules: `dataset_description.json` describes the folder it
//! lives in; any other sidecar is matched against sibling items, preferring
//! an exact `<base>.nii.gz` / `<base>.nii` name match and falling back to a
//! prefix match. The prefix fallback can misassociate when one base name is
//! a prefix of another; it is logged at reduced severity, not disambiguated.
//! Propagation failures are counted and never abort the run.

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::contract::{Metadata, ParentKind, RemoteError, RemoteFile, RemoteItem, RemoteStore};
use crate::scan::{classify, FileKind};

/// Sidecar name that describes a whole dataset folder rather than a payload.
pub const DATASET_DESCRIPTION: &str = "dataset_description.json";

/// Running success/failure counters, reported at the end of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataReport {
    pub applied: usize,
    pub failed: usize,
}

/// The record a sidecar's content gets attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Association {
    Folder(String),
    Item(String),
}

/// Walks the remote tree rooted at `folder_id` and propagates all sidecars.
pub async fn propagate_metadata<R: RemoteStore>(
    remote: &R,
    folder_id: &str,
) -> Result<MetadataReport, RemoteError> {
    let mut report = MetadataReport::default();
    propagate_folder(remote, folder_id.to_string(), &mut report).await?;
    info!(
        applied = report.applied,
        failed = report.failed,
        "Metadata propagation finished"
    );
    Ok(report)
}

fn propagate_folder<'a, R: RemoteStore>(
    remote: &'a R,
    folder_id: String,
    report: &'a mut MetadataReport,
) -> BoxFuture<'a, Result<(), RemoteError>> {
    async move {
        let items = remote.list_items(&folder_id).await?;
        for item in &items {
            let files = match remote.list_files(&item.id).await {
                Ok(files) => files,
                Err(e) => {
                    warn!(item = %item.name, error = %e, "Failed to list item files");
                    report.failed += 1;
                    continue;
                }
            };
            for file in &files {
                if classify(&file.name) != FileKind::Json {
                    continue;
                }
                apply_sidecar(remote, &folder_id, &items, file, report).await;
            }
        }

        for folder in remote.list_folders(&folder_id, ParentKind::Folder).await? {
            propagate_folder(remote, folder.id, report).await?;
        }
        Ok(())
    }
    .boxed()
}

async fn apply_sidecar<R: RemoteStore>(
    remote: &R,
    folder_id: &str,
    siblings: &[RemoteItem],
    sidecar: &RemoteFile,
    report: &mut MetadataReport,
) {
    let target = match associate(folder_id, siblings, &sidecar.name) {
        Some(target) => target,
        None => {
            warn!(sidecar = %sidecar.name, "No associated record for sidecar");
            report.failed += 1;
            return;
        }
    };

    let bytes = match remote.download_file(&sidecar.id).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(sidecar = %sidecar.name, error = %e, "Failed to download sidecar");
            report.failed += 1;
            return;
        }
    };

    let metadata: Metadata = match serde_json::from_slice(&bytes) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(sidecar = %sidecar.name, error = %e, "Sidecar is not a JSON object");
            report.failed += 1;
            return;
        }
    };

    let outcome = match &target {
        Association::Folder(id) => remote.add_folder_metadata(id, &metadata).await,
        Association::Item(id) => remote.add_item_metadata(id, &metadata).await,
    };
    match outcome {
        Ok(()) => report.applied += 1,
        Err(e) => {
            warn!(sidecar = %sidecar.name, error = %e, "Failed to add metadata");
            report.failed += 1;
        }
    }
}

/// Resolves which record a sidecar describes, if any.
fn associate(folder_id: &str, siblings: &[RemoteItem], sidecar_name: &str) -> Option<Association> {
    if sidecar_name == DATASET_DESCRIPTION {
        return Some(Association::Folder(folder_id.to_string()));
    }

    let base = sidecar_name.strip_suffix(".json").unwrap_or(sidecar_name);

    for item in siblings {
        if item.name == format!("{base}.nii.gz") || item.name == format!("{base}.nii") {
            return Some(Association::Item(item.id.clone()));
        }
    }

    for item in siblings {
        if item.name.starts_with(base) {
            debug!(sidecar = %sidecar_name, item = %item.name, "Loose match for sidecar");
            return Some(Association::Item(item.id.clone()));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str) -> RemoteItem {
        RemoteItem {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn dataset_description_associates_with_the_folder_itself() {
        let siblings = vec![
            item("dd", DATASET_DESCRIPTION),
            item("t1", "dataset_description_extra.nii.gz"),
        ];
        let target = associate("root", &siblings, DATASET_DESCRIPTION);
        assert_eq!(target, Some(Association::Folder("root".to_string())));
    }

    #[test]
    fn exact_payload_suffix_match_is_preferred_over_prefix() {
        let siblings = vec![
            item("long", "sub-01_T1w_extra.nii.gz"),
            item("t1", "sub-01_T1w.nii.gz"),
        ];
        let target = associate("root", &siblings, "sub-01_T1w.json");
        assert_eq!(target, Some(Association::Item("t1".to_string())));
    }

    #[test]
    fn falls_back_to_prefix_match() {
        let siblings = vec![item("bold", "sub-01_task-rest_bold.nii.gz")];
        let target = associate("root", &siblings, "sub-01_task-rest.json");
        assert_eq!(target, Some(Association::Item("bold".to_string())));
    }

    #[test]
    fn no_match_yields_none() {
        let siblings = vec![item("other", "unrelated.nii.gz")];
        assert_eq!(associate("root", &siblings, "sub-01_T1w.json"), None);
    }
}
