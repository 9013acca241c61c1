//! Grouping uploader: recursively mirrors a local directory subtree onto a
//! remote parent, combining NIfTI + JSON sibling pairs into single composite
//! items and honoring a precomputed skip-set of already-synchronised paths.
//!
//! Failure semantics are best-effort per node: a failed file group or folder
//! is logged and counted, and its siblings proceed. Only the inability to
//! enumerate the local root itself aborts the pass.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::contract::{ParentKind, RemoteError, RemoteStore};
use crate::scan::{classify, join_key, logical_base_name, required_file_name, FileKind};

/// Accumulated outcome of one upload pass. `uploaded` and `skipped` count
/// files; `failed` counts file groups abandoned after an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// One member of a file group: where it lives on disk, and its path relative
/// to the scan root (the skip-set is keyed by root-relative paths).
#[derive(Debug, Clone)]
struct GroupMember {
    path: PathBuf,
    rel_path: String,
}

/// Sibling files sharing one logical base name within a single directory.
/// Lives for one directory-level pass only.
#[derive(Debug, Default)]
struct FileGroup {
    nifti: Option<GroupMember>,
    json: Option<GroupMember>,
    other: Option<GroupMember>,
}

/// Recursively uploads `root` under the given remote parent.
pub async fn upload_tree<R: RemoteStore>(
    remote: &R,
    root: &Path,
    parent_id: &str,
    parent_kind: ParentKind,
    skip: &HashSet<String>,
) -> Result<UploadReport, RemoteError> {
    if !skip.is_empty() {
        info!(count = skip.len(), "Skipping files already present remotely");
    }
    let mut report = UploadReport::default();
    upload_directory(
        remote,
        root.to_path_buf(),
        String::new(),
        parent_id.to_string(),
        parent_kind,
        skip,
        &mut report,
    )
    .await?;
    info!(
        uploaded = report.uploaded,
        skipped = report.skipped,
        failed = report.failed,
        "Upload pass finished"
    );
    Ok(report)
}

fn upload_directory<'a, R: RemoteStore>(
    remote: &'a R,
    dir: PathBuf,
    prefix: String,
    parent_id: String,
    parent_kind: ParentKind,
    skip: &'a HashSet<String>,
    report: &'a mut UploadReport,
) -> BoxFuture<'a, Result<(), RemoteError>> {
    async move {
        let mut groups: BTreeMap<String, FileGroup> = BTreeMap::new();
        let mut subdirs: Vec<(String, PathBuf)> = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if path.is_dir() {
                subdirs.push((name, path));
                continue;
            }
            let member = GroupMember {
                rel_path: join_key(&prefix, &name),
                path,
            };
            let group = groups.entry(logical_base_name(&name).to_string()).or_default();
            match classify(&name) {
                FileKind::Nifti => group.nifti = Some(member),
                FileKind::Json => group.json = Some(member),
                FileKind::Other => group.other = Some(member),
            }
        }

        for (base, group) in &groups {
            if let Err(e) =
                upload_group(remote, base, group, &parent_id, parent_kind, skip, report).await
            {
                warn!(base = %base, error = %e, "Failed to upload file group");
                report.failed += 1;
            }
        }

        for (dir_name, dir_path) in subdirs {
            let folder_id = match remote
                .create_folder(&parent_id, parent_kind, &dir_name)
                .await
            {
                Ok(folder) => {
                    info!(folder = %dir_name, "Created folder");
                    folder.id
                }
                Err(e) if is_already_exists(&e) => {
                    debug!(folder = %dir_name, "Folder already exists, using existing folder");
                    match find_existing_folder(remote, &parent_id, parent_kind, &dir_name).await {
                        Some(id) => id,
                        None => {
                            warn!(folder = %dir_name, "Could not find or create folder");
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!(folder = %dir_name, error = %e, "Failed to create folder");
                    continue;
                }
            };

            let child_prefix = join_key(&prefix, &dir_name);
            if let Err(e) = upload_directory(
                remote,
                dir_path,
                child_prefix,
                folder_id,
                ParentKind::Folder,
                skip,
                report,
            )
            .await
            {
                warn!(folder = %dir_name, error = %e, "Failed to upload folder contents");
            }
        }

        Ok(())
    }
    .boxed()
}

fn is_already_exists(error: &RemoteError) -> bool {
    error.to_string().to_lowercase().contains("already exists")
}

async fn find_existing_folder<R: RemoteStore>(
    remote: &R,
    parent_id: &str,
    parent_kind: ParentKind,
    name: &str,
) -> Option<String> {
    match remote.list_folders(parent_id, parent_kind).await {
        Ok(folders) => folders
            .into_iter()
            .find(|folder| folder.name == name)
            .map(|folder| folder.id),
        Err(e) => {
            warn!(folder = %name, error = %e, "Failed to list folders for reuse lookup");
            None
        }
    }
}

async fn upload_group<R: RemoteStore>(
    remote: &R,
    base: &str,
    group: &FileGroup,
    parent_id: &str,
    parent_kind: ParentKind,
    skip: &HashSet<String>,
    report: &mut UploadReport,
) -> Result<(), RemoteError> {
    match (&group.nifti, &group.json) {
        (Some(nifti), Some(json)) => {
            let nifti_skipped = skip.contains(&nifti.rel_path);
            let json_skipped = skip.contains(&json.rel_path);
            if nifti_skipped || json_skipped {
                if nifti_skipped != json_skipped {
                    // One half is already remote-resident; uploading the other
                    // alone would create a partial composite item next to it.
                    debug!(base = %base, "Pair half already present, skipping both");
                } else {
                    debug!(base = %base, "Skipping existing pair");
                }
                report.skipped += 2;
                return Ok(());
            }

            let item_name = required_file_name(&nifti.path)?;
            let sidecar_name = required_file_name(&json.path)?;
            info!(nifti = %item_name, json = %sidecar_name, "Uploading BIDS pair");
            let item = remote.create_item(parent_id, parent_kind, &item_name).await?;
            // Sidecar first: any reactive remote behaviour should observe the
            // metadata before the payload arrives.
            remote.upload_file_to_item(&item.id, &json.path).await?;
            remote.upload_file_to_item(&item.id, &nifti.path).await?;
            info!(item = %item_name, "Created item with NIfTI + JSON");
            report.uploaded += 2;
        }
        (Some(nifti), None) => {
            upload_single(remote, nifti, "NIfTI (no JSON)", parent_id, parent_kind, skip, report)
                .await?;
        }
        (None, Some(json)) => {
            upload_single(remote, json, "JSON", parent_id, parent_kind, skip, report).await?;
        }
        (None, None) => {
            if let Some(other) = &group.other {
                upload_single(remote, other, "file", parent_id, parent_kind, skip, report).await?;
            }
        }
    }
    Ok(())
}

async fn upload_single<R: RemoteStore>(
    remote: &R,
    member: &GroupMember,
    label: &str,
    parent_id: &str,
    parent_kind: ParentKind,
    skip: &HashSet<String>,
    report: &mut UploadReport,
) -> Result<(), RemoteError> {
    if skip.contains(&member.rel_path) {
        debug!(path = %member.rel_path, "Skipping existing file");
        report.skipped += 1;
        return Ok(());
    }
    info!(file = %required_file_name(&member.path)?, kind = %label, "Uploading");
    remote
        .upload_file_to_parent(parent_id, parent_kind, &member.path)
        .await?;
    report.uploaded += 1;
    Ok(())
}
