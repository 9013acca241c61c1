//! Remote tree scanner: recursively walks the store's folder/item/file graph
//! and flattens it into the same path-keyed shape the local scanner produces.
//!
//! Recursion terminates on a finite, acyclic folder graph. A cyclic remote
//! graph is out of scope and may not terminate; the store is assumed to be a
//! well-formed tree with unique paths, so merges never collide.

use std::collections::BTreeMap;

use futures::future::{BoxFuture, FutureExt};
use tracing::info;

use crate::contract::{ParentKind, RemoteError, RemoteFile, RemoteStore};
use crate::scan::join_key;

/// One remote item, flattened: aggregate size is the sum of its constituent
/// files (a composite item may hold a NIfTI + JSON pair already merged).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    pub item_id: String,
    pub size: u64,
    pub files: Vec<RemoteFile>,
}

/// Recursively enumerates a remote folder into a path -> node mapping.
pub async fn scan_remote_tree<R: RemoteStore>(
    remote: &R,
    folder_id: &str,
) -> Result<BTreeMap<String, RemoteNode>, RemoteError> {
    let mut nodes = BTreeMap::new();
    scan_folder(remote, folder_id.to_string(), String::new(), &mut nodes).await?;
    info!(count = nodes.len(), "Scanned remote structure");
    Ok(nodes)
}

fn scan_folder<'a, R: RemoteStore>(
    remote: &'a R,
    folder_id: String,
    prefix: String,
    out: &'a mut BTreeMap<String, RemoteNode>,
) -> BoxFuture<'a, Result<(), RemoteError>> {
    async move {
        for item in remote.list_items(&folder_id).await? {
            let files = remote.list_files(&item.id).await?;
            let size = files.iter().map(|file| file.size).sum();
            out.insert(
                join_key(&prefix, &item.name),
                RemoteNode {
                    item_id: item.id,
                    size,
                    files,
                },
            );
        }
        for folder in remote.list_folders(&folder_id, ParentKind::Folder).await? {
            let child_prefix = join_key(&prefix, &folder.name);
            scan_folder(remote, folder.id, child_prefix, out).await?;
        }
        Ok(())
    }
    .boxed()
}
