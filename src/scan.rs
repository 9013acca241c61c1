//! Local tree scanner: walks a BIDS directory and builds a flat mapping of
//! root-relative path -> file record, classifying each file by suffix.
//!
//! Path keys always use forward-slash separators, regardless of platform;
//! the empty key denotes the scan root itself. Symlink loops are not handled.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

/// Classification of a scanned file by recognized suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Volumetric image payload: `.nii.gz` or `.nii`.
    Nifti,
    /// Structured metadata sidecar: `.json`.
    Json,
    /// Anything else (`.tsv`, `.txt`, ...).
    Other,
}

/// One local file as seen by a single scan invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    pub size: u64,
    pub kind: FileKind,
}

pub fn classify(file_name: &str) -> FileKind {
    if file_name.ends_with(".nii.gz") || file_name.ends_with(".nii") {
        FileKind::Nifti
    } else if file_name.ends_with(".json") {
        FileKind::Json
    } else {
        FileKind::Other
    }
}

/// Strips the longest recognized suffix from a file name, yielding the
/// logical base name used to group NIfTI + JSON siblings.
pub fn logical_base_name(file_name: &str) -> &str {
    if let Some(base) = file_name.strip_suffix(".nii.gz") {
        base
    } else if let Some(base) = file_name.strip_suffix(".nii") {
        base
    } else if let Some(base) = file_name.strip_suffix(".json") {
        base
    } else {
        match file_name.rsplit_once('.') {
            Some(("", _)) | None => file_name,
            Some((stem, _)) => stem,
        }
    }
}

/// Joins a root-relative prefix and a child name with a forward slash.
pub fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Borrowed file name of a path, if it has a representable one.
pub fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// File name of a path, or a message error for paths without one.
pub fn required_file_name(path: &Path) -> Result<String, crate::contract::RemoteError> {
    file_name(path)
        .map(str::to_string)
        .ok_or_else(|| format!("file has no representable name: {}", path.display()).into())
}

/// Scans a local BIDS tree, visiting every file exactly once.
pub fn scan_local_tree(root: &Path) -> io::Result<BTreeMap<String, LocalFile>> {
    let mut files = BTreeMap::new();
    walk(root, "", &mut files)?;
    info!(count = files.len(), root = %root.display(), "Scanned local BIDS structure");
    Ok(files)
}

fn walk(dir: &Path, prefix: &str, out: &mut BTreeMap<String, LocalFile>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() {
            walk(&path, &join_key(prefix, &name), out)?;
        } else {
            let size = entry.metadata()?.len();
            out.insert(
                join_key(prefix, &name),
                LocalFile {
                    path,
                    size,
                    kind: classify(&name),
                },
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn classifies_by_suffix() {
        assert_eq!(classify("sub-01_T1w.nii.gz"), FileKind::Nifti);
        assert_eq!(classify("sub-01_T1w.nii"), FileKind::Nifti);
        assert_eq!(classify("sub-01_T1w.json"), FileKind::Json);
        assert_eq!(classify("participants.tsv"), FileKind::Other);
        assert_eq!(classify("README"), FileKind::Other);
    }

    #[test]
    fn strips_longest_recognized_suffix() {
        assert_eq!(logical_base_name("sub-01_T1w.nii.gz"), "sub-01_T1w");
        assert_eq!(logical_base_name("sub-01_T1w.nii"), "sub-01_T1w");
        assert_eq!(logical_base_name("sub-01_T1w.json"), "sub-01_T1w");
        assert_eq!(logical_base_name("participants.tsv"), "participants");
        assert_eq!(logical_base_name("README"), "README");
        assert_eq!(logical_base_name(".hidden"), ".hidden");
    }

    #[test]
    fn scans_nested_tree_with_forward_slash_keys() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("anat")).unwrap();
        fs::write(dir.path().join("dataset_description.json"), b"{}").unwrap();
        fs::write(dir.path().join("anat/sub-01_T1w.nii.gz"), vec![0u8; 500]).unwrap();
        fs::write(dir.path().join("anat/sub-01_T1w.json"), vec![0u8; 50]).unwrap();

        let files = scan_local_tree(dir.path()).unwrap();
        assert_eq!(files.len(), 3);

        let nifti = &files["anat/sub-01_T1w.nii.gz"];
        assert_eq!(nifti.size, 500);
        assert_eq!(nifti.kind, FileKind::Nifti);

        let sidecar = &files["anat/sub-01_T1w.json"];
        assert_eq!(sidecar.size, 50);
        assert_eq!(sidecar.kind, FileKind::Json);

        assert_eq!(files["dataset_description.json"].kind, FileKind::Json);
    }
}
