use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tempfile::tempdir;

use bids_importer::contract::{MockRemoteStore, ParentKind, RemoteFolder, RemoteItem};
use bids_importer::upload::upload_tree;

fn file_name_of(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[tokio::test]
async fn pair_creates_one_item_and_uploads_sidecar_first() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("sub-01_T1w.nii.gz"), vec![0u8; 500]).unwrap();
    fs::write(dir.path().join("sub-01_T1w.json"), b"{}").unwrap();

    let calls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let mut remote = MockRemoteStore::new();

    let log = calls.clone();
    remote
        .expect_create_item()
        .times(1)
        .returning(move |_, _, name| {
            log.lock().unwrap().push(format!("create_item:{name}"));
            Ok(RemoteItem {
                id: "item-1".to_string(),
                name: name.to_string(),
            })
        });
    let log = calls.clone();
    remote
        .expect_upload_file_to_item()
        .times(2)
        .returning(move |item_id, path| {
            log.lock()
                .unwrap()
                .push(format!("upload:{item_id}:{}", file_name_of(path)));
            Ok(())
        });

    let report = upload_tree(
        &remote,
        dir.path(),
        "root",
        ParentKind::Folder,
        &HashSet::new(),
    )
    .await
    .expect("upload should succeed");

    assert_eq!(report.uploaded, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);
    // One composite item, sidecar uploaded before payload, never two items.
    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            "create_item:sub-01_T1w.nii.gz".to_string(),
            "upload:item-1:sub-01_T1w.json".to_string(),
            "upload:item-1:sub-01_T1w.nii.gz".to_string(),
        ]
    );
}

#[tokio::test]
async fn pair_with_one_half_skipped_makes_no_remote_calls() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("sub-01_T1w.nii.gz"), vec![0u8; 500]).unwrap();
    fs::write(dir.path().join("sub-01_T1w.json"), b"{}").unwrap();

    // No expectations: any remote call would panic the mock.
    let remote = MockRemoteStore::new();
    let mut skip = HashSet::new();
    skip.insert("sub-01_T1w.nii.gz".to_string());

    let report = upload_tree(&remote, dir.path(), "root", ParentKind::Folder, &skip)
        .await
        .expect("upload should succeed");

    assert_eq!(report.uploaded, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn fully_skipped_pair_is_counted_and_silent() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("sub-01_T1w.nii.gz"), vec![0u8; 500]).unwrap();
    fs::write(dir.path().join("sub-01_T1w.json"), b"{}").unwrap();

    let remote = MockRemoteStore::new();
    let skip: HashSet<String> = ["sub-01_T1w.nii.gz", "sub-01_T1w.json"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let report = upload_tree(&remote, dir.path(), "root", ParentKind::Folder, &skip)
        .await
        .expect("upload should succeed");

    assert_eq!(report.skipped, 2);
    assert_eq!(report.uploaded, 0);
}

#[tokio::test]
async fn lone_files_upload_directly_to_the_parent() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("sub-02_T1w.nii.gz"), vec![0u8; 100]).unwrap();
    fs::write(dir.path().join("participants.tsv"), b"participant_id\n").unwrap();
    fs::write(dir.path().join("dataset_description.json"), b"{}").unwrap();

    let calls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let mut remote = MockRemoteStore::new();

    let log = calls.clone();
    remote
        .expect_upload_file_to_parent()
        .times(3)
        .returning(move |parent_id, _, path| {
            log.lock()
                .unwrap()
                .push(format!("{parent_id}:{}", file_name_of(path)));
            Ok(())
        });

    let report = upload_tree(
        &remote,
        dir.path(),
        "root",
        ParentKind::Folder,
        &HashSet::new(),
    )
    .await
    .expect("upload should succeed");

    assert_eq!(report.uploaded, 3);
    let mut seen = calls.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            "root:dataset_description.json".to_string(),
            "root:participants.tsv".to_string(),
            "root:sub-02_T1w.nii.gz".to_string(),
        ]
    );
}

#[tokio::test]
async fn existing_folder_is_reused_when_creation_conflicts() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("anat")).unwrap();
    fs::write(dir.path().join("anat/sub-01_T1w.nii.gz"), vec![0u8; 100]).unwrap();

    let mut remote = MockRemoteStore::new();
    remote
        .expect_create_folder()
        .times(1)
        .returning(|_, _, _| Err("A folder with that name already exists here.".into()));
    remote
        .expect_list_folders()
        .times(1)
        .returning(|_, _| {
            Ok(vec![RemoteFolder {
                id: "anat-1".to_string(),
                name: "anat".to_string(),
            }])
        });
    remote
        .expect_upload_file_to_parent()
        .times(1)
        .withf(|parent_id, _, path| {
            parent_id == "anat-1" && path.ends_with("sub-01_T1w.nii.gz")
        })
        .returning(|_, _, _| Ok(()));

    let report = upload_tree(
        &remote,
        dir.path(),
        "root",
        ParentKind::Folder,
        &HashSet::new(),
    )
    .await
    .expect("upload should succeed");

    assert_eq!(report.uploaded, 1);
}

#[tokio::test]
async fn folder_creation_failure_abandons_only_that_subtree() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("anat")).unwrap();
    fs::write(dir.path().join("anat/sub-01_T1w.nii.gz"), vec![0u8; 100]).unwrap();
    fs::write(dir.path().join("participants.tsv"), b"participant_id\n").unwrap();

    let mut remote = MockRemoteStore::new();
    remote
        .expect_create_folder()
        .times(1)
        .returning(|_, _, _| Err("internal server error".into()));
    remote
        .expect_upload_file_to_parent()
        .times(1)
        .withf(|parent_id, _, path| parent_id == "root" && path.ends_with("participants.tsv"))
        .returning(|_, _, _| Ok(()));

    let report = upload_tree(
        &remote,
        dir.path(),
        "root",
        ParentKind::Folder,
        &HashSet::new(),
    )
    .await
    .expect("upload should succeed");

    // The sibling file still uploads; nothing inside anat/ is attempted.
    assert_eq!(report.uploaded, 1);
}

#[tokio::test]
async fn failed_group_does_not_abort_siblings() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.nii.gz"), vec![0u8; 10]).unwrap();
    fs::write(dir.path().join("b.nii.gz"), vec![0u8; 10]).unwrap();

    let mut remote = MockRemoteStore::new();
    remote
        .expect_upload_file_to_parent()
        .times(2)
        .returning(|_, _, path| {
            if path.ends_with("a.nii.gz") {
                Err("upload interrupted".into())
            } else {
                Ok(())
            }
        });

    let report = upload_tree(
        &remote,
        dir.path(),
        "root",
        ParentKind::Folder,
        &HashSet::new(),
    )
    .await
    .expect("upload should succeed overall");

    assert_eq!(report.uploaded, 1);
    assert_eq!(report.failed, 1);
}
