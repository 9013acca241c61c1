use bids_importer::contract::{MockRemoteStore, RemoteFile, RemoteFolder, RemoteItem};
use bids_importer::inventory::scan_remote_tree;

fn item(id: &str, name: &str) -> RemoteItem {
    RemoteItem {
        id: id.to_string(),
        name: name.to_string(),
    }
}

fn file(id: &str, name: &str, size: u64) -> RemoteFile {
    RemoteFile {
        id: id.to_string(),
        name: name.to_string(),
        size,
    }
}

#[tokio::test]
async fn flattens_nested_tree_with_aggregate_sizes() {
    let mut remote = MockRemoteStore::new();
    remote.expect_list_items().returning(|folder_id| {
        if folder_id == "root" {
            Ok(vec![item("dd-item", "dataset_description.json")])
        } else {
            Ok(vec![item("t1-item", "sub-01_T1w.nii.gz")])
        }
    });
    remote.expect_list_files().returning(|item_id| {
        if item_id == "dd-item" {
            Ok(vec![file("dd-file", "dataset_description.json", 20)])
        } else {
            // A composite item: sidecar + payload merged.
            Ok(vec![
                file("f-json", "sub-01_T1w.json", 50),
                file("f-nii", "sub-01_T1w.nii.gz", 500),
            ])
        }
    });
    remote.expect_list_folders().returning(|parent_id, _| {
        if parent_id == "root" {
            Ok(vec![RemoteFolder {
                id: "anat-1".to_string(),
                name: "anat".to_string(),
            }])
        } else {
            Ok(vec![])
        }
    });

    let nodes = scan_remote_tree(&remote, "root").await.unwrap();

    assert_eq!(nodes.len(), 2);

    let description = &nodes["dataset_description.json"];
    assert_eq!(description.item_id, "dd-item");
    assert_eq!(description.size, 20);

    let t1 = &nodes["anat/sub-01_T1w.nii.gz"];
    assert_eq!(t1.item_id, "t1-item");
    assert_eq!(t1.size, 550);
    assert_eq!(t1.files.len(), 2);
}

#[tokio::test]
async fn empty_remote_folder_yields_empty_mapping() {
    let mut remote = MockRemoteStore::new();
    remote.expect_list_items().returning(|_| Ok(vec![]));
    remote.expect_list_folders().returning(|_, _| Ok(vec![]));

    let nodes = scan_remote_tree(&remote, "root").await.unwrap();
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn listing_failure_propagates() {
    let mut remote = MockRemoteStore::new();
    remote
        .expect_list_items()
        .returning(|_| Err("read access denied".into()));

    let result = scan_remote_tree(&remote, "root").await;
    assert!(result.is_err());
}
