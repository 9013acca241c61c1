//! # Remote store contract
//!
//! This module defines the single trait ([`RemoteStore`]) and the concrete
//! supporting types through which the rest of the crate talks to a Girder
//! instance (or any hierarchical object store with folders containing items
//! containing files).
//!
//! ## Interface & Extensibility
//! - Implement [`RemoteStore`] to create a new store client (HTTP, mock, ...).
//! - All methods are async, returning results with a boxed error type.
//! - The core never inspects errors beyond an "already exists" substring
//!   check when creating folders; everything else is opaque message text.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests.

use std::path::Path;

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Uniform error type for remote operations: a message-carrying boxed error.
pub type RemoteError = Box<dyn std::error::Error + Send + Sync>;

/// Parsed sidecar content, attached verbatim as record metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The kind of remote parent a folder or item is created under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Folder,
    Collection,
}

impl ParentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentKind::Folder => "folder",
            ParentKind::Collection => "collection",
        }
    }
}

/// A remote item: the record that holds one or more files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
}

/// A remote folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFolder {
    pub id: String,
    pub name: String,
}

/// A file stored inside a remote item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub size: u64,
}

/// Trait for enumerating and mutating the remote folder/item/file graph.
///
/// Implemented by the real HTTP client ([`crate::client::GirderClient`]) and
/// by generated test mocks. Intended for async/await usage; implementations
/// must be `Send + Sync`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List the child items of a folder.
    async fn list_items(&self, folder_id: &str) -> Result<Vec<RemoteItem>, RemoteError>;

    /// List the child folders of a folder or collection.
    async fn list_folders(
        &self,
        parent_id: &str,
        parent_kind: ParentKind,
    ) -> Result<Vec<RemoteFolder>, RemoteError>;

    /// List the files held by an item.
    async fn list_files(&self, item_id: &str) -> Result<Vec<RemoteFile>, RemoteError>;

    /// Create a new (empty) item under the given parent.
    async fn create_item(
        &self,
        parent_id: &str,
        parent_kind: ParentKind,
        name: &str,
    ) -> Result<RemoteItem, RemoteError>;

    /// Create a new folder under the given parent. Fails with an
    /// "already exists" message if the name is taken.
    async fn create_folder(
        &self,
        parent_id: &str,
        parent_kind: ParentKind,
        name: &str,
    ) -> Result<RemoteFolder, RemoteError>;

    /// Upload a local file's bytes into an existing item.
    async fn upload_file_to_item(
        &self,
        item_id: &str,
        local_path: &Path,
    ) -> Result<(), RemoteError>;

    /// Upload a local file directly under a parent container; the store
    /// wraps it in a record named after the file.
    async fn upload_file_to_parent(
        &self,
        parent_id: &str,
        parent_kind: ParentKind,
        local_path: &Path,
    ) -> Result<(), RemoteError>;

    /// Download a remote file fully into memory.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, RemoteError>;

    /// Attach key/value metadata to an item. Idempotent on the remote side.
    async fn add_item_metadata(
        &self,
        item_id: &str,
        metadata: &Metadata,
    ) -> Result<(), RemoteError>;

    /// Attach key/value metadata to a folder. Idempotent on the remote side.
    async fn add_folder_metadata(
        &self,
        folder_id: &str,
        metadata: &Metadata,
    ) -> Result<(), RemoteError>;

    /// Delete an item and its files.
    async fn delete_item(&self, item_id: &str) -> Result<(), RemoteError>;

    /// Delete an (empty) folder.
    async fn delete_folder(&self, folder_id: &str) -> Result<(), RemoteError>;

    /// Fetch a folder by id; used as the destination pre-check.
    async fn get_folder(&self, folder_id: &str) -> Result<RemoteFolder, RemoteError>;
}
