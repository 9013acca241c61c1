//! # Girder client (HTTP bridge)
//!
//! This module bridges the [`RemoteStore`] trait to the actual Girder REST
//! API. It owns the transport: URL normalisation, the connectivity
//! pre-check, API-key authentication and the `Girder-Token` header, and the
//! two-step file upload protocol (`POST /file` then `POST /file/chunk`).
//!
//! All transport errors are flattened into the uniform [`RemoteError`]
//! message form; callers only ever inspect the message text.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::{error, info};

use crate::contract::{
    Metadata, ParentKind, RemoteError, RemoteFile, RemoteFolder, RemoteItem, RemoteStore,
};
use crate::scan::required_file_name;

const CONNECT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ItemDoc {
    #[serde(rename = "_id")]
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct FolderDoc {
    #[serde(rename = "_id")]
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct FileDoc {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct UploadDoc {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "authToken")]
    auth_token: AuthToken,
}

#[derive(Debug, Deserialize)]
struct AuthToken {
    token: String,
}

/// Blocking-style sequential client for one Girder instance.
pub struct GirderClient {
    http: reqwest::Client,
    /// Full API root, e.g. `http://localhost:8081/api/v1`, no trailing slash.
    api_url: String,
    /// Scheme + authority only, used by the connectivity pre-check.
    base_url: String,
    token: Option<String>,
}

impl GirderClient {
    /// Builds a client for `api_url`. `insecure` disables TLS certificate
    /// verification for instances with self-signed certificates.
    pub fn new(api_url: &str, insecure: bool) -> Result<Self, RemoteError> {
        let api_url = normalize_api_url(api_url);
        let base_url = base_of(&api_url);
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()?;
        Ok(Self {
            http,
            api_url,
            base_url,
            token: None,
        })
    }

    /// Pre-flight connectivity check against the server root. Fatal to the
    /// run when it fails; nothing has been mutated yet.
    pub async fn check_connection(&self) -> Result<(), RemoteError> {
        let response = self
            .http
            .get(&self.base_url)
            .timeout(CONNECT_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.base_url, error = %e, "Connection failed");
                e
            })?;
        if response.status().is_success() {
            info!("Girder connection successful");
            Ok(())
        } else {
            error!(status = %response.status(), "Connection failed");
            Err(format!("connection check failed with status {}", response.status()).into())
        }
    }

    /// Exchanges an API key for a session token via `/api_key/token`.
    pub async fn authenticate(&mut self, api_key: &str) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(format!("{}/api_key/token", self.api_url))
            .query(&[("key", api_key)])
            .send()
            .await?;
        let token: TokenResponse = expect_ok(response).await?.json().await?;
        self.token = Some(token.auth_token.token);
        info!("Authenticated against Girder");
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}/{}", self.api_url, path));
        if let Some(token) = &self.token {
            builder = builder.header("Girder-Token", token);
        }
        builder
    }
}

/// Maps non-2xx responses to a message error carrying the response body, so
/// that server-side conflict messages ("already exists") stay inspectable.
async fn expect_ok(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<failed to decode response body>"));
    Err(format!("Girder returned {status}: {body}").into())
}

fn normalize_api_url(raw: &str) -> String {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    with_scheme.trim_end_matches('/').to_string()
}

fn base_of(api_url: &str) -> String {
    match api_url.find("://") {
        Some(scheme_end) => {
            let authority_start = scheme_end + 3;
            match api_url[authority_start..].find('/') {
                Some(path_start) => api_url[..authority_start + path_start].to_string(),
                None => api_url.to_string(),
            }
        }
        None => api_url.to_string(),
    }
}

#[async_trait]
impl RemoteStore for GirderClient {
    async fn list_items(&self, folder_id: &str) -> Result<Vec<RemoteItem>, RemoteError> {
        let response = self
            .request(Method::GET, "item")
            .query(&[("folderId", folder_id), ("limit", "0")])
            .send()
            .await?;
        let docs: Vec<ItemDoc> = expect_ok(response).await?.json().await?;
        Ok(docs
            .into_iter()
            .map(|doc| RemoteItem {
                id: doc.id,
                name: doc.name,
            })
            .collect())
    }

    async fn list_folders(
        &self,
        parent_id: &str,
        parent_kind: ParentKind,
    ) -> Result<Vec<RemoteFolder>, RemoteError> {
        let response = self
            .request(Method::GET, "folder")
            .query(&[
                ("parentType", parent_kind.as_str()),
                ("parentId", parent_id),
                ("limit", "0"),
            ])
            .send()
            .await?;
        let docs: Vec<FolderDoc> = expect_ok(response).await?.json().await?;
        Ok(docs
            .into_iter()
            .map(|doc| RemoteFolder {
                id: doc.id,
                name: doc.name,
            })
            .collect())
    }

    async fn list_files(&self, item_id: &str) -> Result<Vec<RemoteFile>, RemoteError> {
        let response = self
            .request(Method::GET, &format!("item/{item_id}/files"))
            .query(&[("limit", "0")])
            .send()
            .await?;
        let docs: Vec<FileDoc> = expect_ok(response).await?.json().await?;
        Ok(docs
            .into_iter()
            .map(|doc| RemoteFile {
                id: doc.id,
                name: doc.name,
                size: doc.size,
            })
            .collect())
    }

    async fn create_item(
        &self,
        parent_id: &str,
        parent_kind: ParentKind,
        name: &str,
    ) -> Result<RemoteItem, RemoteError> {
        let request = self.request(Method::POST, "item");
        // Folders address items through folderId; other parents use the
        // generic parentType/parentId pair.
        let request = match parent_kind {
            ParentKind::Folder => request.query(&[("folderId", parent_id), ("name", name)]),
            ParentKind::Collection => request.query(&[
                ("parentType", parent_kind.as_str()),
                ("parentId", parent_id),
                ("name", name),
            ]),
        };
        let doc: ItemDoc = expect_ok(request.send().await?).await?.json().await?;
        Ok(RemoteItem {
            id: doc.id,
            name: doc.name,
        })
    }

    async fn create_folder(
        &self,
        parent_id: &str,
        parent_kind: ParentKind,
        name: &str,
    ) -> Result<RemoteFolder, RemoteError> {
        let response = self
            .request(Method::POST, "folder")
            .query(&[
                ("parentType", parent_kind.as_str()),
                ("parentId", parent_id),
                ("name", name),
            ])
            .send()
            .await?;
        let doc: FolderDoc = expect_ok(response).await?.json().await?;
        Ok(RemoteFolder {
            id: doc.id,
            name: doc.name,
        })
    }

    async fn upload_file_to_item(
        &self,
        item_id: &str,
        local_path: &Path,
    ) -> Result<(), RemoteError> {
        let name = required_file_name(local_path)?;
        let bytes = std::fs::read(local_path)?;
        let size = bytes.len().to_string();

        let response = self
            .request(Method::POST, "file")
            .query(&[
                ("parentType", "item"),
                ("parentId", item_id),
                ("name", name.as_str()),
                ("size", size.as_str()),
            ])
            .send()
            .await?;
        let upload: UploadDoc = expect_ok(response).await?.json().await?;

        // A zero-byte upload is finalised by the initial request.
        if bytes.is_empty() {
            return Ok(());
        }

        let response = self
            .request(Method::POST, "file/chunk")
            .query(&[("uploadId", upload.id.as_str()), ("offset", "0")])
            .body(bytes)
            .send()
            .await?;
        expect_ok(response).await?;
        Ok(())
    }

    async fn upload_file_to_parent(
        &self,
        parent_id: &str,
        parent_kind: ParentKind,
        local_path: &Path,
    ) -> Result<(), RemoteError> {
        let name = required_file_name(local_path)?;
        let item = self.create_item(parent_id, parent_kind, &name).await?;
        self.upload_file_to_item(&item.id, local_path).await
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, RemoteError> {
        let response = self
            .request(Method::GET, &format!("file/{file_id}/download"))
            .send()
            .await?;
        let bytes = expect_ok(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn add_item_metadata(
        &self,
        item_id: &str,
        metadata: &Metadata,
    ) -> Result<(), RemoteError> {
        let response = self
            .request(Method::PUT, &format!("item/{item_id}/metadata"))
            .json(metadata)
            .send()
            .await?;
        expect_ok(response).await?;
        Ok(())
    }

    async fn add_folder_metadata(
        &self,
        folder_id: &str,
        metadata: &Metadata,
    ) -> Result<(), RemoteError> {
        let response = self
            .request(Method::PUT, &format!("folder/{folder_id}/metadata"))
            .json(metadata)
            .send()
            .await?;
        expect_ok(response).await?;
        Ok(())
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), RemoteError> {
        let response = self
            .request(Method::DELETE, &format!("item/{item_id}"))
            .send()
            .await?;
        expect_ok(response).await?;
        Ok(())
    }

    async fn delete_folder(&self, folder_id: &str) -> Result<(), RemoteError> {
        let response = self
            .request(Method::DELETE, &format!("folder/{folder_id}"))
            .send()
            .await?;
        expect_ok(response).await?;
        Ok(())
    }

    async fn get_folder(&self, folder_id: &str) -> Result<RemoteFolder, RemoteError> {
        let response = self
            .request(Method::GET, &format!("folder/{folder_id}"))
            .send()
            .await?;
        let doc: FolderDoc = expect_ok(response).await?.json().await?;
        Ok(RemoteFolder {
            id: doc.id,
            name: doc.name,
        })
    }
}
