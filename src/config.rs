use std::path::PathBuf;

use tracing::{debug, info};

/// How existing remote content is treated before the upload pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Delete the destination folder's contents before uploading.
    ResetDatabase,
    /// Leave existing content in place; same-name uploads land next to it.
    OverwriteOnSameName,
}

/// Explicit run context threaded through every component call; there is no
/// global configuration state.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub api_url: String,
    pub api_key: String,
    pub folder_id: String,
    pub bids_root: PathBuf,
    pub mode: ImportMode,
    pub skip_existing: bool,
    /// Accept invalid TLS certificates (self-signed instances).
    pub insecure: bool,
}

impl ImportConfig {
    pub fn trace_loaded(&self) {
        info!(
            api_url = %self.api_url,
            folder_id = %self.folder_id,
            bids_root = %self.bids_root.display(),
            mode = ?self.mode,
            skip_existing = self.skip_existing,
            "Loaded import configuration"
        );
        debug!(insecure = self.insecure, "TLS trust configuration");
    }
}
