#![doc = "bids-importer: synchronise BIDS neuroimaging datasets into a Girder instance."]

//! This crate reconciles a local BIDS directory tree against a Girder
//! folder and performs an idempotent, structure-preserving upload: sibling
//! NIfTI + JSON files merge into single composite items, already-present
//! files can be skipped under a size-tolerance policy, and sidecar content
//! is propagated as metadata on the records it describes.
//!
//! # Pipeline
//! [`scan`] (local) + [`inventory`] (remote) → [`reconcile`] → skip-set →
//! [`upload`] → [`metadata`], orchestrated by [`synchronise`]. The remote
//! store is reached through the [`contract::RemoteStore`] trait, implemented
//! over HTTP by [`client::GirderClient`] and by generated mocks in tests.

pub mod cli;
pub mod client;
pub mod config;
pub mod contract;
pub mod inventory;
pub mod metadata;
pub mod reconcile;
pub mod scan;
pub mod synchronise;
pub mod upload;
pub mod validate;
