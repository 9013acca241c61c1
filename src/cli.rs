//! # bids-importer CLI Interface (Module)
//!
//! This module implements the full CLI for bids-importer: command parsing,
//! argument validation, and the async [`run`] entrypoint shared with the
//! integration tests. All business logic (scanning, reconciliation, upload,
//! metadata propagation) lives in the sibling library modules; this module
//! is strictly CLI glue and fatal-path wiring.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::client::GirderClient;
use crate::config::{ImportConfig, ImportMode};
use crate::reconcile::print_report;
use crate::synchronise::{compare, synchronise};
use crate::validate::validate_bids;

/// CLI for bids-importer: upload BIDS datasets to Girder, preserving the
/// directory hierarchy and combining NIfTI + JSON files into single items.
#[derive(Parser)]
#[clap(
    name = "bids-importer",
    version,
    about = "Upload BIDS datasets to a Girder instance, preserving structure and combining NIfTI + JSON pairs"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// Path to the BIDS directory
    #[clap(long)]
    pub bids_dir: PathBuf,

    /// Girder API URL (e.g. http://localhost:8081/api/v1)
    #[clap(long)]
    pub api_url: String,

    /// Girder API key; falls back to the GIRDER_API_KEY environment variable
    #[clap(long)]
    pub api_key: Option<String>,

    /// Destination Girder folder id
    #[clap(long)]
    pub folder_id: String,

    /// Accept invalid TLS certificates (self-signed instances)
    #[clap(long)]
    pub insecure: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload the dataset, skipping or resetting existing remote content
    Sync {
        #[clap(flatten)]
        connection: ConnectionArgs,

        /// Delete the destination folder contents before uploading
        #[clap(long)]
        reset: bool,

        /// Skip BIDS validation before upload
        #[clap(long)]
        no_validate: bool,

        /// Skip files already present on Girder (within the size tolerance)
        #[clap(long)]
        skip_existing: bool,
    },
    /// Compare local files against Girder content without uploading
    Compare {
        #[clap(flatten)]
        connection: ConnectionArgs,
    },
}

fn build_config(
    connection: ConnectionArgs,
    mode: ImportMode,
    skip_existing: bool,
) -> Result<ImportConfig> {
    let api_key = match connection
        .api_key
        .or_else(|| std::env::var("GIRDER_API_KEY").ok())
    {
        Some(key) => key,
        None => anyhow::bail!("no API key: pass --api-key or set GIRDER_API_KEY"),
    };
    Ok(ImportConfig {
        api_url: connection.api_url,
        api_key,
        folder_id: connection.folder_id,
        bids_root: connection.bids_dir,
        mode,
        skip_existing,
        insecure: connection.insecure,
    })
}

/// Builds the client and runs the fatal pre-flight steps: connectivity
/// check, then authentication. Nothing has been mutated if these fail.
async fn connect(config: &ImportConfig) -> Result<GirderClient> {
    let mut client = GirderClient::new(&config.api_url, config.insecure)
        .map_err(|e| anyhow::Error::msg(format!("failed to construct Girder client: {e}")))?;
    client
        .check_connection()
        .await
        .map_err(|e| anyhow::Error::msg(format!("cannot connect to Girder, aborting: {e}")))?;
    client
        .authenticate(&config.api_key)
        .await
        .map_err(|e| anyhow::Error::msg(format!("failed to authenticate: {e}")))?;
    Ok(client)
}

/// Extracted async CLI logic entrypoint for integration tests and main().
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sync {
            connection,
            reset,
            no_validate,
            skip_existing,
        } => {
            let mode = if reset {
                ImportMode::ResetDatabase
            } else {
                ImportMode::OverwriteOnSameName
            };
            let config = build_config(connection, mode, skip_existing)?;
            config.trace_loaded();

            if no_validate {
                info!("Skipping BIDS validation (--no-validate)");
            } else {
                match validate_bids(&config.bids_root) {
                    Ok(true) => info!("BIDS dataset is valid"),
                    Ok(false) => {
                        anyhow::bail!("BIDS validation failed. Use --no-validate to skip.")
                    }
                    Err(e) => anyhow::bail!("BIDS validation unavailable: {e}"),
                }
            }

            let client = connect(&config).await?;
            let report = synchronise(&config, &client).await?;

            println!("\nSynchronisation summary:");
            println!("  Uploaded files:   {}", report.uploaded);
            println!("  Skipped files:    {}", report.skipped);
            println!("  Failed groups:    {}", report.failed);
            println!("  Metadata applied: {}", report.metadata_applied);
            println!("  Metadata failed:  {}", report.metadata_failed);
            info!(?report, "Upload complete");
            Ok(())
        }
        Commands::Compare { connection } => {
            let config = build_config(connection, ImportMode::OverwriteOnSameName, false)?;
            config.trace_loaded();

            let client = connect(&config).await?;
            let (comparison, local) = compare(&config, &client).await?;
            print_report(&comparison, &local);
            Ok(())
        }
    }
}
