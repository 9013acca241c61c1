//! Reconciler: pure diff of the local and remote flat mappings.
//!
//! Equality is approximate by design: remote storage may apply transparent
//! compression or metadata overhead that perturbs exact byte counts without
//! indicating genuinely different content, so two sizes within
//! [`SIZE_TOLERANCE`] of each other count as the same file. No content hash
//! is computed; a changed file whose size lands inside the tolerance is
//! misclassified as existing. Known limitation, not to be silently fixed.

use std::collections::{BTreeMap, HashSet};

use crate::inventory::RemoteNode;
use crate::scan::LocalFile;

/// Relative size tolerance: 1% of the larger of the two sizes.
pub const SIZE_TOLERANCE: f64 = 0.01;

/// A path present on both sides, with both sizes and the remote item id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeMatch {
    pub path: String,
    pub local_size: u64,
    pub remote_size: u64,
    pub item_id: String,
}

/// The four disjoint outcome sets of a reconciliation.
///
/// `new`, `existing` and `modified` together cover exactly the local path
/// set; `remote_only` covers exactly the remote paths absent locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Present only locally.
    pub new: Vec<String>,
    /// Present on both sides with sizes within tolerance.
    pub existing: Vec<SizeMatch>,
    /// Present on both sides with sizes outside tolerance.
    pub modified: Vec<SizeMatch>,
    /// Present only remotely.
    pub remote_only: Vec<String>,
}

impl Reconciliation {
    /// Paths excluded from re-upload: everything classified as existing.
    pub fn skip_set(&self) -> HashSet<String> {
        self.existing.iter().map(|m| m.path.clone()).collect()
    }
}

/// Diffs the two mappings. Pure function of its inputs.
pub fn reconcile(
    local: &BTreeMap<String, LocalFile>,
    remote: &BTreeMap<String, RemoteNode>,
) -> Reconciliation {
    let mut result = Reconciliation::default();

    for (path, record) in local {
        match remote.get(path) {
            None => result.new.push(path.clone()),
            Some(node) => {
                let size_diff = record.size.abs_diff(node.size);
                let tolerance = SIZE_TOLERANCE * record.size.max(node.size) as f64;
                let matched = SizeMatch {
                    path: path.clone(),
                    local_size: record.size,
                    remote_size: node.size,
                    item_id: node.item_id.clone(),
                };
                if size_diff as f64 <= tolerance {
                    result.existing.push(matched);
                } else {
                    result.modified.push(matched);
                }
            }
        }
    }

    for path in remote.keys() {
        if !local.contains_key(path) {
            result.remote_only.push(path.clone());
        }
    }

    result
}

fn megabytes(size: u64) -> f64 {
    size as f64 / (1024.0 * 1024.0)
}

/// Prints the comparison in the report format of the `compare` command.
pub fn print_report(comparison: &Reconciliation, local: &BTreeMap<String, LocalFile>) {
    let line = "=".repeat(80);
    println!("\n{line}");
    println!("LOCAL vs GIRDER COMPARISON REPORT");
    println!("{line}");

    if comparison.new.is_empty() {
        println!("\nNo new files to upload");
    } else {
        println!("\nNEW FILES (to upload): {}", comparison.new.len());
        for path in comparison.new.iter().take(20) {
            let size = local.get(path).map(|record| record.size).unwrap_or(0);
            println!("  + {path} ({:.2} MB)", megabytes(size));
        }
        if comparison.new.len() > 20 {
            println!("  ... and {} more files", comparison.new.len() - 20);
        }
    }

    if !comparison.existing.is_empty() {
        println!("\nALREADY PRESENT (identical): {}", comparison.existing.len());
        for matched in comparison.existing.iter().take(10) {
            println!("  = {} ({:.2} MB)", matched.path, megabytes(matched.local_size));
        }
        if comparison.existing.len() > 10 {
            println!("  ... and {} more files", comparison.existing.len() - 10);
        }
    }

    if !comparison.modified.is_empty() {
        println!("\nMODIFIED FILES (size differs): {}", comparison.modified.len());
        for matched in &comparison.modified {
            let local_mb = megabytes(matched.local_size);
            let remote_mb = megabytes(matched.remote_size);
            println!("  ! {}", matched.path);
            println!(
                "     Local: {local_mb:.2} MB | Girder: {remote_mb:.2} MB | Diff: {:+.2} MB",
                local_mb - remote_mb
            );
        }
    }

    if !comparison.remote_only.is_empty() {
        println!(
            "\nON GIRDER BUT NOT LOCAL: {}",
            comparison.remote_only.len()
        );
        for path in comparison.remote_only.iter().take(10) {
            println!("  - {path}");
        }
        if comparison.remote_only.len() > 10 {
            println!("  ... and {} more files", comparison.remote_only.len() - 10);
        }
    }

    println!("\n{line}");
    println!("SUMMARY:");
    println!("  New to upload:     {}", comparison.new.len());
    println!("  Already present:   {}", comparison.existing.len());
    println!("  Modified:          {}", comparison.modified.len());
    println!("  Only on Girder:    {}", comparison.remote_only.len());
    println!(
        "  TOTAL local files: {}",
        comparison.new.len() + comparison.existing.len() + comparison.modified.len()
    );
    println!("{line}\n");
}
