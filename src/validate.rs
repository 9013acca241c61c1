//! Wrapper around the external `bids-validator` executable, treated as a
//! boolean pass/fail oracle with an explicit "not installed" failure mode.

use std::fmt;
use std::io;
use std::path::Path;
use std::process::Command;

use tracing::{error, info};

#[derive(Debug)]
pub enum ValidateError {
    /// The `bids-validator` executable is not on the PATH.
    NotInstalled,
    Io(io::Error),
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidateError::NotInstalled => {
                write!(f, "bids-validator not found. Install it first.")
            }
            ValidateError::Io(e) => write!(f, "failed to run bids-validator: {e}"),
        }
    }
}

impl std::error::Error for ValidateError {}

/// Runs `bids-validator --json <directory>` and reports whether the dataset
/// passed. Anything written to stderr counts as a validation failure.
pub fn validate_bids(directory: &Path) -> Result<bool, ValidateError> {
    info!(dir = %directory.display(), "Validating BIDS dataset");
    let output = Command::new("bids-validator")
        .arg("--json")
        .arg(directory)
        .output();

    let output = match output {
        Ok(output) => output,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            error!("bids-validator not found. Install it first.");
            return Err(ValidateError::NotInstalled);
        }
        Err(e) => return Err(ValidateError::Io(e)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        error!(errors = %stderr, "Validation errors");
        return Ok(false);
    }

    Ok(stdout.contains("\"errors\": []") || !stdout.contains("\"severity\": \"error\""))
}
