//! ---
//! sh_section: "02-lifecycle"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Installation marker gating lifecycle commands."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use stackhost_common::{InstallerError, Result};
use tracing::debug;

/// Zero-byte sentinel whose presence means "installed".
#[derive(Debug, Clone)]
pub struct InstallationState {
    marker: PathBuf,
}

impl InstallationState {
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    pub fn is_installed(&self) -> bool {
        self.marker.exists()
    }

    /// Create the marker. An existing marker is left untouched.
    pub fn mark_installed(&self) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.marker)
            .map_err(|err| {
                InstallerError::io(format!("unable to create {}", self.marker.display()), err)
            })?;
        debug!(marker = %self.marker.display(), "installation marked");
        Ok(())
    }

    pub fn require_installed(&self) -> Result<()> {
        if self.is_installed() {
            Ok(())
        } else {
            Err(InstallerError::NotInstalled)
        }
    }
}
