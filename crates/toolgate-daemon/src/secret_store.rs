//! File-backed application secret.
//!
//! The secret lives in a single owner-only file, by default
//! `~/.local/share/toolgate/application_secret`.
//!
//! ## File Layout
//!
//! ```text
//! ~/.local/share/toolgate/      (0700)
//! └── application_secret        (0600, secret text, one trailing newline ignored)
//! ```

use std::fs;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use anyhow::Context;
use toolgate_common::{ApplicationSecret, SecretStore};
use tracing::{debug, instrument};

use crate::error::{DaemonError, Result};

/// Persists the application secret on local disk.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    /// Creates a store backed by `path`.
    ///
    /// The parent directory is created owner-only if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or hardened.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(parent)
                .map_err(|e| {
                    DaemonError::Storage(format!("Failed to create secret directory: {e}"))
                })?;

            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                DaemonError::Storage(format!("Failed to set secret directory permissions: {e}"))
            })?;
        }

        Ok(Self { path })
    }

    /// Path of the secret file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretStore for FileSecretStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> anyhow::Result<Option<ApplicationSecret>> {
        if !self.path.exists() {
            debug!("No application secret on disk");
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let secret = strip_line_ending(&contents);

        if secret.is_empty() {
            return Ok(None);
        }

        Ok(Some(ApplicationSecret::new(secret)))
    }

    #[instrument(skip(self, secret), fields(path = %self.path.display()))]
    fn store(&self, secret: &ApplicationSecret) -> anyhow::Result<()> {
        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(secret.expose_str().as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to move secret into {}", self.path.display()))?;

        debug!("Saved application secret");
        Ok(())
    }
}

/// Drops one trailing `\n` or `\r\n` left by editors; every other byte is key material.
fn strip_line_ending(contents: &str) -> &str {
    contents
        .strip_suffix("\r\n")
        .or_else(|| contents.strip_suffix('\n'))
        .unwrap_or(contents)
}
