//! File-backed persistence for [`TiersConfig`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::tiers_config::{TiersConfig, TiersConfigInput};
use crate::ConfigError;

/// Reads and writes the tiers config as a JSON document.
///
/// A missing file reads as the built-in defaults. Writes are serialized
/// through an internal lock and replace the file atomically.
#[derive(Debug)]
pub struct TiersConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TiersConfigStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored config, normalized against the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TiersFileIo`] if the file exists but cannot be
    /// read, [`ConfigError::TiersFileParse`] if it is not a JSON object, or
    /// [`ConfigError::ThresholdOrder`] if the stored thresholds are out of order.
    pub fn read(&self) -> Result<TiersConfig, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "tiers config file absent, using defaults");
                return Ok(TiersConfig::default());
            }
            Err(source) => {
                return Err(ConfigError::TiersFileIo {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        let input: TiersConfigInput = serde_json::from_str(&raw)?;
        TiersConfig::normalized(&input, &TiersConfig::default())
    }

    /// Normalizes `input` against the stored config and persists it with
    /// `configVersion` set to one past the stored value.
    ///
    /// Any `configVersion` in `input` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ThresholdOrder`] when the merged thresholds are
    /// out of order (nothing is written), or [`ConfigError::TiersFileIo`] when
    /// the file cannot be written.
    pub fn write(&self, input: &TiersConfigInput) -> Result<TiersConfig, ConfigError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let current = self.read()?;
        let mut next = TiersConfig::normalized(input, &current)?;
        next.config_version = current.config_version.saturating_add(1);

        let body = serde_json::to_string_pretty(&next)?;
        self.persist(&body)?;

        tracing::info!(
            path = %self.path.display(),
            config_version = next.config_version,
            "tiers config updated"
        );
        Ok(next)
    }

    fn persist(&self, body: &str) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::TiersFileIo {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}
