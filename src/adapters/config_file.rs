//! File-backed configuration adapter.
//!
//! Implements [`ConfigPort`] over a single file.  `.bin` files hold a
//! postcard blob; anything else is read as JSON.  A missing file yields
//! the defaults; a present but invalid file is an error, never silently
//! replaced.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Postcard,
}

impl ConfigFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => Self::Postcard,
            _ => Self::Json,
        }
    }
}

pub struct FileConfig {
    path: PathBuf,
    format: ConfigFormat,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = ConfigFormat::for_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    fn read(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!("Config read {} failed: {}", self.path.display(), e);
                Err(ConfigError::IoError)
            }
        }
    }
}

impl ConfigPort for FileConfig {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let Some(bytes) = self.read()? else {
            info!("No config at {}, using defaults", self.path.display());
            return Ok(SystemConfig::default());
        };
        let config = match self.format {
            ConfigFormat::Postcard => SystemConfig::from_bytes(&bytes)?,
            ConfigFormat::Json => {
                let text = std::str::from_utf8(&bytes).map_err(|_| ConfigError::Corrupted)?;
                SystemConfig::from_json(text)?
            }
        };
        info!(
            "Config loaded from {} ({} bytes)",
            self.path.display(),
            bytes.len()
        );
        Ok(config)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = match self.format {
            ConfigFormat::Postcard => config.to_bytes()?,
            ConfigFormat::Json => {
                serde_json::to_vec_pretty(config).map_err(|_| ConfigError::IoError)?
            }
        };
        std::fs::write(&self.path, &bytes).map_err(|e| {
            warn!("Config write {} failed: {}", self.path.display(), e);
            ConfigError::IoError
        })?;
        info!("Config saved to {}", self.path.display());
        Ok(())
    }
}
