use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::system::FileSystemInterface;

use super::types::Config;

/// Prepended to files this program writes, so a user opening one knows what it is.
const FILE_HEADER: &str = "\
# airpods-sanity configuration
#
# priority_outputs: output devices to switch to as soon as they appear,
#   highest priority first.
# priority_inputs: microphones to fall back to when a priority output
#   drags its own microphone in as the default input.
# Names must match the device name macOS shows exactly.

";

/// Reads and writes the TOML config file through an injected file system.
pub struct ConfigLoader<F: FileSystemInterface> {
    file_system: F,
    config_path: PathBuf,
}

impl<F: FileSystemInterface> ConfigLoader<F> {
    pub fn new(file_system: F, config_path: PathBuf) -> Self {
        Self {
            file_system,
            config_path,
        }
    }

    /// Load the config file. A missing file yields the defaults, which are
    /// written out when possible.
    pub fn load_config(&self) -> Result<Config> {
        let path = self.config_path.as_path();
        if !self.file_system.config_file_exists(path) {
            info!("No configuration at {}, using defaults", path.display());
            let config = Config::default();
            self.write_default(&config);
            return Ok(config);
        }

        debug!("Loading configuration from {}", path.display());
        let content = self
            .file_system
            .read_config_file(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        parse_config(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        let path = self.config_path.as_path();
        let body = toml::to_string_pretty(config).context("Failed to serialize configuration")?;

        if let Some(dir) = path.parent() {
            self.file_system
                .create_config_dir(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        self.file_system
            .write_config_file(path, &format!("{}{}", FILE_HEADER, body))
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        debug!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Load again after SIGHUP or an edit on disk
    pub fn reload_config(&self) -> Result<Config> {
        debug!("Reloading configuration");
        self.load_config()
    }

    /// `None` when the file is missing or its metadata unreadable
    pub fn modified_time(&self) -> Option<SystemTime> {
        self.file_system
            .get_config_modified_time(&self.config_path)
            .ok()
    }

    /// True when the file on disk is newer than `since`. A missing file is not modified.
    pub fn is_config_modified(&self, since: SystemTime) -> Result<bool> {
        if !self.config_exists() {
            return Ok(false);
        }
        let modified = self
            .file_system
            .get_config_modified_time(&self.config_path)?;
        Ok(modified > since)
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_exists(&self) -> bool {
        self.file_system.config_file_exists(&self.config_path)
    }

    // Running on defaults beats refusing to start over an unwritable directory
    fn write_default(&self, config: &Config) {
        match self.save_config(config) {
            Ok(()) => info!(
                "Created default configuration file: {}",
                self.config_path.display()
            ),
            Err(e) => warn!("Could not write default configuration: {:#}", e),
        }
    }
}

fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

impl ConfigLoader<crate::system::StandardFileSystem> {
    pub fn new_production(config_path: PathBuf) -> Self {
        Self::new(crate::system::StandardFileSystem, config_path)
    }

    /// The `--config` path if one was given, the default location otherwise
    pub fn from_cli_path(config_path: Option<&str>) -> Result<Self> {
        let path = match config_path {
            Some(path) => PathBuf::from(path),
            None => Self::default_config_path()?,
        };
        Ok(Self::new_production(path))
    }

    /// `~/.config/airpods-sanity/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home_dir.join(".config/airpods-sanity/config.toml"))
    }
}
