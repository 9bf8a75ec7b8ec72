use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::io::file_store::FileStore;
use crate::model::config::Config;

pub const CONFIG_FILE: &str = "cardbox.toml";

/// Error type for config I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("not a cardbox workspace: no cardbox.toml found")]
    NotFound,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse cardbox.toml: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not serialize cardbox.toml: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// A loaded config and the directory it was found in
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
}

impl Workspace {
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// The store the config points at
    pub fn store(&self) -> FileStore {
        FileStore::new(
            self.root.join(&self.config.store.path),
            Duration::from_millis(self.config.store.lock_timeout_ms),
        )
    }
}

/// Walk up from `start` looking for cardbox.toml.
pub fn discover(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// Read and parse the config in `root`.
pub fn read_config(root: &Path) -> Result<Config, ConfigError> {
    let path = root.join(CONFIG_FILE);
    let text = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    Ok(toml::from_str(&text)?)
}

/// Discover and load the workspace containing `start`.
pub fn load_workspace(start: &Path) -> Result<Workspace, ConfigError> {
    let root = discover(start)?;
    let config = read_config(&root)?;
    Ok(Workspace { root, config })
}

/// Write a config file into `root`.
pub fn write_config(root: &Path, config: &Config) -> Result<(), ConfigError> {
    let path = root.join(CONFIG_FILE);
    let text = toml::to_string_pretty(config)?;
    fs::write(&path, text).map_err(|e| ConfigError::ReadError { path, source: e })
}
