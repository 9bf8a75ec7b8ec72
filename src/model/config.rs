use serde::{Deserialize, Serialize};

/// Configuration from cardbox.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Data file, relative to the directory holding cardbox.toml
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: default_store_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Board used when a command omits one
    #[serde(default)]
    pub default_board: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive string; `CARDBOX_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// `compact` or `json`; `CARDBOX_LOG_FORMAT` takes precedence
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: default_log_filter(),
            format: default_log_format(),
        }
    }
}

fn default_store_path() -> String {
    "cardbox.json".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_log_filter() -> String {
    "cardbox=warn".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}
