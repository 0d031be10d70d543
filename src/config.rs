use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

// =============================================================================
// Agent-wide constants
// =============================================================================

/// Timeout for a single catalog request, payload downloads included (5 minutes)
pub const CATALOG_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Agent id used when the configuration does not name one
pub const DEFAULT_AGENT_ID: &str = "DefaultAgent";

/// Default delay between the end of one cycle and the start of the next
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default number of historical version directories kept per product
pub const DEFAULT_KEEP_COUNT: usize = 2;

/// Target name under which the agent's own patches are published
pub const AGENT_TARGET: &str = "Agent";

/// Version assumed when nothing is recorded
pub const UNKNOWN_VERSION: &str = "0.0.0";

/// Label reported for a failure when the latest patch cannot be determined
pub const UNKNOWN_PATCH_LABEL: &str = "x.x.x";

/// Directory (under the agent directory) holding local version records
pub const LOCAL_CHECK_DIR_NAME: &str = "localcheck";

/// Name of the raw payload inside a versioned download directory
pub const PAYLOAD_FILE_NAME: &str = "patch.zip";

/// Name of the extraction directory inside a versioned download directory
pub const EXTRACTED_DIR_NAME: &str = "extracted";

/// Name of the installation instructions document
pub const INSTRUCTIONS_FILE_NAME: &str = "INSTALL_INSTRUCTIONS.txt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Agent configuration file structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub paths: PathsConfig,
    pub retention: RetentionConfig,
}

/// Identity of this agent and where its catalog lives
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentSection {
    pub agent_id: String,
    /// Base URL of the catalog service; required
    pub catalog_url: String,
    pub poll_interval_seconds: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            agent_id: DEFAULT_AGENT_ID.to_string(),
            catalog_url: String::new(),
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

/// Filesystem locations; unset entries resolve under [`data_dir`]
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PathsConfig {
    pub download_base_path: Option<PathBuf>,
    pub notification_dir: Option<PathBuf>,
    pub activity_log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionConfig {
    pub keep_count: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_count: DEFAULT_KEEP_COUNT,
        }
    }
}

/// Immutable per-process identity, loaded once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub agent_id: String,
    /// Always ends with `/`
    pub catalog_base_url: Url,
    pub poll_interval_seconds: u64,
}

impl AgentIdentity {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Validated settings the agent runs with
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub identity: AgentIdentity,
    pub download_base_path: PathBuf,
    pub notification_dir: PathBuf,
    pub activity_log_dir: PathBuf,
    pub keep_count: usize,
}

impl AgentConfig {
    /// Loads the configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validates the configuration and resolves default paths.
    pub fn validate(&self) -> Result<AgentSettings, ConfigError> {
        self.validate_with_dirs(data_dir(), dirs::desktop_dir())
    }

    fn validate_with_dirs(
        &self,
        data_dir: PathBuf,
        desktop_dir: Option<PathBuf>,
    ) -> Result<AgentSettings, ConfigError> {
        let agent_id = self.agent.agent_id.trim();
        if agent_id.is_empty() {
            return Err(ConfigError::Invalid("agentId must not be empty".to_string()));
        }
        if !is_single_component(agent_id) {
            return Err(ConfigError::Invalid(format!(
                "agentId {:?} must be usable as a folder name",
                agent_id
            )));
        }

        if self.agent.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "pollIntervalSeconds must be positive".to_string(),
            ));
        }

        if self.retention.keep_count == 0 {
            return Err(ConfigError::Invalid(
                "retention keepCount must be positive".to_string(),
            ));
        }

        let catalog_base_url = normalize_catalog_url(&self.agent.catalog_url)?;

        let download_base_path = self
            .paths
            .download_base_path
            .clone()
            .unwrap_or_else(|| data_dir.join("patches"));
        let notification_dir = self
            .paths
            .notification_dir
            .clone()
            .or(desktop_dir)
            .unwrap_or_else(|| data_dir.join("notifications"));
        let activity_log_dir = self
            .paths
            .activity_log_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("activity"));

        Ok(AgentSettings {
            identity: AgentIdentity {
                agent_id: agent_id.to_string(),
                catalog_base_url,
                poll_interval_seconds: self.agent.poll_interval_seconds,
            },
            download_base_path,
            notification_dir,
            activity_log_dir,
            keep_count: self.retention.keep_count,
        })
    }
}

/// Parses the catalog URL and makes sure it ends with `/` so relative
/// routes join underneath it instead of replacing its last segment.
pub fn normalize_catalog_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(
            "catalogUrl is not configured".to_string(),
        ));
    }

    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    Url::parse(&with_slash)
        .map_err(|e| ConfigError::Invalid(format!("catalogUrl {:?}: {}", trimmed, e)))
}

/// True when `label` names exactly one entry inside a directory, so joining
/// it onto a path never leaves that directory.
pub fn is_single_component(label: &str) -> bool {
    let mut components = Path::new(label).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == label && !label.contains('\\')
    )
}

/// Returns the path to the data directory for patch-agent.
/// Uses $XDG_DATA_HOME/patch-agent if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/patch-agent,
/// or ./patch-agent if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the default path of the configuration file.
pub fn config_path() -> PathBuf {
    data_dir().join("agent.json")
}

/// Returns the directory holding the agent's diagnostic log files.
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("patch-agent")
}
