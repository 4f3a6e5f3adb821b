use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::EntityError;
use crate::watcher::WatchOptions;

/// Logging section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for `entities.log`; current directory when unset.
    pub dir: Option<PathBuf>,
    /// off|error|warn|info|debug|trace
    pub level: Option<String>,
    /// Rolled files to keep.
    pub retention: Option<usize>,
}

/// Crate configuration, usually loaded from `nexus-entities.toml`.
///
/// ```toml
/// [logging]
/// dir = "logs"
/// level = "debug"
///
/// [watcher]
/// batch_size = 50
/// auto_resume = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitiesConfig {
    pub logging: LoggingConfig,
    pub watcher: WatchOptions,
}

impl EntitiesConfig {
    /// # Errors
    /// Returns `Config` if the text is not valid TOML for this structure.
    pub fn from_toml_str(s: &str) -> Result<Self, EntityError> {
        toml::from_str(s).map_err(|e| EntityError::Config(e.to_string()))
    }

    /// # Errors
    /// Returns `Io` if the file cannot be read and `Config` if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, EntityError> {
        let s = std::fs::read_to_string(path)?;
        let cfg = Self::from_toml_str(&s)?;
        log::info!("loaded config: path={}", path.display());
        Ok(cfg)
    }

    /// Overlays `NEXUS_ENTITIES_*` environment variables; env wins over file values.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_vars(|k| std::env::var(k).ok())
    }

    fn apply_vars(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(s) = get("NEXUS_ENTITIES_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(s));
        }
        if let Some(s) = get("NEXUS_ENTITIES_LOG_LEVEL") {
            self.logging.level = Some(s);
        }
        if let Some(n) = get("NEXUS_ENTITIES_LOG_RETENTION").and_then(|s| s.parse().ok()) {
            self.logging.retention = Some(n);
        }
        if let Some(n) = get("NEXUS_ENTITIES_WATCH_BATCH_SIZE").and_then(|s| s.parse().ok()) {
            self.watcher.batch_size = n;
        }
        if let Some(b) = get("NEXUS_ENTITIES_WATCH_ONLY_IDS").map(|s| parse_bool(&s)) {
            self.watcher.only_ids = b;
        }
        if let Some(b) = get("NEXUS_ENTITIES_WATCH_AUTO_RESUME").map(|s| parse_bool(&s)) {
            self.watcher.auto_resume = b;
        }
        self
    }

    pub fn watch_options(&self) -> WatchOptions {
        self.watcher
    }

    /// Installs the logger described by the `[logging]` section.
    ///
    /// # Errors
    /// Returns `Config` if the logger cannot be built.
    pub fn init_logging(&self) -> Result<(), EntityError> {
        crate::logger::configure_logging(
            self.logging.dir.as_deref(),
            self.logging.level.as_deref(),
            self.logging.retention,
        )
        .map_err(|e| EntityError::Config(e.to_string()))
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
