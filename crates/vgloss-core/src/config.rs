use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reserved internal-data subdirectory under every gallery root. Never walked,
/// and not configurable: the gallery config file itself lives inside it.
pub const DATA_DIR: &str = ".vgloss";
pub const DEFAULT_DATABASE: &str = "index.db";

const MAX_BUSY_TIMEOUT_MS: u64 = i32::MAX as u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gallery root directory.
    pub root: PathBuf,
    /// Index database file name inside the data directory.
    pub database: String,
    /// How long a pass waits on another pass's write lock. Values above
    /// `i32::MAX` are clamped, SQLite's own limit.
    pub busy_timeout_ms: u64,
    pub metadata: MetadataSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub extractor: ExtractorKind,
    pub exiftool_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    Probe,
    Exiftool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            database: DEFAULT_DATABASE.to_string(),
            busy_timeout_ms: 5000,
            metadata: MetadataSettings::default(),
        }
    }
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            extractor: ExtractorKind::Probe,
            exiftool_path: PathBuf::from("exiftool"),
        }
    }
}

impl AppConfig {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Absolute location of the reserved data directory.
    pub fn data_path(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_path().join(&self.database)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms.min(MAX_BUSY_TIMEOUT_MS))
    }
}

/// Load configuration from `Config.*` in the working directory, the gallery's
/// own `config.toml`, and `VGLOSS_*` environment variables, in that order.
/// An explicit `root` overrides every source.
pub fn load_configuration(root: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(ConfigFile::with_name("Config").required(false));

    if let Some(root) = root {
        builder = builder
            .add_source(
                ConfigFile::from(root.join(DATA_DIR).join("config.toml")).required(false),
            )
            .set_override("root", root.to_string_lossy().into_owned())?;
    }

    builder
        .add_source(
            Environment::with_prefix("VGLOSS")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize::<AppConfig>()
}
