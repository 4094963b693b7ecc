use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings read from `imgdb.toml`. Command-line flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ImgdbConfig {
    pub database: Option<String>,
    /// Create the block layout table when initializing a new store
    #[serde(default)]
    pub block_layout: bool,
    /// Abort a load on the first failing file instead of skipping it
    #[serde(default)]
    pub stop_on_error: bool,
}

impl ImgdbConfig {
    /// Database path from the config, or `fallback`
    pub fn database_or(&self, fallback: &Path) -> PathBuf {
        self.database
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| fallback.to_path_buf())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("imgdb.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ImgdbConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ImgdbConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
