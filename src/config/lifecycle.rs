use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::schema::{ConfigError, FilterConfig, IndexConfig, RankConfig};

/// Which of the three persisted config files is being addressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigKind {
    Index,
    Filter,
    Ranking,
}

/// File-backed store for the three schema files. The index schema is the
/// only one that changes at runtime; replacement is atomic and the previous
/// version is kept as a `_old.json` sidecar until the next rebuild.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    index_config_path: PathBuf,
    filter_config_path: PathBuf,
    rank_config_path: PathBuf,
}

impl ConfigStore {
    pub fn new(
        index_config_path: PathBuf,
        filter_config_path: PathBuf,
        rank_config_path: PathBuf,
    ) -> Self {
        Self {
            index_config_path,
            filter_config_path,
            rank_config_path,
        }
    }

    pub fn path(&self, kind: ConfigKind) -> &Path {
        match kind {
            ConfigKind::Index => &self.index_config_path,
            ConfigKind::Filter => &self.filter_config_path,
            ConfigKind::Ranking => &self.rank_config_path,
        }
    }

    pub fn raw(&self, kind: ConfigKind) -> Result<Vec<u8>, ConfigError> {
        read_file(self.path(kind))
    }

    pub fn load_index_config(&self) -> Result<IndexConfig, ConfigError> {
        let cfg: IndexConfig = serde_json::from_slice(&self.raw(ConfigKind::Index)?)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_filter_config(&self) -> Result<Vec<FilterConfig>, ConfigError> {
        Ok(serde_json::from_slice(&self.raw(ConfigKind::Filter)?)?)
    }

    pub fn load_rank_config(&self) -> Result<RankConfig, ConfigError> {
        Ok(serde_json::from_slice(&self.raw(ConfigKind::Ranking)?)?)
    }

    pub fn sidecar_path(&self) -> PathBuf {
        let mut path = self.index_config_path.clone().into_os_string();
        path.push("_old.json");
        PathBuf::from(path)
    }

    pub fn sidecar_exists(&self) -> bool {
        self.sidecar_path().exists()
    }

    /// Keeps the current live schema next to the live path, arming revert.
    pub fn save_sidecar(&self) -> Result<(), ConfigError> {
        let current = self.raw(ConfigKind::Index)?;
        write_atomic(&self.sidecar_path(), &current)?;
        debug!(path = %self.sidecar_path().display(), "saved schema sidecar");
        Ok(())
    }

    pub fn read_sidecar(&self) -> Result<(IndexConfig, Vec<u8>), ConfigError> {
        let bytes = read_file(&self.sidecar_path())?;
        let cfg: IndexConfig = serde_json::from_slice(&bytes)?;
        cfg.validate()?;
        Ok((cfg, bytes))
    }

    pub fn remove_sidecar(&self) -> Result<(), ConfigError> {
        let path = self.sidecar_path();
        if path.exists() {
            fs::remove_file(&path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            info!(path = %path.display(), "removed schema sidecar");
        }
        Ok(())
    }

    /// Replaces the live index schema file atomically (write + rename).
    pub fn write_index_config(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        write_atomic(&self.index_config_path, bytes)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    let tmp = path.with_extension("json.tmp");
    let map_err = |source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };
    fs::write(&tmp, bytes).map_err(map_err)?;
    fs::rename(&tmp, path).map_err(map_err)?;
    Ok(())
}
