use crate::error::{Result, SlotctlError};
use std::{env, path::PathBuf};

const ENV_CONFIG_FILE: &str = "SLOTCTL_CONFIG";
const ENV_DATA_DIR: &str = "SLOTCTL_DATA_DIR";
const ENV_EXPORT_DIR: &str = "SLOTCTL_EXPORT_DIR";

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_EXPORT_DIR: &str = "csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Tenant profiles TOML; built-in profiles when unset
    pub config_file: Option<PathBuf>,
    /// Where `<tenant>.csv` and `<tenant>_related.csv` live
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_file: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        // Blank values fall back to the defaults.
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        if let Some(path) = value(ENV_CONFIG_FILE) {
            if !path.is_file() {
                return Err(SlotctlError::MissingConfigFile { path });
            }
            config.config_file = Some(path);
        }
        if let Some(path) = value(ENV_DATA_DIR) {
            config.data_dir = checked_dir(path)?;
        }
        if let Some(path) = value(ENV_EXPORT_DIR) {
            config.export_dir = checked_dir(path)?;
        }
        Ok(config)
    }

    pub fn data_file(&self, tenant: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", tenant.to_lowercase()))
    }

    pub fn related_file(&self, tenant: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}_related.csv", tenant.to_lowercase()))
    }
}

/// An existing path that is not a directory is rejected early.
fn checked_dir(path: PathBuf) -> Result<PathBuf> {
    if path.exists() && !path.is_dir() {
        return Err(SlotctlError::InvalidConfiguration(format!(
            "Not a directory: {}",
            path.display()
        )));
    }
    Ok(path)
}
