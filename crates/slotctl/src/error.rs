use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlotctlError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Config file not found: {path}")]
    MissingConfigFile { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, SlotctlError>;
