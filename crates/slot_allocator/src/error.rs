use crate::placement::{PageKey, PlacementId, Slot};
use crate::store::{StoreError, StoreOp};
use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AllocError>;

#[derive(Debug, Error)]
pub enum AllocError {
    /// The requested slot is held by another active placement.
    #[error("Slot {slot} on page {page} is already taken by \"{label}\"")]
    SlotTaken {
        page: PageKey,
        slot: Slot,
        occupant: Option<PlacementId>,
        label: String,
    },

    /// Cleanup of click-tracking rows failed; nothing else was touched.
    #[error("Failed to delete records depending on placement {id}: {source}")]
    DependencyDelete {
        id: PlacementId,
        #[source]
        source: StoreError,
    },

    #[error("Store {op} failed: {source}")]
    Persistence {
        op: StoreOp,
        #[source]
        source: StoreError,
    },

    #[error("Placement {0} not found")]
    NotFound(PlacementId),

    /// Fewer free slots remain at or after `start_from` than were requested.
    #[error("Page {page} has only {available} free slots from {start_from}, {requested} requested")]
    SlotsExhausted {
        page: PageKey,
        start_from: Slot,
        requested: usize,
        available: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("Failed to read file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create file {path}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid CSV header: {0}")]
    CsvHeader(String),

    #[error("Invalid CSV row {row}: missing column '{column}'")]
    CsvRow { row: usize, column: String },

    #[error("Invalid value at row {row}, column '{column}': {value}")]
    CsvValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl AllocError {
    pub(crate) fn persistence(op: StoreOp) -> impl FnOnce(StoreError) -> Self {
        move |source| AllocError::Persistence { op, source }
    }

    /// True for conflicts the operator resolves by forcing or picking another slot.
    pub fn is_slot_taken(&self) -> bool {
        matches!(self, AllocError::SlotTaken { .. })
    }
}
