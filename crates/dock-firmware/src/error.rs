use dock_storage::StorageError;
use thiserror::Error;

/// Errors surfaced while building or booting a [`Station`](crate::Station).
///
/// Failures inside the control loop never reach this type; they are logged
/// and reported through the iteration outcome instead.
#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error(transparent)]
    Core(#[from] dock_core::Error),

    #[error("State store error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, FirmwareError>;
