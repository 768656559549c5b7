use thiserror::Error;

use crate::identity::DeviceIdentity;
use crate::os::ChangeStatus;

/// Errors surfaced by display queries and configuration submissions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    /// A device registry key string does not name a known registry hive.
    #[error("invalid registry address: {0}")]
    InvalidRegistryAddress(String),

    /// The operation requires a display whose validity predicate is
    /// currently false (the device attach state changed since enumeration).
    #[error("display is no longer valid: {0}")]
    InvalidDisplay(String),

    /// No mode-capable device matches the given name right now.
    #[error("display device is missing or invalid: {0}")]
    MissingDisplay(String),

    /// The OS rejected a submitted configuration.
    #[error("[{status:?}]: applying display settings failed")]
    ModeChangeFailed {
        status: ChangeStatus,
        device: Option<DeviceIdentity>,
    },

    /// A display configuration device-info call failed with a raw status code.
    #[error("display configuration call failed with status {0}")]
    ConfigCallFailed(i32),
}

pub type DisplayResult<T> = Result<T, DisplayError>;
