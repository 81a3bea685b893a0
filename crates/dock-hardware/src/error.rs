//! Error types for collaborator operations.
//!
//! Every call the firmware makes into the radio, the message transport or the
//! NFC reader can fail transiently. These failures are returned as
//! [`HardwareError`] values and turned into retries by the supervisors; none of
//! them is fatal to the control loop.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while talking to a collaborator.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// The transport has no live session.
    #[error("Transport not connected")]
    NotConnected,

    /// The transport refused or dropped a publish.
    #[error("Publish to {topic} failed")]
    PublishFailed { topic: String },

    /// The transport refused a subscription.
    #[error("Subscribe to {topic} failed")]
    SubscribeFailed { topic: String },

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    pub fn publish_failed(topic: impl Into<String>) -> Self {
        Self::PublishFailed {
            topic: topic.into(),
        }
    }

    pub fn subscribe_failed(topic: impl Into<String>) -> Self {
        Self::SubscribeFailed {
            topic: topic.into(),
        }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
