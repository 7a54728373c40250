//! Errors reported by native plugin objects

use thiserror::Error;

/// Failure reported by a capability vtable slot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// The slot is not implemented by this class
    #[error("capability not implemented")]
    Unsupported,
    /// The object was invalidated before or during the call
    #[error("native object has been invalidated")]
    Invalidated,
    /// The plugin ran the call and reported failure
    #[error("{0}")]
    Failed(String),
}

impl PluginError {
    pub fn failed(message: impl Into<String>) -> Self {
        PluginError::Failed(message.into())
    }
}

/// Result type for capability calls
pub type PluginResult<T> = Result<T, PluginError>;
