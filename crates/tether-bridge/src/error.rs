//! Bridge errors and their script-visible form

use thiserror::Error;

use tether_runtime::PluginError;
use tether_script::ScriptError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// The native object behind a proxy is no longer alive
    #[error("native object deleted")]
    DeletedObject,

    /// A native capability reported failure
    #[error("error calling method on native object")]
    InvocationFailure,

    /// A call arrived on an object without bridge state
    #[error("malformed receiver: {0}")]
    MalformedReceiver(String),

    /// A script object from an isolate other than the bridge's
    #[error("script object #{0} belongs to another isolate")]
    ForeignObject(u64),

    #[error(transparent)]
    Script(#[from] ScriptError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<BridgeError> for ScriptError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::DeletedObject | BridgeError::MalformedReceiver(_) => {
                ScriptError::reference_error(error.to_string())
            }
            BridgeError::InvocationFailure => ScriptError::error(error.to_string()),
            BridgeError::ForeignObject(_) => ScriptError::type_error(error.to_string()),
            BridgeError::Script(error) => error,
        }
    }
}

impl From<BridgeError> for PluginError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::DeletedObject => PluginError::Invalidated,
            other => PluginError::Failed(other.to_string()),
        }
    }
}
