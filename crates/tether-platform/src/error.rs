//! Platform errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("unknown charset: {0}")]
    UnknownCharset(String),

    #[error("script cache capacity must be at least 1")]
    ZeroCapacity,
}
