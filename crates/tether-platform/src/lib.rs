//! Embedding-host collaborators
//!
//! The bridge's host environment provides a streaming SHA-1 digest and a
//! cache of fetched script resources. Both are plain library types with no
//! knowledge of the bridge.

mod charset;
mod error;
mod hash;
mod script_cache;

pub use charset::Charset;
pub use error::PlatformError;
pub use hash::{Sha1, Sha1Digest, SHA1_DIGEST_LEN};
pub use script_cache::{is_supported_javascript_mime_type, ScriptCache, ScriptCacheConfig, ScriptResource};
