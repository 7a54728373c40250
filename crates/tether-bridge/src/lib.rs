//! Bridge between script objects and native plugin objects
//!
//! Script code sees a native object through a proxy: a script object whose
//! interceptor routes property access, enumeration and calls to the object's
//! capability vtable. Native code sees a script object through a bridging
//! native object whose vtable forwards to the script object.
//!
//! A `Bridge` owns the per-context tables that keep both mappings 1:1:
//! - the wrapper table, native object identity to its proxy
//! - the method thunk cache, identifier to the shared method function
//! - the script object map, script identity to its bridging native object
//!
//! All state is single threaded. Native calls may re-enter the bridge and
//! may invalidate the object being called, so liveness is re-checked after
//! every vtable call.

mod bridge;
mod config;
mod dispatch;
mod error;
mod marshal;
mod script_object;
mod stats;
mod thunk;
mod wrapper_table;

#[cfg(test)]
mod testing;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use script_object::ScriptObjectClass;
pub use stats::BridgeStats;
pub use thunk::MethodThunk;
