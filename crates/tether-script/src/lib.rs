//! Script engine object model for tether
//!
//! The bridge consumes the scripting engine through a small set of
//! primitives, all provided here:
//! - `ScriptValue` and `ScriptObject`, the script-visible value model
//! - `Interceptor`, the property/call hook surface installed on an object
//! - Function objects built from a native callback plus closure data
//! - Internal fields for attaching bridge state to an object
//! - `Isolate`, which allocates objects and runs weak finalizers
//!
//! Objects are reference counted. An object is reclaimed when its last
//! strong handle drops; weak finalizers registered on it are queued at that
//! point and run by `Isolate::collect_garbage`.

mod error;
mod interceptor;
mod isolate;
mod key;
mod object;
mod value;

pub use error::{ErrorKind, ScriptError, ScriptResult};
pub use interceptor::{CallInfo, EnumerationKind, FunctionCallback, Interceptor};
pub use isolate::Isolate;
pub use key::PropertyKey;
pub use object::{ScriptObject, WeakScriptObject};
pub use value::ScriptValue;
