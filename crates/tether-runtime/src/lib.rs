//! Native plugin object model for tether
//!
//! This crate provides the native half of the bridge:
//! - Interned identifiers shared by property and method lookups
//! - `NativeValue`, the variant passed through the capability vtable
//! - Reference counted `NativeObject`s with an asynchronous alive flag
//! - The `NativeClass` capability vtable with independently optional slots
//! - A root registry that scopes invalidation to an owning document
//!
//! Everything here is single-threaded. Handles are `Rc` based and `!Send`.

pub mod capability;
pub mod error;
pub mod identifier;
pub mod object;
pub mod registry;
pub mod variant;

pub use capability::{Capability, CapabilitySet, NativeClass};
pub use error::{PluginError, PluginResult};
pub use identifier::{Identifier, IdentifierTable};
pub use object::{NativeObject, ObjectId, ObjectRef, WeakNativeObject};
pub use registry::{ObjectRegistry, RootId};
pub use variant::NativeValue;
