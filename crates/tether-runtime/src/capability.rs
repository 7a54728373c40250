//! The capability vtable
//!
//! A native object's behaviour is a `NativeClass`. Every slot is optional:
//! the class advertises what it implements through `capabilities()` and
//! callers consult that set before touching a slot. Unimplemented slots keep
//! their default bodies, which report `PluginError::Unsupported`.

use std::fmt;

use crate::error::{PluginError, PluginResult};
use crate::identifier::Identifier;
use crate::object::NativeObject;
use crate::variant::NativeValue;

/// One slot of the capability vtable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    HasMethod,
    Invoke,
    InvokeDefault,
    HasProperty,
    GetProperty,
    SetProperty,
    RemoveProperty,
    Enumerate,
    Construct,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::HasMethod,
        Capability::Invoke,
        Capability::InvokeDefault,
        Capability::HasProperty,
        Capability::GetProperty,
        Capability::SetProperty,
        Capability::RemoveProperty,
        Capability::Enumerate,
        Capability::Construct,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Set of implemented capability slots
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const fn empty() -> Self {
        CapabilitySet(0)
    }

    pub const fn all() -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < Capability::ALL.len() {
            bits |= Capability::ALL[i].bit();
            i += 1;
        }
        CapabilitySet(bits)
    }

    pub const fn with(self, capability: Capability) -> Self {
        CapabilitySet(self.0 | capability.bit())
    }

    pub const fn without(self, capability: Capability) -> Self {
        CapabilitySet(self.0 & !capability.bit())
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.contains(*capability))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(CapabilitySet::empty(), |set, capability| set.with(capability))
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Capability vtable of a native object
///
/// `this` is the object the slot is being called on. Implementations may
/// re-enter the bridge or the script engine from any slot, including in ways
/// that invalidate `this`.
pub trait NativeClass {
    /// Name used in logs
    fn class_name(&self) -> &str {
        "NativeObject"
    }

    /// Slots this class implements
    fn capabilities(&self) -> CapabilitySet;

    fn has_method(&self, _this: &NativeObject, _name: &Identifier) -> bool {
        false
    }

    fn invoke(
        &self,
        _this: &NativeObject,
        _name: &Identifier,
        _args: &[NativeValue],
    ) -> PluginResult<NativeValue> {
        Err(PluginError::Unsupported)
    }

    fn invoke_default(&self, _this: &NativeObject, _args: &[NativeValue]) -> PluginResult<NativeValue> {
        Err(PluginError::Unsupported)
    }

    fn has_property(&self, _this: &NativeObject, _name: &Identifier) -> bool {
        false
    }

    fn get_property(&self, _this: &NativeObject, _name: &Identifier) -> PluginResult<NativeValue> {
        Err(PluginError::Unsupported)
    }

    fn set_property(
        &self,
        _this: &NativeObject,
        _name: &Identifier,
        _value: &NativeValue,
    ) -> PluginResult<()> {
        Err(PluginError::Unsupported)
    }

    fn remove_property(&self, _this: &NativeObject, _name: &Identifier) -> PluginResult<()> {
        Err(PluginError::Unsupported)
    }

    fn enumerate(&self, _this: &NativeObject) -> PluginResult<Vec<Identifier>> {
        Err(PluginError::Unsupported)
    }

    fn construct(&self, _this: &NativeObject, _args: &[NativeValue]) -> PluginResult<NativeValue> {
        Err(PluginError::Unsupported)
    }

    /// Called once when the object stops being alive without reaching a
    /// zero refcount (root teardown, explicit invalidation).
    fn invalidate(&self, _this: &NativeObject) {}

    /// Called once when the refcount reaches zero.
    fn deallocate(&self, _this: &NativeObject) {}
}
