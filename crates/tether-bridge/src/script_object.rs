//! Script objects seen from native code
//!
//! `ScriptObjectClass` is the vtable of a bridging native object: every slot
//! forwards to the held script object, converting values through the
//! bridge. One live bridging object exists per script object; when its
//! refcount reaches zero or it is invalidated it lets go of the script
//! object and leaves the map.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tether_runtime::{
    CapabilitySet, Identifier, NativeClass, NativeObject, NativeValue, ObjectId, ObjectRef, PluginError,
    PluginResult, RootId, WeakNativeObject,
};
use tether_script::{PropertyKey, ScriptError, ScriptObject, ScriptValue};

use crate::bridge::BridgeInner;
use crate::error::{BridgeError, BridgeResult};
use crate::stats::bump;
use crate::wrapper_table::ProxyState;

fn script_failure(error: ScriptError) -> PluginError {
    log::debug!("script call from native code threw {}", error);
    PluginError::Failed(error.to_string())
}

fn key_for(identifier: &Identifier) -> PropertyKey {
    match identifier.index() {
        Some(index) => match u32::try_from(index) {
            Ok(index) => PropertyKey::from(index),
            Err(_) => PropertyKey::Name(index.to_string()),
        },
        None => PropertyKey::from(identifier.to_name()),
    }
}

/// Native vtable backed by a script object
pub struct ScriptObjectClass {
    bridge: Weak<BridgeInner>,
    script_id: u64,
    script: RefCell<Option<ScriptObject>>,
}

impl ScriptObjectClass {
    fn new(bridge: Weak<BridgeInner>, script: &ScriptObject) -> Self {
        ScriptObjectClass {
            bridge,
            script_id: script.id(),
            script: RefCell::new(Some(script.clone())),
        }
    }

    /// The script object, until the bridging object dies
    pub fn script_object(&self) -> Option<ScriptObject> {
        self.script.borrow().clone()
    }

    fn target(&self) -> PluginResult<(Rc<BridgeInner>, ScriptObject)> {
        let bridge = self.bridge.upgrade().ok_or(PluginError::Invalidated)?;
        let script = self.script_object().ok_or(PluginError::Invalidated)?;
        Ok((bridge, script))
    }

    fn script_args(bridge: &BridgeInner, this: &NativeObject, args: &[NativeValue]) -> PluginResult<Vec<ScriptValue>> {
        args.iter()
            .map(|arg| bridge.to_script(arg, Some(this)).map_err(PluginError::from))
            .collect()
    }

    fn detach(&self, this: &NativeObject) {
        let script = self.script.borrow_mut().take();
        if let Some(bridge) = self.bridge.upgrade() {
            bridge.script_objects.remove(self.script_id, this.id());
        }
        drop(script);
    }
}

impl NativeClass for ScriptObjectClass {
    fn class_name(&self) -> &str {
        "ScriptObject"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::all()
    }

    fn has_method(&self, _this: &NativeObject, name: &Identifier) -> bool {
        let Ok((_, script)) = self.target() else {
            return false;
        };
        match script.get(key_for(name)) {
            Ok(ScriptValue::Object(value)) => value.is_callable(),
            _ => false,
        }
    }

    fn invoke(&self, this: &NativeObject, name: &Identifier, args: &[NativeValue]) -> PluginResult<NativeValue> {
        let (bridge, script) = self.target()?;
        let args = Self::script_args(&bridge, this, args)?;
        let result = script.call_method(key_for(name), &args).map_err(script_failure)?;
        Ok(bridge.to_native(&result, Some(this)))
    }

    fn invoke_default(&self, this: &NativeObject, args: &[NativeValue]) -> PluginResult<NativeValue> {
        let (bridge, script) = self.target()?;
        let args = Self::script_args(&bridge, this, args)?;
        let result = script.call(&ScriptValue::Undefined, &args).map_err(script_failure)?;
        Ok(bridge.to_native(&result, Some(this)))
    }

    fn has_property(&self, _this: &NativeObject, name: &Identifier) -> bool {
        self.target()
            .ok()
            .and_then(|(_, script)| script.has(key_for(name)).ok())
            .unwrap_or(false)
    }

    fn get_property(&self, this: &NativeObject, name: &Identifier) -> PluginResult<NativeValue> {
        let (bridge, script) = self.target()?;
        let value = script.get(key_for(name)).map_err(script_failure)?;
        Ok(bridge.to_native(&value, Some(this)))
    }

    fn set_property(&self, this: &NativeObject, name: &Identifier, value: &NativeValue) -> PluginResult<()> {
        let (bridge, script) = self.target()?;
        let value = bridge.to_script(value, Some(this))?;
        script.set(key_for(name), value).map_err(script_failure)
    }

    fn remove_property(&self, _this: &NativeObject, name: &Identifier) -> PluginResult<()> {
        let (_, script) = self.target()?;
        script.delete(key_for(name));
        Ok(())
    }

    fn enumerate(&self, _this: &NativeObject) -> PluginResult<Vec<Identifier>> {
        let (bridge, script) = self.target()?;
        let keys = script.own_keys().map_err(script_failure)?;
        Ok(keys
            .iter()
            .map(|key| match key {
                PropertyKey::Index(index) => bridge.identifiers.intern_array_index(*index),
                PropertyKey::Name(name) => bridge.identifiers.intern_name(name),
            })
            .collect())
    }

    fn construct(&self, this: &NativeObject, args: &[NativeValue]) -> PluginResult<NativeValue> {
        let (bridge, script) = self.target()?;
        let args = Self::script_args(&bridge, this, args)?;
        let result = script.construct(&args).map_err(script_failure)?;
        Ok(bridge.to_native(&result, Some(this)))
    }

    fn invalidate(&self, this: &NativeObject) {
        self.detach(this);
    }

    fn deallocate(&self, this: &NativeObject) {
        self.detach(this);
    }
}

/// Script object identity to its bridging native object. Ids are only
/// unique within one isolate, so only the bridge's own objects are entered.
#[derive(Default)]
pub(crate) struct ScriptObjectMap {
    entries: RefCell<HashMap<u64, WeakNativeObject>>,
}

impl ScriptObjectMap {
    fn lookup(&self, script_id: u64) -> Option<NativeObject> {
        let entry = self.entries.borrow().get(&script_id).cloned()?;
        entry.upgrade().filter(NativeObject::is_alive)
    }

    fn insert(&self, script_id: u64, object: &NativeObject) {
        self.entries.borrow_mut().insert(script_id, object.downgrade());
    }

    /// Drop the entry for `script_id` if it still names `object`
    fn remove(&self, script_id: u64, object: ObjectId) {
        let mut entries = self.entries.borrow_mut();
        if entries.get(&script_id).is_some_and(|entry| entry.id() == object) {
            entries.remove(&script_id);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl BridgeInner {
    /// The native object for a script object. A proxy yields the object it
    /// stands for; any other object gets its bridging object.
    pub(crate) fn script_object_to_native(&self, script: &ScriptObject, root: RootId) -> BridgeResult<ObjectRef> {
        if let Some(state) = script.internal::<ProxyState>() {
            return match state.object() {
                Some(native) if native.is_alive() => Ok(ObjectRef::retain(&native)),
                _ => Err(BridgeError::DeletedObject),
            };
        }
        if !script.isolate().is_some_and(|isolate| isolate.ptr_eq(&self.isolate)) {
            return Err(BridgeError::ForeignObject(script.id()));
        }
        if let Some(existing) = self.script_objects.lookup(script.id()) {
            return Ok(ObjectRef::retain(&existing));
        }
        let owned = NativeObject::create(ScriptObjectClass::new(self.weak(), script));
        self.registry.register_object(&owned, root);
        self.script_objects.insert(script.id(), &owned);
        bump(&self.counters.script_objects_created);
        log::debug!("bridged script object #{} as native object {}", script.id(), owned.id());
        Ok(owned)
    }
}
