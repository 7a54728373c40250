//! Capability dispatch for proxies
//!
//! `NativeObjectInterceptor` is the only script-visible surface of a proxy.
//! Every hook resolves the proxy to its native object, refuses dead objects
//! before touching the vtable, and re-checks liveness after each vtable call
//! whose result it goes on to use.

use std::rc::{Rc, Weak};

use tether_runtime::{Capability, Identifier, NativeObject, NativeValue};
use tether_script::{EnumerationKind, Interceptor, PropertyKey, ScriptObject, ScriptResult, ScriptValue};

use crate::bridge::BridgeInner;
use crate::error::{BridgeError, BridgeResult};
use crate::wrapper_table::ProxyState;

/// Which call slot an invocation targets
#[derive(Debug, Clone, Copy)]
pub(crate) enum InvokeKind<'a> {
    Method(&'a Identifier),
    Default,
    Construct,
}

impl InvokeKind<'_> {
    fn capability(self) -> Capability {
        match self {
            InvokeKind::Method(_) => Capability::Invoke,
            InvokeKind::Default => Capability::InvokeDefault,
            InvokeKind::Construct => Capability::Construct,
        }
    }
}

fn ensure_alive(object: &NativeObject) -> BridgeResult<()> {
    if object.is_alive() {
        Ok(())
    } else {
        log::debug!("native object {} deleted during dispatch", object.id());
        Err(BridgeError::DeletedObject)
    }
}

impl BridgeInner {
    /// Resolve a proxy to its live native object
    pub(crate) fn receiver(&self, holder: &ScriptObject) -> BridgeResult<NativeObject> {
        let state = holder.internal::<ProxyState>().ok_or_else(|| {
            BridgeError::MalformedReceiver(format!("script object #{} is not a native object proxy", holder.id()))
        })?;
        match state.object() {
            Some(object) if object.is_alive() => Ok(object),
            _ => Err(BridgeError::DeletedObject),
        }
    }

    pub(crate) fn identifier_for(&self, key: &PropertyKey) -> Identifier {
        match key {
            PropertyKey::Name(name) => self.identifiers.intern_name(name),
            PropertyKey::Index(index) => self.identifiers.intern_array_index(*index),
        }
    }

    pub(crate) fn get_property(&self, holder: &ScriptObject, key: &PropertyKey) -> BridgeResult<Option<ScriptValue>> {
        let object = self.receiver(holder)?;
        let identifier = self.identifier_for(key);
        let class = object.class();
        let capabilities = object.capabilities();

        if capabilities.contains(Capability::HasProperty) && capabilities.contains(Capability::GetProperty) {
            let present = class.has_property(&object, &identifier);
            ensure_alive(&object)?;
            if present {
                let value = match class.get_property(&object, &identifier) {
                    Ok(value) => value,
                    Err(error) => {
                        log::debug!("get {} on native object {} failed: {}", identifier, object.id(), error);
                        return Ok(Some(ScriptValue::Undefined));
                    }
                };
                ensure_alive(&object)?;
                return self.to_script(&value, Some(&object)).map(Some);
            }
        }

        if identifier.is_name() && capabilities.contains(Capability::HasMethod) {
            let present = class.has_method(&object, &identifier);
            ensure_alive(&object)?;
            if present {
                let (_, function) = self.method_thunk(&identifier)?;
                return Ok(Some(ScriptValue::Object(function)));
            }
        }
        Ok(None)
    }

    pub(crate) fn set_property(
        &self,
        holder: &ScriptObject,
        key: &PropertyKey,
        value: &ScriptValue,
    ) -> BridgeResult<bool> {
        let object = self.receiver(holder)?;
        let capabilities = object.capabilities();
        if !(capabilities.contains(Capability::HasProperty) && capabilities.contains(Capability::SetProperty)) {
            return Ok(false);
        }
        let identifier = self.identifier_for(key);
        let class = object.class();
        let present = class.has_property(&object, &identifier);
        ensure_alive(&object)?;
        if !present {
            return Ok(false);
        }
        let native = self.to_native(value, Some(&object));
        match class.set_property(&object, &identifier, &native) {
            Ok(()) => Ok(true),
            Err(error) => {
                log::debug!("set {} on native object {} failed: {}", identifier, object.id(), error);
                Ok(false)
            }
        }
    }

    pub(crate) fn query(&self, holder: &ScriptObject, key: &PropertyKey) -> BridgeResult<Option<bool>> {
        let object = self.receiver(holder)?;
        let identifier = self.identifier_for(key);
        let class = object.class();

        if object.has_capability(Capability::HasProperty) {
            let present = class.has_property(&object, &identifier);
            ensure_alive(&object)?;
            if present {
                return Ok(Some(true));
            }
        }
        if identifier.is_name() && object.has_capability(Capability::HasMethod) {
            let present = class.has_method(&object, &identifier);
            ensure_alive(&object)?;
            if present {
                return Ok(Some(true));
            }
        }
        Ok(None)
    }

    pub(crate) fn enumerate(
        &self,
        holder: &ScriptObject,
        kind: EnumerationKind,
    ) -> BridgeResult<Option<Vec<PropertyKey>>> {
        let object = self.receiver(holder)?;
        let enabled = match kind {
            EnumerationKind::Named => self.config.enumerate_named,
            EnumerationKind::Indexed => self.config.enumerate_indexed,
        };
        if !enabled || !object.has_capability(Capability::Enumerate) {
            return Ok(None);
        }
        let identifiers = match object.class().enumerate(&object) {
            Ok(identifiers) => identifiers,
            Err(error) => {
                log::debug!("enumerate on native object {} failed: {}", object.id(), error);
                return Ok(None);
            }
        };
        ensure_alive(&object)?;

        let keys = match kind {
            EnumerationKind::Named => identifiers
                .iter()
                .map(|identifier| PropertyKey::from(identifier.to_name()))
                .collect(),
            EnumerationKind::Indexed => identifiers
                .iter()
                .filter_map(Identifier::index)
                .filter_map(|index| u32::try_from(index).ok())
                .map(PropertyKey::from)
                .collect(),
        };
        Ok(Some(keys))
    }

    /// Call one of the object's call slots with script arguments
    pub(crate) fn invoke(
        &self,
        object: &NativeObject,
        kind: InvokeKind<'_>,
        args: &[ScriptValue],
    ) -> BridgeResult<ScriptValue> {
        ensure_alive(object)?;
        if !object.has_capability(kind.capability()) {
            log::trace!("native object {} has no {:?} slot", object.id(), kind.capability());
            return Ok(ScriptValue::Undefined);
        }

        let native_args: Vec<NativeValue> = args.iter().map(|arg| self.to_native(arg, Some(object))).collect();
        let class = object.class();
        let result = match kind {
            InvokeKind::Method(identifier) => class.invoke(object, identifier, &native_args),
            InvokeKind::Default => class.invoke_default(object, &native_args),
            InvokeKind::Construct => class.construct(object, &native_args),
        };
        drop(native_args);

        let result = result.map_err(|error| {
            log::debug!("{:?} on native object {} failed: {}", kind, object.id(), error);
            BridgeError::InvocationFailure
        })?;
        ensure_alive(object)?;
        self.to_script(&result, Some(object))
    }
}

/// Interceptor installed on every proxy
pub(crate) struct NativeObjectInterceptor {
    bridge: Weak<BridgeInner>,
}

impl NativeObjectInterceptor {
    pub(crate) fn new(bridge: Weak<BridgeInner>) -> Self {
        NativeObjectInterceptor { bridge }
    }

    fn bridge(&self) -> BridgeResult<Rc<BridgeInner>> {
        self.bridge.upgrade().ok_or(BridgeError::DeletedObject)
    }
}

impl Interceptor for NativeObjectInterceptor {
    fn get(&self, holder: &ScriptObject, key: &PropertyKey) -> ScriptResult<Option<ScriptValue>> {
        Ok(self.bridge()?.get_property(holder, key)?)
    }

    fn set(&self, holder: &ScriptObject, key: &PropertyKey, value: &ScriptValue) -> ScriptResult<bool> {
        Ok(self.bridge()?.set_property(holder, key, value)?)
    }

    fn query(&self, holder: &ScriptObject, key: &PropertyKey) -> ScriptResult<Option<bool>> {
        Ok(self.bridge()?.query(holder, key)?)
    }

    fn enumerate(&self, holder: &ScriptObject, kind: EnumerationKind) -> ScriptResult<Option<Vec<PropertyKey>>> {
        Ok(self.bridge()?.enumerate(holder, kind)?)
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(&self, holder: &ScriptObject, args: &[ScriptValue], is_construct: bool) -> ScriptResult<ScriptValue> {
        let bridge = self.bridge()?;
        let object = bridge.receiver(holder)?;
        let kind = if is_construct {
            InvokeKind::Construct
        } else {
            InvokeKind::Default
        };
        Ok(bridge.invoke(&object, kind, args)?)
    }
}
