//! Native object identity to script proxy
//!
//! Each live native object has at most one proxy per bridge. The table
//! entry owns the bridge's reference to the object and a weak link to the
//! proxy; the proxy's weak finalizer removes the entry and releases the
//! object. Serial numbers keep a late finalizer from removing an entry that
//! replaced the one it was registered for.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tether_runtime::{NativeObject, ObjectId, ObjectRef, RootId};
use tether_script::{ScriptObject, WeakScriptObject};

use crate::bridge::BridgeInner;
use crate::dispatch::NativeObjectInterceptor;
use crate::error::{BridgeError, BridgeResult};
use crate::script_object::ScriptObjectClass;
use crate::stats::bump;

/// Internal field of a proxy
pub(crate) struct ProxyState {
    object: RefCell<Option<NativeObject>>,
}

impl ProxyState {
    fn new(object: &NativeObject) -> Self {
        ProxyState {
            object: RefCell::new(Some(object.clone())),
        }
    }

    /// The proxied object, unless the proxy was detached
    pub(crate) fn object(&self) -> Option<NativeObject> {
        self.object.borrow().clone()
    }

    fn clear(&self) {
        self.object.borrow_mut().take();
    }
}

pub(crate) struct WrapperEntry {
    proxy: WeakScriptObject,
    // Released when the entry drops.
    _retained: ObjectRef,
    serial: u64,
}

#[derive(Default)]
pub(crate) struct WrapperTable {
    entries: RefCell<HashMap<ObjectId, WrapperEntry>>,
    next_serial: Cell<u64>,
}

impl WrapperTable {
    /// The reachable proxy for `object`. An entry whose proxy was reclaimed
    /// but not yet finalized is purged.
    pub(crate) fn lookup(&self, object: &NativeObject) -> Option<ScriptObject> {
        let hit = self
            .entries
            .borrow()
            .get(&object.id())
            .map(|entry| entry.proxy.upgrade());
        match hit {
            Some(Some(proxy)) => Some(proxy),
            Some(None) => {
                log::trace!("purging stale proxy entry for {}", object.id());
                drop(self.take(object.id(), None));
                None
            }
            None => None,
        }
    }

    fn insert(&self, object: &NativeObject, proxy: &ScriptObject) -> u64 {
        let serial = self.next_serial.get() + 1;
        self.next_serial.set(serial);
        let entry = WrapperEntry {
            proxy: proxy.downgrade(),
            _retained: ObjectRef::retain(object),
            serial,
        };
        let previous = self.entries.borrow_mut().insert(object.id(), entry);
        drop(previous);
        serial
    }

    /// Remove the entry for `id`. With a serial, only the entry carrying that
    /// serial is removed. The caller drops the entry outside any borrow.
    pub(crate) fn take(&self, id: ObjectId, serial: Option<u64>) -> Option<WrapperEntry> {
        let mut entries = self.entries.borrow_mut();
        let matches = entries
            .get(&id)
            .is_some_and(|entry| serial.map_or(true, |serial| serial == entry.serial));
        if matches {
            entries.remove(&id)
        } else {
            None
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl BridgeInner {
    pub(crate) fn wrap(&self, object: &NativeObject, root: RootId) -> BridgeResult<ScriptObject> {
        if let Some(class) = object.downcast_class::<ScriptObjectClass>() {
            return class.script_object().ok_or(BridgeError::DeletedObject);
        }
        if let Some(proxy) = self.wrappers.lookup(object) {
            return Ok(proxy);
        }
        if !object.is_alive() {
            return Err(BridgeError::DeletedObject);
        }

        let interceptor = Rc::new(NativeObjectInterceptor::new(self.weak()));
        let proxy = self.isolate.new_object_with_interceptor(interceptor)?;
        proxy.set_internal(Rc::new(ProxyState::new(object)));
        self.registry.register_object(object, root);
        let serial = self.wrappers.insert(object, &proxy);

        let bridge = self.weak();
        let id = object.id();
        self.isolate.make_weak(&proxy, move || {
            if let Some(bridge) = bridge.upgrade() {
                bridge.proxy_reclaimed(id, serial);
            }
        });

        bump(&self.counters.proxies_created);
        log::debug!("wrapped native object {} ({}) in {}", id, object.class_name(), root);
        Ok(proxy)
    }

    fn proxy_reclaimed(&self, id: ObjectId, serial: u64) {
        let entry = self.wrappers.take(id, Some(serial));
        if entry.is_some() {
            bump(&self.counters.proxies_reclaimed);
            log::trace!("proxy for native object {} reclaimed", id);
        }
        drop(entry);
    }

    pub(crate) fn forget(&self, object: &NativeObject) -> bool {
        let Some(entry) = self.wrappers.take(object.id(), None) else {
            return false;
        };
        if let Some(state) = entry.proxy.upgrade().and_then(|proxy| proxy.internal::<ProxyState>()) {
            state.clear();
        }
        drop(entry);
        bump(&self.counters.proxies_forgotten);
        log::debug!("forgot proxy for native object {}", object.id());
        true
    }

    /// The native object behind `proxy`, if it is a proxy that still has one
    pub(crate) fn proxied_object(&self, proxy: &ScriptObject) -> Option<NativeObject> {
        proxy.internal::<ProxyState>().and_then(|state| state.object())
    }
}
