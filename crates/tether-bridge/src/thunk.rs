//! Method thunks
//!
//! Reading a method name off a proxy yields a function object shared by
//! every proxy exposing a method of that name. The function is bound to the
//! identifier only; the target object is resolved from the call's receiver.
//! The cache links to the function weakly and the function's weak finalizer
//! drops the cache entry.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tether_runtime::Identifier;
use tether_script::{CallInfo, ScriptObject, ScriptValue, WeakScriptObject};

use crate::bridge::BridgeInner;
use crate::dispatch::InvokeKind;
use crate::error::{BridgeError, BridgeResult};
use crate::stats::bump;

/// Cached callable shape for one identifier
pub struct MethodThunk {
    identifier: Identifier,
    function: WeakScriptObject,
    serial: u64,
}

impl MethodThunk {
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// The function object, if script still holds it
    pub fn function(&self) -> Option<ScriptObject> {
        self.function.upgrade()
    }
}

impl fmt::Debug for MethodThunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodThunk")
            .field("identifier", &self.identifier)
            .field("function", &self.function)
            .finish()
    }
}

#[derive(Default)]
pub(crate) struct ThunkCache {
    entries: RefCell<HashMap<Identifier, Rc<MethodThunk>>>,
    next_serial: Cell<u64>,
}

impl ThunkCache {
    pub(crate) fn get(&self, identifier: &Identifier) -> Option<Rc<MethodThunk>> {
        self.entries.borrow().get(identifier).cloned()
    }

    fn remove(&self, identifier: &Identifier, serial: u64) -> bool {
        let mut entries = self.entries.borrow_mut();
        let matches = entries
            .get(identifier)
            .is_some_and(|thunk| thunk.serial == serial);
        if matches {
            entries.remove(identifier);
        }
        matches
    }

    fn next_serial(&self) -> u64 {
        let serial = self.next_serial.get() + 1;
        self.next_serial.set(serial);
        serial
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl BridgeInner {
    pub(crate) fn method_thunk(&self, identifier: &Identifier) -> BridgeResult<(Rc<MethodThunk>, ScriptObject)> {
        if let Some(thunk) = self.thunks.get(identifier) {
            match thunk.function() {
                Some(function) => return Ok((thunk, function)),
                // Reclaimed but not yet finalized.
                None => self.thunk_reclaimed(identifier, thunk.serial),
            }
        }

        let name = if self.config.name_method_functions {
            identifier.to_name()
        } else {
            String::new()
        };
        let bridge = self.weak();
        let method = identifier.clone();
        let function = self.isolate.new_function(&name, ScriptValue::Undefined, move |info| {
            let bridge = bridge.upgrade().ok_or(BridgeError::DeletedObject)?;
            Ok(bridge.call_thunk(&method, info)?)
        })?;

        let serial = self.thunks.next_serial();
        let thunk = Rc::new(MethodThunk {
            identifier: identifier.clone(),
            function: function.downgrade(),
            serial,
        });
        self.thunks
            .entries
            .borrow_mut()
            .insert(identifier.clone(), thunk.clone());

        let bridge = self.weak();
        let key = identifier.clone();
        self.isolate.make_weak(&function, move || {
            if let Some(bridge) = bridge.upgrade() {
                bridge.thunk_reclaimed(&key, serial);
            }
        });

        bump(&self.counters.thunks_created);
        log::debug!("created method thunk {}", identifier);
        Ok((thunk, function))
    }

    fn thunk_reclaimed(&self, identifier: &Identifier, serial: u64) {
        if self.thunks.remove(identifier, serial) {
            bump(&self.counters.thunks_reclaimed);
            log::trace!("method thunk {} reclaimed", identifier);
        }
    }

    fn call_thunk(&self, identifier: &Identifier, info: &CallInfo<'_>) -> BridgeResult<ScriptValue> {
        let receiver = info.this.as_object().ok_or_else(|| {
            BridgeError::MalformedReceiver(format!("method {} called without a receiver", identifier))
        })?;
        let object = self.receiver(receiver)?;
        self.invoke(&object, InvokeKind::Method(identifier), info.args)
    }
}
