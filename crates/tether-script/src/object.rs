//! Script objects
//!
//! Objects hold ordered own properties, an optional interceptor, an optional
//! internal field for embedder state, and, for function objects, a native
//! callback with its bound data. Interceptor hooks are always consulted
//! before own properties.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{ScriptError, ScriptResult};
use crate::interceptor::{CallInfo, EnumerationKind, FunctionCallback, Interceptor};
use crate::isolate::{Finalizer, Heap, Isolate};
use crate::key::PropertyKey;
use crate::value::ScriptValue;

pub(crate) enum ObjectKind {
    Ordinary,
    Function {
        callback: FunctionCallback,
        data: ScriptValue,
    },
}

pub(crate) struct ObjectCell {
    id: u64,
    kind: ObjectKind,
    name: RefCell<String>,
    properties: RefCell<Vec<(PropertyKey, ScriptValue)>>,
    internal: RefCell<Option<Rc<dyn Any>>>,
    interceptor: Option<Rc<dyn Interceptor>>,
    finalizers: RefCell<Vec<Finalizer>>,
    heap: Weak<Heap>,
}

impl Drop for ObjectCell {
    fn drop(&mut self) {
        let finalizers = std::mem::take(self.finalizers.get_mut());
        if let Some(heap) = self.heap.upgrade() {
            heap.reclaimed(finalizers);
        }
    }
}

/// Strong handle to a script object
#[derive(Clone)]
pub struct ScriptObject(Rc<ObjectCell>);

impl ScriptObject {
    pub(crate) fn new(
        id: u64,
        kind: ObjectKind,
        interceptor: Option<Rc<dyn Interceptor>>,
        heap: Weak<Heap>,
    ) -> Self {
        ScriptObject(Rc::new(ObjectCell {
            id,
            kind,
            name: RefCell::new(String::new()),
            properties: RefCell::new(Vec::new()),
            internal: RefCell::new(None),
            interceptor,
            finalizers: RefCell::new(Vec::new()),
            heap,
        }))
    }

    /// Identity within the owning isolate
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn ptr_eq(&self, other: &ScriptObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakScriptObject {
        WeakScriptObject {
            id: self.0.id,
            inner: Rc::downgrade(&self.0),
        }
    }

    /// The isolate that allocated this object, if it still exists
    pub fn isolate(&self) -> Option<Isolate> {
        self.0.heap.upgrade().map(Isolate::from_heap)
    }

    pub(crate) fn add_finalizer(&self, finalizer: Finalizer) {
        self.0.finalizers.borrow_mut().push(finalizer);
    }

    fn interceptor(&self) -> Option<Rc<dyn Interceptor>> {
        self.0.interceptor.clone()
    }

    pub fn has_interceptor(&self) -> bool {
        self.0.interceptor.is_some()
    }

    pub fn is_function(&self) -> bool {
        matches!(self.0.kind, ObjectKind::Function { .. })
    }

    pub fn is_callable(&self) -> bool {
        self.is_function() || self.0.interceptor.as_ref().is_some_and(|i| i.is_callable())
    }

    /// Function name (empty for ordinary objects)
    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.0.name.borrow_mut() = name.to_string();
    }

    /// Own property lookup, bypassing interceptors
    pub fn get_own(&self, key: &PropertyKey) -> Option<ScriptValue> {
        self.0
            .properties
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn get(&self, key: impl Into<PropertyKey>) -> ScriptResult<ScriptValue> {
        let key = key.into();
        if let Some(interceptor) = self.interceptor() {
            if let Some(value) = interceptor.get(self, &key)? {
                return Ok(value);
            }
        }
        Ok(self.get_own(&key).unwrap_or_default())
    }

    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<ScriptValue>) -> ScriptResult<()> {
        let key = key.into();
        let value = value.into();
        if let Some(interceptor) = self.interceptor() {
            if interceptor.set(self, &key, &value)? {
                return Ok(());
            }
        }
        self.define_own(key, value);
        Ok(())
    }

    /// Define an own property, bypassing interceptors
    pub fn define_own(&self, key: PropertyKey, value: ScriptValue) {
        let previous = {
            let mut properties = self.0.properties.borrow_mut();
            match properties.iter().position(|(k, _)| *k == key) {
                Some(i) => Some(std::mem::replace(&mut properties[i].1, value)),
                None => {
                    properties.push((key, value));
                    None
                }
            }
        };
        // The old value may be the last handle to an object.
        drop(previous);
    }

    pub fn has(&self, key: impl Into<PropertyKey>) -> ScriptResult<bool> {
        let key = key.into();
        if let Some(interceptor) = self.interceptor() {
            if let Some(present) = interceptor.query(self, &key)? {
                return Ok(present);
            }
        }
        Ok(self.0.properties.borrow().iter().any(|(k, _)| *k == key))
    }

    /// Delete an own property. Returns whether one was removed.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        let removed = {
            let mut properties = self.0.properties.borrow_mut();
            properties
                .iter()
                .position(|(k, _)| *k == key)
                .map(|i| properties.remove(i))
        };
        removed.is_some()
    }

    /// Enumerable keys: intercepted indices, intercepted names, then own
    /// properties, without duplicates
    pub fn own_keys(&self) -> ScriptResult<Vec<PropertyKey>> {
        let mut keys: Vec<PropertyKey> = Vec::new();
        if let Some(interceptor) = self.interceptor() {
            for kind in [EnumerationKind::Indexed, EnumerationKind::Named] {
                if let Some(found) = interceptor.enumerate(self, kind)? {
                    for key in found {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                }
            }
        }
        let own: Vec<PropertyKey> = self.0.properties.borrow().iter().map(|(k, _)| k.clone()).collect();
        for key in own {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    pub fn call(&self, this: &ScriptValue, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        match &self.0.kind {
            ObjectKind::Function { callback, data } => {
                let callback = callback.clone();
                let data = data.clone();
                let info = CallInfo {
                    this,
                    callee: self,
                    args,
                    data: &data,
                    is_construct: false,
                };
                callback(&info)
            }
            ObjectKind::Ordinary => match self.interceptor() {
                Some(interceptor) if interceptor.is_callable() => interceptor.call(self, args, false),
                _ => Err(ScriptError::type_error("object is not a function")),
            },
        }
    }

    /// `new` on this object. A function whose callback returns a non-object
    /// yields the freshly allocated receiver.
    pub fn construct(&self, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        match &self.0.kind {
            ObjectKind::Function { callback, data } => {
                let callback = callback.clone();
                let data = data.clone();
                let isolate = self
                    .isolate()
                    .ok_or_else(|| ScriptError::internal("isolate has been disposed"))?;
                let receiver = ScriptValue::Object(isolate.new_object()?);
                let info = CallInfo {
                    this: &receiver,
                    callee: self,
                    args,
                    data: &data,
                    is_construct: true,
                };
                match callback(&info)? {
                    result @ ScriptValue::Object(_) => Ok(result),
                    _ => Ok(receiver),
                }
            }
            ObjectKind::Ordinary => match self.interceptor() {
                Some(interceptor) if interceptor.is_callable() => interceptor.call(self, args, true),
                _ => Err(ScriptError::type_error("object is not a constructor")),
            },
        }
    }

    /// `this[key](...args)`
    pub fn call_method(&self, key: impl Into<PropertyKey>, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        let key = key.into();
        let function = self.get(&key)?;
        match function.as_object() {
            Some(function) if function.is_callable() => {
                function.call(&ScriptValue::Object(self.clone()), args)
            }
            _ => Err(ScriptError::type_error(format!("{} is not a function", key))),
        }
    }

    pub fn set_internal(&self, value: Rc<dyn Any>) {
        let previous = self.0.internal.borrow_mut().replace(value);
        drop(previous);
    }

    /// The internal field, if set and of type `T`
    pub fn internal<T: Any>(&self) -> Option<Rc<T>> {
        let value = self.0.internal.borrow().clone()?;
        value.downcast::<T>().ok()
    }

    pub fn clear_internal(&self) {
        let previous = self.0.internal.borrow_mut().take();
        drop(previous);
    }
}

impl fmt::Debug for ScriptObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_function() {
            write!(f, "ScriptObject(#{} function {})", self.0.id, self.0.name.borrow())
        } else {
            write!(f, "ScriptObject(#{})", self.0.id)
        }
    }
}

/// Weak handle to a script object
#[derive(Clone)]
pub struct WeakScriptObject {
    id: u64,
    inner: Weak<ObjectCell>,
}

impl WeakScriptObject {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn upgrade(&self) -> Option<ScriptObject> {
        self.inner.upgrade().map(ScriptObject)
    }

    pub fn is_reclaimed(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

impl fmt::Debug for WeakScriptObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakScriptObject(#{})", self.id)
    }
}
